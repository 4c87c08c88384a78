//! Runtime installer port

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Checkpoint, InstallPhase, InstallProgress};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Callback receiving install progress
pub type ProgressSink = Arc<dyn Fn(InstallProgress) + Send + Sync>;

/// Result of an independent post-install check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallVerification {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstallVerification {
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Port for the platform install flow
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuntimeInstallerPort: Send + Sync {
    /// Run the platform install flow
    async fn auto_install(&self, on_progress: ProgressSink) -> Result<(), ApplicationError>;

    /// Re-check the installation without throwing
    async fn verify_installation(&self) -> InstallVerification;

    /// Push a checkpoint
    fn save_checkpoint(&self, phase: InstallPhase);

    /// Pop the most recent checkpoint and undo its step, best-effort
    ///
    /// Returns the checkpoint that was rolled back, if any.
    async fn rollback_to_last_checkpoint(&self) -> Option<Checkpoint>;

    /// Checkpoints recorded so far, oldest first
    fn checkpoints(&self) -> Vec<Checkpoint>;

    /// Discard all checkpoints
    fn clear_checkpoints(&self);
}
