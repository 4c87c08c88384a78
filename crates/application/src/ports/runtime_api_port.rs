//! Runtime API port
//!
//! Narrow interface over the local runtime's HTTP API. Adapters are
//! responsible for serializing calls through a single in-flight slot and for
//! refusing new calls once shutdown has begun.

use std::pin::Pin;

use async_trait::async_trait;
use domain::{InstalledModel, LoadedModel};
use futures::Stream;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// One decoded line of the streamed pull response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullProgressLine {
    /// Status string, e.g. `pulling manifest` or `success`
    #[serde(default)]
    pub status: String,
    /// Layer digest being transferred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Total bytes of the current layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Bytes of the current layer transferred so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    /// Error reported in-band by the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PullProgressLine {
    /// Line with only a status
    #[must_use]
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Default::default()
        }
    }

    /// Line with byte counters
    #[must_use]
    pub fn bytes(status: impl Into<String>, completed: u64, total: u64) -> Self {
        Self {
            status: status.into(),
            completed: Some(completed),
            total: Some(total),
            ..Default::default()
        }
    }

    /// Whether this line terminates a successful pull
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// Stream of decoded pull progress lines
pub type PullStream =
    Pin<Box<dyn Stream<Item = Result<PullProgressLine, ApplicationError>> + Send>>;

/// Port for the runtime's HTTP API
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuntimeApiPort: Send + Sync {
    /// Base address of the runtime
    fn base_url(&self) -> String;

    /// Ping the liveness endpoint; never fails, unreachable means `false`
    async fn is_reachable(&self) -> bool;

    /// Models in the runtime's local store (`GET /api/tags`)
    async fn list_installed(&self) -> Result<Vec<InstalledModel>, ApplicationError>;

    /// Models resident in memory (`GET /api/ps`)
    async fn list_loaded(&self) -> Result<Vec<LoadedModel>, ApplicationError>;

    /// Send the smallest possible chat completion for `model`
    ///
    /// Fails with `ModelNotFound` when the runtime answers 404.
    async fn probe_chat(&self, model: &str, prompt: &str) -> Result<(), ApplicationError>;

    /// Open a streamed pull (`POST /api/pull`)
    async fn pull(&self, model: &str) -> Result<PullStream, ApplicationError>;
}
