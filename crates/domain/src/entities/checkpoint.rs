//! Install checkpoints
//!
//! The installer pushes a checkpoint before each risky step; rollback pops
//! the most recent one and undoes the work that step performed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DomainError;

/// Phase of the platform install state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPhase {
    /// Nothing touched yet
    PreInstall,
    /// Installer artifact downloaded and verified
    PostDownload,
    /// Application placed on disk
    PostInstall,
    /// CLI link created
    CliLinked,
    /// CLI link could not be created (non-fatal)
    LinkFailed,
    /// Temporary artifacts removed
    CleanedUp,
}

impl InstallPhase {
    /// Kebab-case identifier
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PreInstall => "pre-install",
            Self::PostDownload => "post-download",
            Self::PostInstall => "post-install",
            Self::CliLinked => "cli-linked",
            Self::LinkFailed => "link-failed",
            Self::CleanedUp => "cleaned-up",
        }
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstallPhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-install" => Ok(Self::PreInstall),
            "post-download" => Ok(Self::PostDownload),
            "post-install" => Ok(Self::PostInstall),
            "cli-linked" => Ok(Self::CliLinked),
            "link-failed" => Ok(Self::LinkFailed),
            "cleaned-up" => Ok(Self::CleanedUp),
            other => Err(DomainError::UnknownInstallPhase(other.to_string())),
        }
    }
}

/// A recorded install checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Phase reached when the checkpoint was saved
    pub phase: InstallPhase,
    /// When the checkpoint was saved
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint stamped with the current time
    #[must_use]
    pub fn now(phase: InstallPhase) -> Self {
        Self {
            phase,
            created_at: Utc::now(),
        }
    }

    /// Checkpoint name as used in logs and events
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.phase.as_str()
    }
}
