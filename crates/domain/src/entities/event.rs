//! Events emitted to the notification layer
//!
//! Listeners (a GUI, the CLI `watch` command) subscribe to a stream of these.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the install flow reported in progress events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallStage {
    Download,
    Install,
    Link,
    Cleanup,
    Verify,
    Start,
    Complete,
    Rollback,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Download => "download",
            Self::Install => "install",
            Self::Link => "link",
            Self::Cleanup => "cleanup",
            Self::Verify => "verify",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Rollback => "rollback",
        };
        f.write_str(label)
    }
}

/// Progress report of the install flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallProgress {
    pub stage: InstallStage,
    pub message: String,
    /// 0-100
    pub progress: u8,
}

impl InstallProgress {
    #[must_use]
    pub fn new(stage: InstallStage, message: impl Into<String>, progress: u8) -> Self {
        Self {
            stage,
            message: message.into(),
            progress: progress.min(100),
        }
    }
}

/// Operation that produced an error event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Install,
    Start,
    Pull,
    Warmup,
    Sync,
    Shutdown,
}

/// Event published by the orchestrator and its components
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum RuntimeEvent {
    InstallProgress {
        stage: InstallStage,
        message: String,
        progress: u8,
    },
    ModelPullProgress {
        model: String,
        status: String,
        progress: u8,
    },
    ModelPullComplete {
        model: String,
    },
    ModelWarmedUp {
        model: String,
    },
    StateChanged {
        installed: bool,
        running: bool,
        models: Vec<String>,
        loaded_models: Vec<String>,
    },
    DownloadError {
        message: String,
    },
    Error {
        error_type: OperationKind,
        message: String,
    },
}

impl From<InstallProgress> for RuntimeEvent {
    fn from(progress: InstallProgress) -> Self {
        Self::InstallProgress {
            stage: progress.stage,
            message: progress.message,
            progress: progress.progress,
        }
    }
}

impl RuntimeEvent {
    /// Event name as seen by listeners
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InstallProgress { .. } => "install-progress",
            Self::ModelPullProgress { .. } => "model-pull-progress",
            Self::ModelPullComplete { .. } => "model-pull-complete",
            Self::ModelWarmedUp { .. } => "model-warmed-up",
            Self::StateChanged { .. } => "state-changed",
            Self::DownloadError { .. } => "download-error",
            Self::Error { .. } => "error",
        }
    }

    /// Build an error event
    #[must_use]
    pub fn error(error_type: OperationKind, message: impl Into<String>) -> Self {
        Self::Error {
            error_type,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changed_wire_format() {
        let event = RuntimeEvent::StateChanged {
            installed: true,
            running: true,
            models: vec!["llama3:latest".to_string()],
            loaded_models: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "state-changed");
        assert_eq!(json["loadedModels"], serde_json::json!([]));
    }

    #[test]
    fn error_wire_format() {
        let event = RuntimeEvent::error(OperationKind::Pull, "stream closed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["errorType"], "pull");
        assert_eq!(json["message"], "stream closed");
    }

    #[test]
    fn name_matches_tag() {
        let event = RuntimeEvent::ModelWarmedUp {
            model: "phi3".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
    }

    #[test]
    fn install_progress_is_clamped() {
        let progress = InstallProgress::new(InstallStage::Download, "fetching", 250);
        assert_eq!(progress.progress, 100);
        let event = RuntimeEvent::from(progress);
        assert_eq!(event.name(), "install-progress");
    }
}
