//! Read-only status snapshots of the runtime

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite status returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    pub base_url: String,
    pub installed: bool,
    pub installing: bool,
    pub running: bool,
    /// Install progress, 0-100
    pub progress: u8,
    pub loaded_models: Vec<String>,
    pub last_sync: Option<DateTime<Utc>>,
    pub shutting_down: bool,
}

/// Result of a runtime health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeHealth {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl RuntimeHealth {
    /// Health of a runtime that did not answer
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            response_time_ms: None,
            version: None,
            checked_at: Utc::now(),
        }
    }
}

/// Structured outcome of a composite operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    /// Successful outcome
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Failed outcome with a human-readable message
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
