//! Application-level errors

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Clone, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error("{0}")]
    Domain(String),

    /// Network, HTTP or checksum failure while downloading
    #[error("Download failed: {0}")]
    Download(String),

    /// Redirect response without a usable Location header
    #[error("Redirect failed: {0}")]
    Redirect(String),

    /// No automatic install exists for this platform
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Automatic install is deliberately not attempted on this platform
    #[error("Manual installation required, see {url}")]
    ManualInstallRequired { url: String },

    /// Model pull failed
    #[error("Pull of {model} failed: {reason}")]
    Pull { model: String, reason: String },

    /// Warm-up attempted again inside the cooldown window
    #[error("Warm-up for {model} rate limited, retry in {retry_after_ms}ms")]
    RateLimited { model: String, retry_after_ms: u64 },

    /// Runtime API call exceeded its deadline
    #[error("Runtime request timed out after {0}ms")]
    Timeout(u64),

    /// Service is shutting down and accepts no new work
    #[error("Service is shutting down")]
    ShuttingDown,

    /// Runtime does not know the requested model
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Runtime API or other external collaborator failed
    #[error("External service error: {0}")]
    ExternalService(String),

    /// A spawned command failed
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::UnsupportedPlatform(os) => Self::UnsupportedPlatform(os),
            other => Self::Domain(other.to_string()),
        }
    }
}

impl ApplicationError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Download(_) | Self::Timeout(_) | Self::ExternalService(_)
        )
    }

    /// Whether the runtime reported the model as unknown
    pub const fn is_model_not_found(&self) -> bool {
        matches!(self, Self::ModelNotFound(_))
    }
}
