//! Domain-level errors

use thiserror::Error;

/// Errors that can occur in the domain layer
#[derive(Debug, Error)]
pub enum DomainError {
    /// The current operating system has no runtime support
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A model name could not be used
    #[error("Invalid model name: {0}")]
    InvalidModelName(String),

    /// Progress value outside 0-100
    #[error("Invalid progress value: {0}")]
    InvalidProgress(u32),

    /// Unknown install phase identifier
    #[error("Unknown install phase: {0}")]
    UnknownInstallPhase(String),
}
