//! Runtime process port
//!
//! Locating, starting and version-probing the runtime binary.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for supervising the runtime process
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuntimeProcessPort: Send + Sync {
    /// Whether the runtime binary is present on this machine
    async fn is_installed(&self) -> bool;

    /// Start the runtime and wait until its API answers
    async fn start(&self) -> Result<(), ApplicationError>;

    /// Version reported by the runtime CLI
    async fn version(&self) -> Option<String>;
}
