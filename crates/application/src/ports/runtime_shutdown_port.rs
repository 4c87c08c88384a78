//! Runtime shutdown port

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Port for terminating the runtime process
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RuntimeShutdownPort: Send + Sync {
    /// Terminate the runtime; `true` when a final liveness check finds it gone
    async fn shutdown(&self, force: bool) -> bool;

    /// Whether a runtime process is alive
    async fn is_process_running(&self) -> bool;
}
