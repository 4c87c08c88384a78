//! Model status repository port
//!
//! The orchestrator never owns model records; it only writes the install
//! flags of single models through this port.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::ApplicationError;

/// Port for persisting per-model install flags
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelRepositoryPort: Send + Sync {
    /// Persist the install flags of one model
    async fn update_install_status(
        &self,
        name: &str,
        installed: bool,
        installing: bool,
    ) -> Result<(), ApplicationError>;
}
