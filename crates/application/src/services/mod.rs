//! Application services - use cases composing the ports

mod model_catalog;
mod pull_progress;
mod runtime_service;
mod warmup_coordinator;

#[cfg(test)]
mod test_support;

pub use model_catalog::{CatalogConfig, ModelCatalog};
pub use pull_progress::{
    MAX_BYTE_PROGRESS, PullProgressTracker, progress_for_bytes, progress_for_status,
};
pub use runtime_service::{OrchestratorConfig, RuntimePorts, RuntimeService};
pub use warmup_coordinator::{WarmupConfig, WarmupCoordinator, WarmupSnapshot};
