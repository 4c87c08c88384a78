//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations.

mod broadcast_event_adapter;
mod configured_selection_adapter;
mod json_model_repository_adapter;

pub use broadcast_event_adapter::BroadcastEventPublisher;
pub use configured_selection_adapter::ConfiguredModelSelection;
pub use json_model_repository_adapter::{JsonFileModelRepository, ModelRecord};
