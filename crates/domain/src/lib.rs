//! Domain layer for the local runtime warden
//!
//! Contains the vocabulary shared by every layer: install state, checkpoints,
//! model views, emitted events and the supported platforms.
//! This layer has no I/O and no async runtime dependency.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
