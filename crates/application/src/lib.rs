//! Application layer - Use cases and orchestration
//!
//! Holds the port definitions for everything outside the process (runtime
//! HTTP API, installer, process control, persistence, event listeners) and
//! the services composing them: model catalog, warm-up coordinator and the
//! orchestrating runtime service.

pub mod error;
pub mod lifecycle;
pub mod ports;
pub mod services;

pub use error::ApplicationError;
pub use lifecycle::ShutdownFlag;
pub use ports::*;
pub use services::*;
