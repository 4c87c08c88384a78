//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod event_publisher;
mod model_repository_port;
mod runtime_api_port;
mod runtime_installer_port;
mod runtime_process_port;
mod runtime_shutdown_port;
mod selected_model_port;

#[cfg(test)]
pub use event_publisher::MockEventPublisher;
pub use event_publisher::{EventPublisher, NoopEventPublisher};
#[cfg(test)]
pub use model_repository_port::MockModelRepositoryPort;
pub use model_repository_port::ModelRepositoryPort;
#[cfg(test)]
pub use runtime_api_port::MockRuntimeApiPort;
pub use runtime_api_port::{PullProgressLine, PullStream, RuntimeApiPort};
#[cfg(test)]
pub use runtime_installer_port::MockRuntimeInstallerPort;
pub use runtime_installer_port::{InstallVerification, ProgressSink, RuntimeInstallerPort};
#[cfg(test)]
pub use runtime_process_port::MockRuntimeProcessPort;
pub use runtime_process_port::RuntimeProcessPort;
#[cfg(test)]
pub use runtime_shutdown_port::MockRuntimeShutdownPort;
pub use runtime_shutdown_port::RuntimeShutdownPort;
#[cfg(test)]
pub use selected_model_port::MockSelectedModelPort;
pub use selected_model_port::{LOCAL_RUNTIME_PROVIDER, ModelKind, SelectedModel, SelectedModelPort};
