//! Infrastructure layer - Adapters for external systems
//!
//! Implements the application ports against the real machine: the runtime's
//! HTTP API, artifact downloads, platform installers, process control,
//! JSON persistence and the event bus. Also owns configuration loading and
//! tracing setup.

pub mod adapters;
pub mod command_runner;
pub mod config;
pub mod download;
pub mod installer;
pub mod process_supervisor;
pub mod retry;
pub mod runtime_client;
pub mod shutdown;
pub mod telemetry;

pub use adapters::*;
pub use command_runner::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use config::{
    AppConfig, DownloadConfig, InstallerConfig, RepositoryConfig, RuntimeConfig, SelectionConfig,
    ShutdownConfig,
};
pub use download::{DownloadError, DownloadProgress, Downloader, FetchOptions, FetchOutcome};
pub use installer::{ChecksumTable, InstallPaths, Installer};
pub use process_supervisor::ProcessSupervisor;
pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
pub use runtime_client::RuntimeClient;
pub use shutdown::ShutdownManager;
pub use telemetry::{TelemetryConfig, TelemetryError, init_tracing};
