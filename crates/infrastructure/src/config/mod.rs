//! Application configuration
//!
//! Split into focused sub-modules:
//! - `runtime`: runtime API endpoint, timeouts, shutdown waits
//! - `download`: retry, timeout and redirect limits
//! - `installer`: artifact source, install locations, pinned checksums
//! - `selection`: selected models and the model-status file
//!
//! Warm-up and catalog sections reuse the application-layer config types.

mod download;
mod installer;
mod runtime;
mod selection;

use std::path::Path;

use application::{CatalogConfig, OrchestratorConfig, WarmupConfig};
use serde::{Deserialize, Serialize};

pub use download::DownloadConfig;
pub use installer::InstallerConfig;
pub use runtime::{RuntimeConfig, ShutdownConfig};
pub use selection::{RepositoryConfig, SelectionConfig};

use crate::telemetry::TelemetryConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub installer: InstallerConfig,

    #[serde(default)]
    pub warmup: WarmupConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,

    #[serde(default)]
    pub selection: SelectionConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// Without `path`, `warden.toml` (or any supported extension) in the
    /// working directory is read if present. Environment variables such as
    /// `WARDEN_RUNTIME__BASE_URL` override both.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("warden").required(false),
        };

        let builder = config::Config::builder()
            // Start with defaults
            .set_default("runtime.base_url", "http://127.0.0.1:11434")?
            .set_default("runtime.api_timeout_ms", 30_000)?
            .add_source(file)
            // Override with environment variables (e.g., WARDEN_DOWNLOAD__MAX_ATTEMPTS)
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Settings for the runtime service and the components it owns
    #[must_use]
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            sync_interval_secs: self.runtime.sync_interval_secs,
            catalog: self.catalog.clone(),
            warmup: self.warmup.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.runtime.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.runtime.api_timeout_ms, 30_000);
        assert_eq!(config.runtime.sync_interval_secs, 30);
        assert_eq!(config.download.max_attempts, 3);
        assert_eq!(config.download.base_delay_ms, 1_000);
        assert_eq!(config.download.timeout_secs, 300);
        assert_eq!(config.download.max_redirects, 5);
        assert_eq!(config.warmup.cooldown_ms, 5_000);
        assert_eq!(config.catalog.yield_every, 50);
        assert_eq!(config.shutdown.grace_period_ms, 2_000);
        assert_eq!(config.selection.chat_provider, "ollama");
        assert!(
            config
                .installer
                .download_base_url
                .contains("/releases/download/v")
        );
        assert_eq!(config.installer.checksum_manifest, "sha256sum.txt");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"runtime": {"base_url": "http://10.0.0.2:11434"}}"#).unwrap();
        assert_eq!(config.runtime.base_url, "http://10.0.0.2:11434");
        assert_eq!(config.runtime.liveness_timeout_ms, 5_000);
        assert!(config.installer.checksums.is_empty());
    }

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[runtime]
base_url = "http://192.168.1.5:11434"
sync_interval_secs = 10

[warmup]
cooldown_ms = 1000

[installer.checksums]
macos = "abc123"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.runtime.base_url, "http://192.168.1.5:11434");
        assert_eq!(config.orchestrator().sync_interval_secs, 10);
        assert_eq!(config.warmup.cooldown_ms, 1_000);
        assert_eq!(
            config.installer.checksums.get("macos").map(String::as_str),
            Some("abc123")
        );
    }

    #[test]
    fn missing_explicit_file_fails() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/warden.toml"))).is_err());
    }
}
