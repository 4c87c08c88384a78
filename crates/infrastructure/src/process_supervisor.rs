//! Runtime process supervision
//!
//! Finds the runtime binary, starts it when it is installed but not serving,
//! and reads its version.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use application::ApplicationError;
use application::ports::{RuntimeApiPort, RuntimeProcessPort};
use async_trait::async_trait;
use domain::Platform;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::command_runner::CommandRunner;
use crate::config::{InstallerConfig, RuntimeConfig};
use crate::installer::InstallPaths;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Find the runtime binary
///
/// Checks the configured path, then every directory of `search_path`, then
/// the platform's install locations.
pub fn locate_binary(
    platform: Platform,
    paths: &InstallPaths,
    configured: Option<&Path>,
    search_path: Option<&OsStr>,
) -> Option<PathBuf> {
    if let Some(path) = configured.filter(|p| p.is_file()) {
        return Some(path.to_path_buf());
    }

    let on_path = search_path.and_then(|dirs| {
        std::env::split_paths(dirs)
            .map(|dir| dir.join(platform.binary_name()))
            .find(|candidate| candidate.is_file())
    });
    if on_path.is_some() {
        return on_path;
    }

    let mut known = vec![paths.app_binary(platform)];
    if platform != Platform::Windows {
        known.push(paths.cli_link(platform));
    }
    known.into_iter().find(|candidate| candidate.is_file())
}

/// Last whitespace-separated token of the last non-empty output line
///
/// `ollama --version` prints warnings before the version line when the server
/// is down.
pub fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

/// [`RuntimeProcessPort`] shelling out through a [`CommandRunner`]
pub struct ProcessSupervisor {
    platform: Option<Platform>,
    paths: InstallPaths,
    binary_path: Option<PathBuf>,
    search_path: Option<OsString>,
    runner: Arc<dyn CommandRunner>,
    runtime: Arc<dyn RuntimeApiPort>,
    start_timeout: Duration,
    poll_interval: Duration,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("platform", &self.platform)
            .field("binary_path", &self.binary_path)
            .field("start_timeout", &self.start_timeout)
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    pub fn new(
        runtime_config: &RuntimeConfig,
        installer_config: &InstallerConfig,
        runner: Arc<dyn CommandRunner>,
        runtime: Arc<dyn RuntimeApiPort>,
    ) -> Self {
        Self::for_platform(
            Platform::current().ok(),
            runtime_config,
            installer_config,
            runner,
            runtime,
        )
    }

    pub fn for_platform(
        platform: Option<Platform>,
        runtime_config: &RuntimeConfig,
        installer_config: &InstallerConfig,
        runner: Arc<dyn CommandRunner>,
        runtime: Arc<dyn RuntimeApiPort>,
    ) -> Self {
        let layout = platform.unwrap_or(Platform::Linux);
        Self {
            platform,
            paths: InstallPaths::for_platform(layout, installer_config),
            binary_path: runtime_config.binary_path.clone(),
            search_path: std::env::var_os("PATH"),
            runner,
            runtime,
            start_timeout: Duration::from_secs(runtime_config.start_timeout_secs),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Path of the runtime binary, if one is installed
    pub fn binary(&self) -> Option<PathBuf> {
        let platform = self.platform?;
        locate_binary(
            platform,
            &self.paths,
            self.binary_path.as_deref(),
            self.search_path.as_deref(),
        )
    }

    async fn launch(&self, platform: Platform) -> Result<(), ApplicationError> {
        let bundle = self.paths.app_bundle();
        if platform == Platform::MacOs && bundle.is_dir() {
            debug!(bundle = %bundle.display(), "Opening application bundle");
            return self
                .runner
                .spawn_detached("open", &["-a", &bundle.to_string_lossy()])
                .await;
        }

        let binary = self.binary().ok_or_else(|| {
            ApplicationError::CommandFailed("runtime binary not found".to_string())
        })?;
        debug!(binary = %binary.display(), "Spawning runtime server");
        self.runner
            .spawn_detached(&binary.to_string_lossy(), &["serve"])
            .await
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn wait_until_reachable(&self) -> Result<(), ApplicationError> {
        let deadline = Instant::now() + self.start_timeout;
        loop {
            if self.runtime.is_reachable().await {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ApplicationError::Timeout(
                    self.start_timeout.as_millis() as u64,
                ));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl RuntimeProcessPort for ProcessSupervisor {
    async fn is_installed(&self) -> bool {
        self.binary().is_some()
    }

    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), ApplicationError> {
        let platform = self.platform.ok_or_else(|| {
            ApplicationError::UnsupportedPlatform(std::env::consts::OS.to_string())
        })?;

        if self.runtime.is_reachable().await {
            debug!("Runtime already serving");
            return Ok(());
        }

        self.launch(platform).await?;
        match self.wait_until_reachable().await {
            Ok(()) => {
                info!(base_url = %self.runtime.base_url(), "Runtime started");
                Ok(())
            },
            Err(e) => {
                warn!(error = %e, "Runtime did not become reachable");
                Err(e)
            },
        }
    }

    async fn version(&self) -> Option<String> {
        let binary = self.binary()?;
        match self
            .runner
            .run(&binary.to_string_lossy(), &["--version"])
            .await
        {
            Ok(output) if output.success() => parse_version(&output.stdout),
            Ok(output) => {
                debug!(code = ?output.code, "Version probe failed");
                None
            },
            Err(e) => {
                debug!(error = %e, "Version probe failed");
                None
            },
        }
    }
}
