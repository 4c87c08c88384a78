//! Runtime installer
//!
//! Each supported platform has its own install routine behind
//! [`PlatformInstaller`]. The routine pushes a checkpoint before every risky
//! step; on failure the orchestrator pops the most recent checkpoint and the
//! routine undoes whatever that step left behind.

mod checksums;
mod linux;
mod macos;
mod paths;
mod windows;

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use application::ApplicationError;
use application::ports::{InstallVerification, ProgressSink, RuntimeInstallerPort};
use async_trait::async_trait;
use domain::{Checkpoint, InstallPhase, InstallProgress, InstallStage, Platform};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

pub use checksums::{ChecksumTable, installer_artifact, manifest_digest};
pub use paths::InstallPaths;

use crate::command_runner::CommandRunner;
use crate::config::InstallerConfig;
use crate::download::{Downloader, FetchOptions};
use crate::process_supervisor::locate_binary;

/// Everything a platform routine needs to touch the machine
pub struct InstallContext {
    pub platform: Platform,
    pub downloader: Downloader,
    pub runner: Arc<dyn CommandRunner>,
    pub paths: InstallPaths,
    pub checksums: ChecksumTable,
    pub checksum_manifest: Option<String>,
    pub download_base_url: String,
}

impl fmt::Debug for InstallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallContext")
            .field("platform", &self.platform)
            .field("paths", &self.paths)
            .field("download_base_url", &self.download_base_url)
            .field("checksum_manifest", &self.checksum_manifest)
            .finish_non_exhaustive()
    }
}

impl InstallContext {
    fn artifact_url(&self, name: &str) -> String {
        format!("{}/{name}", self.download_base_url.trim_end_matches('/'))
    }

    /// Pinned digest for `artifact`, else the one published with the release
    async fn expected_digest(&self, artifact: &str) -> Result<String, ApplicationError> {
        if let Some(pinned) = self.checksums.get(self.platform, artifact) {
            return Ok(pinned.to_string());
        }
        let Some(manifest) = self.checksum_manifest.as_deref() else {
            return self
                .checksums
                .require(self.platform, artifact)
                .map(str::to_string);
        };

        let destination = self.paths.artifact(manifest);
        self.downloader
            .fetch_with_retry(&self.artifact_url(manifest), &destination, &FetchOptions::default())
            .await?;
        let listing = tokio::fs::read_to_string(&destination)
            .await
            .map_err(|e| ApplicationError::Download(format!("read {manifest}: {e}")));
        self.remove_artifact(manifest).await;

        manifest_digest(&listing?, artifact)
            .inspect(|_| debug!(artifact, manifest, "Using digest published with the release"))
            .ok_or_else(|| {
                ApplicationError::Download(format!(
                    "{manifest} lists no checksum for {artifact}, refusing to trust the download"
                ))
            })
    }

    /// Download the platform's installer artifact and verify its digest
    ///
    /// Download progress maps onto the first half of the install bar.
    pub(crate) async fn download_artifact(
        &self,
        artifact: &str,
        sink: &ProgressSink,
    ) -> Result<PathBuf, ApplicationError> {
        let expected = self.expected_digest(artifact).await?;
        let url = self.artifact_url(artifact);
        let destination = self.paths.artifact(artifact);

        let progress_sink = Arc::clone(sink);
        let label = format!("Downloading {artifact}");
        let options = FetchOptions::default()
            .with_checksum(expected)
            .with_progress(Arc::new(move |percent, _, _| {
                progress_sink(InstallProgress::new(
                    InstallStage::Download,
                    label.clone(),
                    percent / 2,
                ));
            }));

        sink(InstallProgress::new(
            InstallStage::Download,
            format!("Downloading {artifact}"),
            0,
        ));
        self.downloader
            .fetch_with_retry(&url, &destination, &options)
            .await?;
        Ok(destination)
    }

    /// Remove a downloaded artifact, logging failures
    pub(crate) async fn remove_artifact(&self, artifact: &str) {
        let path = self.paths.artifact(artifact);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Removed installer artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove installer artifact"),
        }
    }

    /// Run a command that must succeed
    pub(crate) async fn run_checked(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<(), ApplicationError> {
        let output = self.runner.run(program, args).await?;
        if output.success() {
            Ok(())
        } else {
            Err(ApplicationError::CommandFailed(format!(
                "{program} exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )))
        }
    }
}

/// Ordered checkpoint stack shared between the installer and its routines
#[derive(Debug, Clone, Default)]
pub struct CheckpointLog(Arc<Mutex<Vec<Checkpoint>>>);

impl CheckpointLog {
    pub fn push(&self, phase: InstallPhase) {
        debug!(phase = %phase, "Checkpoint saved");
        self.0.lock().push(Checkpoint::now(phase));
    }

    pub fn pop(&self) -> Option<Checkpoint> {
        self.0.lock().pop()
    }

    pub fn snapshot(&self) -> Vec<Checkpoint> {
        self.0.lock().clone()
    }

    pub fn phases(&self) -> Vec<InstallPhase> {
        self.0.lock().iter().map(|c| c.phase).collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Platform-specific install routine
#[async_trait]
pub trait PlatformInstaller: Send + Sync + fmt::Debug {
    /// Run the install, pushing a checkpoint before every risky step
    async fn install(
        &self,
        ctx: &InstallContext,
        checkpoints: &CheckpointLog,
        sink: &ProgressSink,
    ) -> Result<(), ApplicationError>;

    /// Undo the work recorded by `phase`
    async fn undo(&self, phase: InstallPhase, ctx: &InstallContext) -> Result<(), ApplicationError>;

    /// Platform-specific artifact check run by verification
    async fn verify_layout(&self, _ctx: &InstallContext) -> Result<(), String> {
        Ok(())
    }
}

fn strategy_for(platform: Platform) -> Box<dyn PlatformInstaller> {
    match platform {
        Platform::MacOs => Box::new(macos::MacOsInstaller),
        Platform::Windows => Box::new(windows::WindowsInstaller),
        Platform::Linux => Box::new(linux::LinuxInstaller),
    }
}

/// [`RuntimeInstallerPort`] dispatching to the host platform's routine
pub struct Installer {
    context: Option<InstallContext>,
    strategy: Option<Box<dyn PlatformInstaller>>,
    checkpoints: CheckpointLog,
    binary_path: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl fmt::Debug for Installer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installer")
            .field("context", &self.context)
            .field("checkpoints", &self.checkpoints.phases())
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Installer for the host platform
    pub fn new(
        config: &InstallerConfig,
        downloader: Downloader,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self::for_platform(Platform::current().ok(), config, downloader, runner)
    }

    /// Installer for an explicit platform; `None` means unsupported
    pub fn for_platform(
        platform: Option<Platform>,
        config: &InstallerConfig,
        downloader: Downloader,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        let context = platform.map(|platform| InstallContext {
            platform,
            downloader,
            runner,
            paths: InstallPaths::for_platform(platform, config),
            checksums: ChecksumTable::from_config(&config.checksums),
            checksum_manifest: Some(config.checksum_manifest.clone()).filter(|m| !m.is_empty()),
            download_base_url: config.download_base_url.clone(),
        });

        Self {
            strategy: platform.map(strategy_for),
            context,
            checkpoints: CheckpointLog::default(),
            binary_path: None,
            search_path: std::env::var_os("PATH"),
        }
    }

    /// Explicit runtime binary consulted by verification
    #[must_use]
    pub fn with_binary_path(mut self, path: Option<PathBuf>) -> Self {
        self.binary_path = path;
        self
    }

    /// `PATH`-style list searched for the runtime binary
    #[must_use]
    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    fn supported(&self) -> Result<(&InstallContext, &dyn PlatformInstaller), ApplicationError> {
        match (&self.context, &self.strategy) {
            (Some(ctx), Some(strategy)) => Ok((ctx, strategy.as_ref())),
            _ => Err(ApplicationError::UnsupportedPlatform(
                std::env::consts::OS.to_string(),
            )),
        }
    }
}

#[async_trait]
impl RuntimeInstallerPort for Installer {
    #[instrument(skip(self, on_progress))]
    async fn auto_install(&self, on_progress: ProgressSink) -> Result<(), ApplicationError> {
        let (ctx, strategy) = self.supported()?;
        info!(platform = %ctx.platform, "Starting runtime install");
        strategy.install(ctx, &self.checkpoints, &on_progress).await?;
        info!(platform = %ctx.platform, "Runtime install finished");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn verify_installation(&self) -> InstallVerification {
        let (ctx, strategy) = match self.supported() {
            Ok(supported) => supported,
            Err(e) => return InstallVerification::failed(e.to_string()),
        };

        let Some(binary) = locate_binary(
            ctx.platform,
            &ctx.paths,
            self.binary_path.as_deref(),
            self.search_path.as_deref(),
        ) else {
            return InstallVerification::failed("runtime binary not found");
        };

        let binary = binary.to_string_lossy().into_owned();
        match ctx.runner.run(&binary, &["--version"]).await {
            Ok(output) if output.success() => {},
            Ok(output) => {
                return InstallVerification::failed(format!(
                    "version probe exited with {:?}: {}",
                    output.code,
                    output.stderr.trim()
                ));
            },
            Err(e) => return InstallVerification::failed(e.to_string()),
        }

        if let Err(reason) = strategy.verify_layout(ctx).await {
            return InstallVerification::failed(reason);
        }

        debug!(binary = %binary, "Installation verified");
        InstallVerification::passed()
    }

    fn save_checkpoint(&self, phase: InstallPhase) {
        self.checkpoints.push(phase);
    }

    #[instrument(skip(self))]
    async fn rollback_to_last_checkpoint(&self) -> Option<Checkpoint> {
        let checkpoint = self.checkpoints.pop()?;
        info!(phase = %checkpoint.phase, "Rolling back install checkpoint");

        if let Ok((ctx, strategy)) = self.supported() {
            if let Err(e) = strategy.undo(checkpoint.phase, ctx).await {
                warn!(phase = %checkpoint.phase, error = %e, "Rollback step failed");
            }
        }
        Some(checkpoint)
    }

    fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.snapshot()
    }

    fn clear_checkpoints(&self) {
        self.checkpoints.clear();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use sha2::{Digest, Sha256};

    use super::*;
    use crate::config::DownloadConfig;

    pub fn config_in(root: &Path) -> InstallerConfig {
        InstallerConfig {
            download_base_url: "http://127.0.0.1:9".to_string(),
            app_dir: Some(root.join("apps")),
            bin_dir: Some(root.join("bin")),
            temp_dir: Some(root.join("tmp")),
            ..Default::default()
        }
    }

    pub fn fast_downloader() -> Downloader {
        Downloader::new(DownloadConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            timeout_secs: 5,
            max_redirects: 2,
        })
        .unwrap()
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<InstallProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: ProgressSink = Arc::new(move |p| sink_seen.lock().push(p));
        (sink, seen)
    }
}
