//! macOS install: zip archive extracted into the applications directory

use application::ApplicationError;
use application::ports::ProgressSink;
use async_trait::async_trait;
use domain::{InstallPhase, InstallProgress, InstallStage, Platform};
use tracing::{debug, info, instrument, warn};

use super::paths::exists;
use super::checksums::MACOS_ARTIFACT;
use super::{CheckpointLog, InstallContext, PlatformInstaller};

#[derive(Debug, Clone, Copy)]
pub(super) struct MacOsInstaller;

const ARTIFACT: &str = MACOS_ARTIFACT;

impl MacOsInstaller {
    async fn link_cli(ctx: &InstallContext) -> Result<(), ApplicationError> {
        tokio::fs::create_dir_all(&ctx.paths.bin_dir)
            .await
            .map_err(|e| ApplicationError::CommandFailed(format!("create bin dir: {e}")))?;

        let target = ctx.paths.bundled_cli();
        let link = ctx.paths.cli_link(Platform::MacOs);
        ctx.run_checked(
            "ln",
            &["-sf", &target.to_string_lossy(), &link.to_string_lossy()],
        )
        .await
    }

    /// Remove the CLI link if it still points into the bundle
    async fn remove_cli_link(ctx: &InstallContext) {
        let link = ctx.paths.cli_link(Platform::MacOs);
        match tokio::fs::read_link(&link).await {
            Ok(target) if target.starts_with(ctx.paths.app_bundle()) => {
                match tokio::fs::remove_file(&link).await {
                    Ok(()) => debug!(link = %link.display(), "Removed CLI link"),
                    Err(e) => warn!(link = %link.display(), error = %e, "Failed to remove CLI link"),
                }
            },
            Ok(target) => {
                debug!(link = %link.display(), target = %target.display(), "CLI link points elsewhere, keeping it");
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(link = %link.display(), error = %e, "Failed to inspect CLI link"),
        }
    }
}

#[async_trait]
impl PlatformInstaller for MacOsInstaller {
    #[instrument(skip_all)]
    async fn install(
        &self,
        ctx: &InstallContext,
        checkpoints: &CheckpointLog,
        sink: &ProgressSink,
    ) -> Result<(), ApplicationError> {
        checkpoints.push(InstallPhase::PreInstall);
        let archive = ctx.download_artifact(ARTIFACT, sink).await?;
        checkpoints.push(InstallPhase::PostDownload);

        sink(InstallProgress::new(
            InstallStage::Install,
            "Extracting Ollama.app",
            55,
        ));
        tokio::fs::create_dir_all(&ctx.paths.app_dir)
            .await
            .map_err(|e| ApplicationError::CommandFailed(format!("create app dir: {e}")))?;
        ctx.run_checked(
            "unzip",
            &[
                "-o",
                "-q",
                &archive.to_string_lossy(),
                "-d",
                &ctx.paths.app_dir.to_string_lossy(),
            ],
        )
        .await?;
        checkpoints.push(InstallPhase::PostInstall);
        info!(bundle = %ctx.paths.app_bundle().display(), "Application bundle installed");

        sink(InstallProgress::new(InstallStage::Link, "Linking ollama CLI", 85));
        match Self::link_cli(ctx).await {
            Ok(()) => checkpoints.push(InstallPhase::CliLinked),
            Err(e) => {
                warn!(error = %e, "CLI link failed, runtime stays reachable through its API");
                checkpoints.push(InstallPhase::LinkFailed);
                sink(InstallProgress::new(
                    InstallStage::Link,
                    format!("CLI link skipped: {e}"),
                    85,
                ));
            },
        }

        sink(InstallProgress::new(
            InstallStage::Cleanup,
            "Removing installer archive",
            95,
        ));
        ctx.remove_artifact(ARTIFACT).await;
        checkpoints.push(InstallPhase::CleanedUp);
        Ok(())
    }

    async fn undo(&self, phase: InstallPhase, ctx: &InstallContext) -> Result<(), ApplicationError> {
        match phase {
            InstallPhase::PreInstall => Ok(()),
            InstallPhase::PostDownload => {
                ctx.remove_artifact(ARTIFACT).await;
                Ok(())
            },
            InstallPhase::PostInstall
            | InstallPhase::CliLinked
            | InstallPhase::LinkFailed
            | InstallPhase::CleanedUp => {
                if matches!(phase, InstallPhase::CliLinked | InstallPhase::CleanedUp) {
                    Self::remove_cli_link(ctx).await;
                }
                let bundle = ctx.paths.app_bundle();
                if exists(&bundle).await {
                    tokio::fs::remove_dir_all(&bundle).await.map_err(|e| {
                        ApplicationError::CommandFailed(format!(
                            "remove {}: {e}",
                            bundle.display()
                        ))
                    })?;
                    info!(bundle = %bundle.display(), "Removed application bundle");
                }
                Ok(())
            },
        }
    }

    async fn verify_layout(&self, ctx: &InstallContext) -> Result<(), String> {
        let executable = ctx.paths.bundle_executable();
        if exists(&executable).await {
            Ok(())
        } else {
            Err(format!(
                "application bundle executable missing at {}",
                executable.display()
            ))
        }
    }
}
