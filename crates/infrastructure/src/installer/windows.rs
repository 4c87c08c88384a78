//! Windows install: silent Inno Setup run plus a `ollama.cmd` shim

use application::ApplicationError;
use application::ports::ProgressSink;
use async_trait::async_trait;
use domain::{InstallPhase, InstallProgress, InstallStage, Platform};
use tracing::{debug, info, instrument, warn};

use super::checksums::WINDOWS_ARTIFACT;
use super::paths::exists;
use super::{CheckpointLog, InstallContext, PlatformInstaller};

const SILENT_FLAGS: [&str; 3] = ["/VERYSILENT", "/NORESTART", "/SUPPRESSMSGBOXES"];

#[derive(Debug, Clone, Copy)]
pub(super) struct WindowsInstaller;

impl WindowsInstaller {
    fn shim_contents(ctx: &InstallContext) -> String {
        format!(
            "@echo off\r\n\"{}\" %*\r\n",
            ctx.paths.app_binary(Platform::Windows).display()
        )
    }

    async fn write_shim(ctx: &InstallContext) -> Result<(), std::io::Error> {
        tokio::fs::create_dir_all(&ctx.paths.bin_dir).await?;
        tokio::fs::write(ctx.paths.cli_link(Platform::Windows), Self::shim_contents(ctx)).await
    }

    /// Remove the shim if it is still the one this installer wrote
    async fn remove_shim(ctx: &InstallContext) {
        let shim = ctx.paths.cli_link(Platform::Windows);
        match tokio::fs::read_to_string(&shim).await {
            Ok(contents) if contents == Self::shim_contents(ctx) => {
                match tokio::fs::remove_file(&shim).await {
                    Ok(()) => debug!(shim = %shim.display(), "Removed CLI shim"),
                    Err(e) => warn!(shim = %shim.display(), error = %e, "Failed to remove CLI shim"),
                }
            },
            Ok(_) => debug!(shim = %shim.display(), "CLI shim was replaced, keeping it"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(shim = %shim.display(), error = %e, "Failed to inspect CLI shim"),
        }
    }
}

#[async_trait]
impl PlatformInstaller for WindowsInstaller {
    #[instrument(skip_all)]
    async fn install(
        &self,
        ctx: &InstallContext,
        checkpoints: &CheckpointLog,
        sink: &ProgressSink,
    ) -> Result<(), ApplicationError> {
        checkpoints.push(InstallPhase::PreInstall);
        let setup = ctx.download_artifact(WINDOWS_ARTIFACT, sink).await?;
        checkpoints.push(InstallPhase::PostDownload);

        sink(InstallProgress::new(
            InstallStage::Install,
            "Running OllamaSetup silently",
            55,
        ));
        let dir_flag = format!("/DIR={}", ctx.paths.app_dir.display());
        let mut args: Vec<&str> = SILENT_FLAGS.to_vec();
        args.push(&dir_flag);
        ctx.run_checked(&setup.to_string_lossy(), &args).await?;
        checkpoints.push(InstallPhase::PostInstall);
        info!(dir = %ctx.paths.app_dir.display(), "Runtime installed");

        sink(InstallProgress::new(InstallStage::Link, "Writing ollama.cmd", 85));
        match Self::write_shim(ctx).await {
            Ok(()) => checkpoints.push(InstallPhase::CliLinked),
            Err(e) => {
                warn!(error = %e, "CLI shim failed, runtime stays reachable through its API");
                checkpoints.push(InstallPhase::LinkFailed);
                sink(InstallProgress::new(
                    InstallStage::Link,
                    format!("CLI shim skipped: {e}"),
                    85,
                ));
            },
        }

        sink(InstallProgress::new(
            InstallStage::Cleanup,
            "Removing setup program",
            95,
        ));
        ctx.remove_artifact(WINDOWS_ARTIFACT).await;
        checkpoints.push(InstallPhase::CleanedUp);
        Ok(())
    }

    async fn undo(&self, phase: InstallPhase, ctx: &InstallContext) -> Result<(), ApplicationError> {
        match phase {
            InstallPhase::PreInstall => Ok(()),
            InstallPhase::PostDownload => {
                ctx.remove_artifact(WINDOWS_ARTIFACT).await;
                Ok(())
            },
            InstallPhase::PostInstall
            | InstallPhase::CliLinked
            | InstallPhase::LinkFailed
            | InstallPhase::CleanedUp => {
                if matches!(phase, InstallPhase::CliLinked | InstallPhase::CleanedUp) {
                    Self::remove_shim(ctx).await;
                }
                let uninstaller = ctx.paths.uninstaller();
                if exists(&uninstaller).await {
                    ctx.run_checked(
                        &uninstaller.to_string_lossy(),
                        &["/VERYSILENT", "/SUPPRESSMSGBOXES"],
                    )
                    .await?;
                    info!("Runtime uninstalled");
                }
                Ok(())
            },
        }
    }
}
