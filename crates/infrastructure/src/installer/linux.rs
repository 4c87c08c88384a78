//! Linux: automatic privileged install is not attempted

use application::ApplicationError;
use application::ports::ProgressSink;
use async_trait::async_trait;
use domain::InstallPhase;
use tracing::info;

use super::{CheckpointLog, InstallContext, PlatformInstaller};

/// Instructions shown instead of running the upstream install script as root
pub const MANUAL_INSTALL_URL: &str = "https://ollama.com/download/linux";

#[derive(Debug, Clone, Copy)]
pub(super) struct LinuxInstaller;

#[async_trait]
impl PlatformInstaller for LinuxInstaller {
    async fn install(
        &self,
        _ctx: &InstallContext,
        _checkpoints: &CheckpointLog,
        _sink: &ProgressSink,
    ) -> Result<(), ApplicationError> {
        info!(url = MANUAL_INSTALL_URL, "Linux requires a manual runtime install");
        Err(ApplicationError::ManualInstallRequired {
            url: MANUAL_INSTALL_URL.to_string(),
        })
    }

    async fn undo(&self, _phase: InstallPhase, _ctx: &InstallContext) -> Result<(), ApplicationError> {
        Ok(())
    }
}
