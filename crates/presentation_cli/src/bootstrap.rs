//! Wiring of adapters into the runtime service

use std::sync::Arc;

use anyhow::Context;
use application::{RuntimePorts, RuntimeService, ShutdownFlag};
use infrastructure::{
    AppConfig, BroadcastEventPublisher, CommandRunner, ConfiguredModelSelection, Downloader,
    Installer, JsonFileModelRepository, ProcessSupervisor, RuntimeClient, ShutdownManager,
    SystemCommandRunner,
};
use tracing::debug;

/// A wired service plus the event bus it publishes to
pub struct Runtime {
    pub service: Arc<RuntimeService>,
    pub events: BroadcastEventPublisher,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Build every adapter from `config` and hand them to the service
pub fn build(config: &AppConfig) -> anyhow::Result<Runtime> {
    let shutdown = ShutdownFlag::new();
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
    let events = BroadcastEventPublisher::new();

    let runtime = Arc::new(
        RuntimeClient::new(config.runtime.clone(), shutdown.clone())
            .context("failed to create runtime client")?,
    );
    let downloader =
        Downloader::new(config.download.clone()).context("failed to create downloader")?;

    let installer = Installer::new(&config.installer, downloader, Arc::clone(&runner))
        .with_binary_path(config.runtime.binary_path.clone());
    let process = ProcessSupervisor::new(
        &config.runtime,
        &config.installer,
        Arc::clone(&runner),
        runtime.clone(),
    );
    let terminator = ShutdownManager::new(&config.shutdown, Arc::clone(&runner));

    let ports = RuntimePorts {
        runtime,
        process: Arc::new(process),
        installer: Arc::new(installer),
        terminator: Arc::new(terminator),
        repository: Arc::new(JsonFileModelRepository::new(config.repository.path.clone())),
        selection: Arc::new(ConfiguredModelSelection::new(config.selection.clone())),
        events: Arc::new(events.clone()),
    };
    debug!(?ports, "Adapters wired");

    let service = RuntimeService::with_shutdown_flag(ports, config.orchestrator(), shutdown);
    Ok(Runtime {
        service: Arc::new(service),
        events,
    })
}
