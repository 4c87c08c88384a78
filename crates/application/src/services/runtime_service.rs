//! Runtime service
//!
//! The only entry point callers touch. Composes the catalog, the warm-up
//! coordinator, the installer and the shutdown manager; keeps the install
//! state; runs the periodic reconciliation loop that keeps cached state in
//! line with what the runtime reports.
//!
//! Composite operations never propagate errors. Each returns an
//! [`OperationOutcome`] and publishes a terminal event on failure.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use domain::{
    InstallProgress, InstallStage, InstallState, ModelView, OperationKind, OperationOutcome,
    RuntimeEvent, RuntimeHealth, RuntimeStatus, canonical_model_name,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::model_catalog::{CatalogConfig, ModelCatalog};
use super::warmup_coordinator::{WarmupConfig, WarmupCoordinator};
use crate::{
    error::ApplicationError,
    lifecycle::ShutdownFlag,
    ports::{
        EventPublisher, ModelRepositoryPort, ProgressSink, RuntimeApiPort, RuntimeInstallerPort,
        RuntimeProcessPort, RuntimeShutdownPort, SelectedModelPort,
    },
};

/// Configuration for the runtime service and the components it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Reconciliation interval in seconds
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub warmup: WarmupConfig,
}

const fn default_sync_interval() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval(),
            catalog: CatalogConfig::default(),
            warmup: WarmupConfig::default(),
        }
    }
}

/// Adapters the runtime service is wired with
#[derive(Clone)]
pub struct RuntimePorts {
    pub runtime: Arc<dyn RuntimeApiPort>,
    pub process: Arc<dyn RuntimeProcessPort>,
    pub installer: Arc<dyn RuntimeInstallerPort>,
    pub terminator: Arc<dyn RuntimeShutdownPort>,
    pub repository: Arc<dyn ModelRepositoryPort>,
    pub selection: Arc<dyn SelectedModelPort>,
    pub events: Arc<dyn EventPublisher>,
}

impl fmt::Debug for RuntimePorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimePorts")
            .field("base_url", &self.runtime.base_url())
            .finish_non_exhaustive()
    }
}

/// What the last reconciliation tick observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SyncSnapshot {
    installed: bool,
    running: bool,
    models: BTreeSet<String>,
    loaded: BTreeSet<String>,
}

impl SyncSnapshot {
    /// Whether listeners need to hear about `next`
    fn differs_from(&self, next: &Self) -> bool {
        self.installed != next.installed
            || self.running != next.running
            || self.loaded != next.loaded
    }
}

#[derive(Debug, Default)]
struct ServiceState {
    install: InstallState,
    previous: SyncSnapshot,
    /// Canonical model name -> pull progress
    installing_models: HashMap<String, u8>,
}

/// Orchestrates the local runtime
pub struct RuntimeService {
    ports: RuntimePorts,
    catalog: Arc<ModelCatalog>,
    warmup: Arc<WarmupCoordinator>,
    shutdown: ShutdownFlag,
    config: OrchestratorConfig,
    state: Arc<Mutex<ServiceState>>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for RuntimeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeService")
            .field("config", &self.config)
            .field("shutting_down", &self.shutdown.is_shutting_down())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl RuntimeService {
    /// Wire the service and the catalog and warm-up components it owns
    pub fn new(ports: RuntimePorts, config: OrchestratorConfig) -> Self {
        Self::with_shutdown_flag(ports, config, ShutdownFlag::new())
    }

    /// Like [`Self::new`], sharing `shutdown` with adapters that must stop
    /// accepting calls together with the service
    pub fn with_shutdown_flag(
        ports: RuntimePorts,
        config: OrchestratorConfig,
        shutdown: ShutdownFlag,
    ) -> Self {
        let catalog = Arc::new(
            ModelCatalog::new(
                Arc::clone(&ports.runtime),
                Arc::clone(&ports.events),
                shutdown.clone(),
            )
            .with_config(config.catalog.clone()),
        );

        let warmup = Arc::new(
            WarmupCoordinator::new(
                Arc::clone(&ports.runtime),
                Arc::clone(&catalog),
                Arc::clone(&ports.repository),
                Arc::clone(&ports.selection),
                Arc::clone(&ports.events),
                shutdown.clone(),
            )
            .with_config(config.warmup.clone()),
        );

        Self {
            ports,
            catalog,
            warmup,
            shutdown,
            config,
            state: Arc::new(Mutex::new(ServiceState::default())),
            sync_task: Mutex::new(None),
        }
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn warmup(&self) -> &WarmupCoordinator {
        &self.warmup
    }

    pub fn shutdown_flag(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Current install state
    pub fn install_state(&self) -> InstallState {
        self.state.lock().install.clone()
    }

    /// Accept work again, reconcile once and start the periodic loop
    #[instrument(skip(self))]
    pub async fn init(self: &Arc<Self>) {
        self.shutdown.reset();
        self.sync_state().await;
        self.start_reconciliation();
        info!(
            base_url = %self.ports.runtime.base_url(),
            interval_secs = self.config.sync_interval_secs,
            "Runtime service initialised"
        );
    }

    /// Spawn the reconciliation loop, replacing a running one
    pub fn start_reconciliation(self: &Arc<Self>) {
        let interval = Duration::from_secs(self.config.sync_interval_secs.max(1));
        let service: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Don't run immediately on startup
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(service) = service.upgrade() else {
                    debug!("Runtime service dropped, stopping reconciliation");
                    break;
                };
                service.sync_state().await;
            }
        });

        if let Some(previous) = self.sync_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Abort the reconciliation loop if it runs
    pub fn stop_reconciliation(&self) {
        if let Some(handle) = self.sync_task.lock().take() {
            handle.abort();
            debug!("Reconciliation loop stopped");
        }
    }

    /// Reconcile cached state with what the runtime reports
    ///
    /// Publishes `state-changed` only when the installed or running flags or
    /// the loaded set differ from the previous tick.
    #[instrument(skip(self))]
    pub async fn sync_state(&self) {
        if self.shutdown.is_shutting_down() {
            debug!("Skipping reconciliation during shutdown");
            return;
        }

        let installed = self.ports.process.is_installed().await;
        let running = self.ports.runtime.is_reachable().await;
        let (models, loaded) = if running {
            let models = self.catalog.list_installed().await;
            let loaded = self.catalog.list_loaded().await;
            (
                models.iter().map(|m| canonical_model_name(&m.name)).collect(),
                loaded.iter().map(|m| canonical_model_name(&m.name)).collect(),
            )
        } else {
            (BTreeSet::new(), BTreeSet::new())
        };

        let next = SyncSnapshot {
            installed,
            running,
            models,
            loaded,
        };

        let (previous, changed) = {
            let mut state = self.state.lock();
            state.install.mark_synced(installed);
            let previous = std::mem::replace(&mut state.previous, next.clone());
            let changed = previous.differs_from(&next);
            (previous, changed)
        };

        for dropped in previous.loaded.difference(&next.loaded) {
            self.warmup.remove_from_warmed(dropped);
        }

        if running {
            self.persist_model_changes(&previous.models, &next.models)
                .await;
        }

        if changed {
            info!(installed, running, loaded = next.loaded.len(), "Runtime state changed");
            self.ports.events.publish(RuntimeEvent::StateChanged {
                installed,
                running,
                models: next.models.into_iter().collect(),
                loaded_models: next.loaded.into_iter().collect(),
            });
        }
    }

    async fn persist_model_changes(&self, previous: &BTreeSet<String>, current: &BTreeSet<String>) {
        // An empty listing may mean the query failed
        if current.is_empty() && !previous.is_empty() {
            debug!("Installed list came back empty, keeping persisted flags");
            return;
        }

        for added in current.difference(previous) {
            self.persist_install_status(added, true, false).await;
        }
        for removed in previous.difference(current) {
            self.persist_install_status(removed, false, false).await;
        }
    }

    async fn persist_install_status(&self, name: &str, installed: bool, installing: bool) {
        if let Err(e) = self
            .ports
            .repository
            .update_install_status(name, installed, installing)
            .await
        {
            warn!(model = %name, error = %e, "Failed to persist install status");
        }
    }

    /// Install the runtime, start it and mark it installed
    ///
    /// Rolls back the most recent checkpoint on any failure.
    #[instrument(skip(self))]
    pub async fn install(&self) -> OperationOutcome {
        if let Err(e) = self.shutdown.ensure_accepting() {
            return OperationOutcome::failed(e.to_string());
        }

        {
            let mut state = self.state.lock();
            if state.install.is_installing {
                return OperationOutcome::failed("Installation already in progress");
            }
            state.install.begin_install();
        }

        let events = Arc::clone(&self.ports.events);
        let state = Arc::clone(&self.state);
        let sink: ProgressSink = Arc::new(move |progress: InstallProgress| {
            if let Err(e) = state.lock().install.set_progress(u32::from(progress.progress)) {
                warn!(error = %e, stage = ?progress.stage, "Ignoring install progress");
            }
            events.publish(progress.into());
        });

        match self.run_install(Arc::clone(&sink)).await {
            Ok(()) => {
                self.state.lock().install.finish_install(true);
                self.ports.installer.clear_checkpoints();
                sink(InstallProgress::new(
                    InstallStage::Complete,
                    "Runtime installed and running",
                    100,
                ));
                info!("Runtime installed");
                OperationOutcome::ok()
            },
            Err(e) => {
                error!(error = %e, "Runtime installation failed");

                if let Some(checkpoint) = self.ports.installer.rollback_to_last_checkpoint().await {
                    sink(InstallProgress::new(
                        InstallStage::Rollback,
                        format!("Rolled back to {}", checkpoint.name()),
                        0,
                    ));
                }
                self.state.lock().install.finish_install(false);

                let message = e.to_string();
                let event = match e {
                    ApplicationError::Download(_) | ApplicationError::Redirect(_) => {
                        RuntimeEvent::DownloadError {
                            message: message.clone(),
                        }
                    },
                    _ => RuntimeEvent::error(OperationKind::Install, message.clone()),
                };
                self.ports.events.publish(event);
                OperationOutcome::failed(message)
            },
        }
    }

    async fn run_install(&self, sink: ProgressSink) -> Result<(), ApplicationError> {
        self.ports.installer.auto_install(Arc::clone(&sink)).await?;

        sink(InstallProgress::new(
            InstallStage::Verify,
            "Verifying installation",
            90,
        ));
        let verification = self.ports.installer.verify_installation().await;
        if !verification.success {
            return Err(ApplicationError::Internal(
                verification
                    .error
                    .unwrap_or_else(|| "Installation verification failed".to_string()),
            ));
        }

        if !self.ports.runtime.is_reachable().await {
            sink(InstallProgress::new(
                InstallStage::Start,
                "Starting runtime",
                95,
            ));
            self.ports.process.start().await?;
        }

        Ok(())
    }

    /// Start the runtime if it is installed but not running
    #[instrument(skip(self))]
    pub async fn ensure_ready(&self) -> OperationOutcome {
        if let Err(e) = self.shutdown.ensure_accepting() {
            return OperationOutcome::failed(e.to_string());
        }

        if !self.ports.process.is_installed().await {
            return OperationOutcome::failed("Runtime is not installed");
        }

        if self.ports.runtime.is_reachable().await {
            debug!("Runtime already running");
            return OperationOutcome::ok();
        }

        match self.ports.process.start().await {
            Ok(()) => {
                info!("Runtime started");
                OperationOutcome::ok()
            },
            Err(e) => {
                error!(error = %e, "Failed to start runtime");
                self.ports
                    .events
                    .publish(RuntimeEvent::error(OperationKind::Start, e.to_string()));
                OperationOutcome::failed(e.to_string())
            },
        }
    }

    /// Pull a model, keeping the repository in step
    #[instrument(skip(self), fields(model = %name))]
    pub async fn pull_model(&self, name: &str) -> OperationOutcome {
        if let Err(e) = self.shutdown.ensure_accepting() {
            return OperationOutcome::failed(e.to_string());
        }

        let key = canonical_model_name(name);
        self.state.lock().installing_models.insert(key.clone(), 0);
        self.persist_install_status(name, false, true).await;

        let record = |progress: u8| {
            if let Some(entry) = self.state.lock().installing_models.get_mut(&key) {
                *entry = progress;
            }
        };
        let result = self.catalog.pull_with_progress(name, &record).await;

        self.state.lock().installing_models.remove(&key);

        match result {
            Ok(()) => {
                self.persist_install_status(name, true, false).await;
                OperationOutcome::ok()
            },
            Err(e) => {
                error!(error = %e, "Model pull failed");
                let installed = self.catalog.is_installed(name).await;
                self.persist_install_status(name, installed, false).await;
                self.ports
                    .events
                    .publish(RuntimeEvent::error(OperationKind::Pull, e.to_string()));
                OperationOutcome::failed(e.to_string())
            },
        }
    }

    /// Get `name` resident in memory
    #[instrument(skip(self), fields(model = %name))]
    pub async fn warm_up_model(&self, name: &str, force_refresh: bool) -> OperationOutcome {
        let result = self.warmup.warm_up(name, force_refresh).await;
        self.warmup_outcome(name, result)
    }

    /// Warm the user's selected chat model if the local runtime serves it
    #[instrument(skip(self))]
    pub async fn auto_warm_up(&self) -> OperationOutcome {
        match self.warmup.auto_warm_up_selected_model().await {
            Ok(_) => OperationOutcome::ok(),
            Err(e) => self.warmup_outcome("selected model", Err(e)),
        }
    }

    fn warmup_outcome(&self, name: &str, result: Result<bool, ApplicationError>) -> OperationOutcome {
        match result {
            Ok(true) => OperationOutcome::ok(),
            Ok(false) => {
                let message = format!("Model {name} did not answer the warm-up probe");
                self.ports
                    .events
                    .publish(RuntimeEvent::error(OperationKind::Warmup, message.clone()));
                OperationOutcome::failed(message)
            },
            Err(e @ (ApplicationError::RateLimited { .. } | ApplicationError::ShuttingDown)) => {
                debug!(error = %e, "Warm-up refused");
                OperationOutcome::failed(e.to_string())
            },
            Err(e) => {
                self.ports
                    .events
                    .publish(RuntimeEvent::error(OperationKind::Warmup, e.to_string()));
                OperationOutcome::failed(e.to_string())
            },
        }
    }

    /// Composite status snapshot
    pub async fn get_status(&self) -> RuntimeStatus {
        let installed = self.ports.process.is_installed().await;
        let running = !self.shutdown.is_shutting_down() && self.ports.runtime.is_reachable().await;
        let loaded_models = if running {
            self.catalog
                .list_loaded()
                .await
                .into_iter()
                .map(|m| m.name)
                .collect()
        } else {
            Vec::new()
        };

        let state = self.state.lock();
        RuntimeStatus {
            base_url: self.ports.runtime.base_url(),
            installed,
            installing: state.install.is_installing,
            running,
            progress: state.install.progress,
            loaded_models,
            last_sync: state.install.last_sync,
            shutting_down: self.shutdown.is_shutting_down(),
        }
    }

    /// Installed and in-progress models merged with warm-up state
    pub async fn get_models_with_status(&self) -> Vec<ModelView> {
        let installing = self.state.lock().installing_models.clone();
        let snapshot = self.warmup.snapshot();
        self.catalog.list_with_status(&snapshot, &installing).await
    }

    /// Liveness ping with response time and runtime version
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> RuntimeHealth {
        let start = Instant::now();
        if !self.ports.runtime.is_reachable().await {
            debug!("Runtime unreachable");
            return RuntimeHealth::unreachable();
        }
        let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        RuntimeHealth {
            reachable: true,
            response_time_ms: Some(elapsed),
            version: self.ports.process.version().await,
            checked_at: chrono::Utc::now(),
        }
    }

    /// Stop accepting work, drain, and terminate the runtime if it runs
    #[instrument(skip(self))]
    pub async fn shutdown(&self, force: bool) -> OperationOutcome {
        info!(force, "Shutting down runtime service");
        self.shutdown.trigger();

        self.warmup.shutdown(force).await;
        self.stop_reconciliation();

        {
            let mut state = self.state.lock();
            state.installing_models.clear();
            state.previous = SyncSnapshot::default();
        }
        self.ports.installer.clear_checkpoints();

        if !self.ports.terminator.is_process_running().await {
            debug!("Runtime not running, nothing to terminate");
            return OperationOutcome::ok();
        }

        if self.ports.terminator.shutdown(force).await {
            info!("Runtime terminated");
            OperationOutcome::ok()
        } else {
            let message = "Runtime still running after shutdown".to_string();
            warn!("{message}");
            self.ports
                .events
                .publish(RuntimeEvent::error(OperationKind::Shutdown, message.clone()));
            OperationOutcome::failed(message)
        }
    }
}

impl Drop for RuntimeService {
    fn drop(&mut self) {
        if let Some(handle) = self.sync_task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{
        InstallVerification, MockModelRepositoryPort, MockRuntimeInstallerPort,
        MockRuntimeProcessPort, MockRuntimeShutdownPort, MockSelectedModelPort, PullProgressLine,
        PullStream,
    };
    use crate::services::test_support::RecordingPublisher;
    use async_trait::async_trait;
    use domain::{Checkpoint, InstallPhase, InstalledModel, LoadedModel};
    use futures::stream;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Hand-rolled runtime whose answers tests can change between calls
    #[derive(Default)]
    struct FakeRuntime {
        reachable: AtomicBool,
        installed: Mutex<Vec<String>>,
        loaded: Mutex<Vec<String>>,
        pull_lines: Mutex<Vec<PullProgressLine>>,
        probe_delay: Mutex<Duration>,
        probes: AtomicUsize,
        probe_completions: Mutex<Vec<Instant>>,
    }

    impl FakeRuntime {
        fn running() -> Arc<Self> {
            let fake = Self::default();
            fake.reachable.store(true, Ordering::SeqCst);
            Arc::new(fake)
        }

        fn set_installed(&self, names: &[&str]) {
            *self.installed.lock() = names.iter().map(ToString::to_string).collect();
        }

        fn set_loaded(&self, names: &[&str]) {
            *self.loaded.lock() = names.iter().map(ToString::to_string).collect();
        }
    }

    #[async_trait]
    impl RuntimeApiPort for FakeRuntime {
        fn base_url(&self) -> String {
            "http://127.0.0.1:11434".to_string()
        }

        async fn is_reachable(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }

        async fn list_installed(&self) -> Result<Vec<InstalledModel>, ApplicationError> {
            Ok(self.installed.lock().iter().map(InstalledModel::named).collect())
        }

        async fn list_loaded(&self) -> Result<Vec<LoadedModel>, ApplicationError> {
            Ok(self.loaded.lock().iter().map(LoadedModel::named).collect())
        }

        async fn probe_chat(&self, _model: &str, _prompt: &str) -> Result<(), ApplicationError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let delay = *self.probe_delay.lock();
            tokio::time::sleep(delay).await;
            self.probe_completions.lock().push(Instant::now());
            Ok(())
        }

        async fn pull(&self, _model: &str) -> Result<PullStream, ApplicationError> {
            let lines: Vec<_> = self.pull_lines.lock().drain(..).map(Ok).collect();
            Ok(Box::pin(stream::iter(lines)))
        }
    }

    struct Harness {
        runtime: Arc<FakeRuntime>,
        process: MockRuntimeProcessPort,
        installer: MockRuntimeInstallerPort,
        terminator: MockRuntimeShutdownPort,
        repository: MockModelRepositoryPort,
        events: Arc<RecordingPublisher>,
    }

    impl Harness {
        fn new(runtime: Arc<FakeRuntime>) -> Self {
            let mut installer = MockRuntimeInstallerPort::new();
            installer.expect_clear_checkpoints().returning(|| ());
            Self {
                runtime,
                process: MockRuntimeProcessPort::new(),
                installer,
                terminator: MockRuntimeShutdownPort::new(),
                repository: MockModelRepositoryPort::new(),
                events: RecordingPublisher::shared(),
            }
        }

        fn build(self) -> Arc<RuntimeService> {
            let ports = RuntimePorts {
                runtime: self.runtime,
                process: Arc::new(self.process),
                installer: Arc::new(self.installer),
                terminator: Arc::new(self.terminator),
                repository: Arc::new(self.repository),
                selection: Arc::new(MockSelectedModelPort::new()),
                events: self.events,
            };
            Arc::new(RuntimeService::new(ports, OrchestratorConfig::default()))
        }
    }

    #[tokio::test]
    async fn reconciliation_is_edge_triggered() {
        let runtime = FakeRuntime::running();
        runtime.set_installed(&["llama3:latest", "phi3:latest"]);
        runtime.set_loaded(&["llama3:latest"]);

        let mut harness = Harness::new(Arc::clone(&runtime));
        harness.process.expect_is_installed().returning(|| true);
        harness
            .repository
            .expect_update_install_status()
            .times(2)
            .returning(|_, _, _| Ok(()));
        let events = harness.events.clone();
        let service = harness.build();

        service.sync_state().await;
        assert_eq!(events.count("state-changed"), 1);

        service.sync_state().await;
        assert_eq!(events.count("state-changed"), 1);

        service.warm_up_model("llama3", false).await;
        service.warm_up_model("phi3", false).await;
        assert!(service.warmup().is_warmed("llama3"));

        runtime.set_loaded(&["phi3:latest"]);
        service.sync_state().await;
        assert_eq!(events.count("state-changed"), 2);
        assert!(!service.warmup().is_warmed("llama3"));
        assert!(service.warmup().is_warmed("phi3"));
    }

    #[tokio::test]
    async fn first_sync_matching_defaults_is_silent() {
        let runtime = Arc::new(FakeRuntime::default());
        let mut harness = Harness::new(runtime);
        harness.process.expect_is_installed().returning(|| false);
        harness.repository.expect_update_install_status().never();
        let events = harness.events.clone();
        let service = harness.build();

        service.sync_state().await;
        assert!(events.events().is_empty());
        assert!(service.install_state().last_sync.is_some());
    }

    #[tokio::test]
    async fn pull_model_tracks_repository_state() {
        let runtime = FakeRuntime::running();
        *runtime.pull_lines.lock() = vec![
            PullProgressLine::status("pulling manifest"),
            PullProgressLine::bytes("pulling 6a0746a1ec1a", 2_000, 4_000),
            PullProgressLine::bytes("pulling 6a0746a1ec1a", 4_000, 4_000),
            PullProgressLine::status("verifying sha256 digest"),
            PullProgressLine::status("writing manifest"),
            PullProgressLine::status("success"),
        ];

        let mut harness = Harness::new(runtime);
        let mut seq = mockall::Sequence::new();
        harness
            .repository
            .expect_update_install_status()
            .withf(|name, installed, installing| name == "llama3" && !*installed && *installing)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        harness
            .repository
            .expect_update_install_status()
            .withf(|name, installed, installing| name == "llama3" && *installed && !*installing)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        let events = harness.events.clone();
        let service = harness.build();

        let outcome = service.pull_model("llama3").await;
        assert!(outcome.success);

        let progress: Vec<u8> = events
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RuntimeEvent::ModelPullProgress { progress, .. } => Some(progress),
                _ => None,
            })
            .collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100));
        assert_eq!(events.count("model-pull-complete"), 1);
    }

    #[tokio::test]
    async fn failed_pull_records_final_state() {
        let runtime = FakeRuntime::running();
        *runtime.pull_lines.lock() = vec![PullProgressLine::status("pulling manifest")];

        let mut harness = Harness::new(runtime);
        harness
            .repository
            .expect_update_install_status()
            .withf(|_, installed, installing| !*installed && *installing)
            .times(1)
            .returning(|_, _, _| Ok(()));
        harness
            .repository
            .expect_update_install_status()
            .withf(|_, installed, installing| !*installed && !*installing)
            .times(1)
            .returning(|_, _, _| Ok(()));
        let events = harness.events.clone();
        let service = harness.build();

        let outcome = service.pull_model("llama3").await;
        assert!(!outcome.success);
        assert_eq!(events.count("error"), 1);
        assert!(service.get_models_with_status().await.is_empty());
    }

    #[tokio::test]
    async fn install_rolls_back_on_failure() {
        let runtime = Arc::new(FakeRuntime::default());
        let mut harness = Harness::new(runtime);
        harness
            .installer
            .expect_auto_install()
            .times(1)
            .returning(|_| Err(ApplicationError::Download("HTTP 503".into())));
        harness
            .installer
            .expect_rollback_to_last_checkpoint()
            .times(1)
            .returning(|| Some(Checkpoint::now(InstallPhase::PostDownload)));
        harness.process.expect_start().never();
        let events = harness.events.clone();
        let service = harness.build();

        let outcome = service.install().await;
        assert!(!outcome.success);
        assert_eq!(events.count("download-error"), 1);
        let state = service.install_state();
        assert!(!state.is_installed);
        assert!(!state.is_installing);
    }

    #[tokio::test]
    async fn install_starts_runtime_when_not_running() {
        let runtime = Arc::new(FakeRuntime::default());
        let mut harness = Harness::new(runtime);
        harness
            .installer
            .expect_auto_install()
            .times(1)
            .returning(|_| Ok(()));
        harness
            .installer
            .expect_verify_installation()
            .returning(InstallVerification::passed);
        harness.installer.expect_rollback_to_last_checkpoint().never();
        harness.process.expect_start().times(1).returning(|| Ok(()));
        let events = harness.events.clone();
        let service = harness.build();

        assert!(service.install().await.success);
        assert!(service.install_state().is_installed);
        assert!(events.count("install-progress") >= 2);
    }

    #[tokio::test]
    async fn out_of_range_install_progress_does_not_abort_install() {
        let runtime = FakeRuntime::running();
        let mut harness = Harness::new(runtime);
        harness.installer.expect_auto_install().returning(|sink| {
            sink(InstallProgress {
                stage: InstallStage::Download,
                message: "Downloading".to_string(),
                progress: 250,
            });
            sink(InstallProgress::new(InstallStage::Download, "Downloading", 40));
            Ok(())
        });
        harness
            .installer
            .expect_verify_installation()
            .returning(InstallVerification::passed);
        harness.installer.expect_rollback_to_last_checkpoint().never();
        let events = harness.events.clone();
        let service = harness.build();

        assert!(service.install().await.success);
        let state = service.install_state();
        assert!(state.is_installed);
        assert_eq!(state.progress, 100);
        assert!(events.count("install-progress") >= 3);
    }

    #[tokio::test]
    async fn install_rolls_back_when_verification_fails() {
        let runtime = Arc::new(FakeRuntime::default());
        let mut harness = Harness::new(runtime);
        harness.installer.expect_auto_install().returning(|_| Ok(()));
        harness
            .installer
            .expect_verify_installation()
            .returning(|| InstallVerification::failed("binary missing"));
        harness
            .installer
            .expect_rollback_to_last_checkpoint()
            .times(1)
            .returning(|| Some(Checkpoint::now(InstallPhase::PostInstall)));
        let events = harness.events.clone();
        let service = harness.build();

        let outcome = service.install().await;
        assert_eq!(outcome.error.as_deref(), Some("Internal error: binary missing"));
        assert_eq!(events.count("error"), 1);
    }

    #[tokio::test]
    async fn ensure_ready_only_starts_installed_runtime() {
        let runtime = Arc::new(FakeRuntime::default());
        let mut harness = Harness::new(runtime);
        harness.process.expect_is_installed().returning(|| true);
        harness.process.expect_start().times(1).returning(|| Ok(()));
        let service = harness.build();
        assert!(service.ensure_ready().await.success);

        let runtime = Arc::new(FakeRuntime::default());
        let mut harness = Harness::new(runtime);
        harness.process.expect_is_installed().returning(|| false);
        harness.process.expect_start().never();
        let service = harness.build();
        assert!(!service.ensure_ready().await.success);
    }

    #[tokio::test]
    async fn shutdown_drains_warmups_before_terminating() {
        let runtime = FakeRuntime::running();
        *runtime.probe_delay.lock() = Duration::from_millis(100);

        let terminated_at = Arc::new(Mutex::new(None));
        let mut harness = Harness::new(Arc::clone(&runtime));
        harness
            .terminator
            .expect_is_process_running()
            .returning(|| true);
        let recorded = Arc::clone(&terminated_at);
        harness
            .terminator
            .expect_shutdown()
            .withf(|force| !*force)
            .times(1)
            .returning(move |_| {
                *recorded.lock() = Some(Instant::now());
                true
            });
        let service = harness.build();

        let first = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.warm_up_model("llama3", false).await })
        };
        let second = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.warm_up_model("phi3", false).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(service.warmup().is_warming("llama3"));

        assert!(service.shutdown(false).await.success);

        let completions = runtime.probe_completions.lock().clone();
        assert_eq!(completions.len(), 2);
        let terminated = terminated_at.lock().expect("terminator called");
        assert!(completions.iter().all(|done| *done <= terminated));

        assert!(first.await.unwrap().success);
        assert!(second.await.unwrap().success);
        assert!(service.shutdown_flag().is_shutting_down());
    }

    #[tokio::test]
    async fn shutdown_skips_terminator_when_not_running() {
        let runtime = Arc::new(FakeRuntime::default());
        let mut harness = Harness::new(runtime);
        harness
            .terminator
            .expect_is_process_running()
            .returning(|| false);
        harness.terminator.expect_shutdown().never();
        let service = harness.build();

        assert!(service.shutdown(true).await.success);
        assert!(!service.pull_model("llama3").await.success);
    }

    #[tokio::test]
    async fn health_check_reports_version() {
        let runtime = FakeRuntime::running();
        let mut harness = Harness::new(runtime);
        harness
            .process
            .expect_version()
            .returning(|| Some("0.5.7".to_string()));
        let service = harness.build();

        let health = service.health_check().await;
        assert!(health.reachable);
        assert_eq!(health.version.as_deref(), Some("0.5.7"));
        assert!(health.response_time_ms.is_some());
    }

    #[tokio::test]
    async fn status_reflects_runtime() {
        let runtime = FakeRuntime::running();
        runtime.set_loaded(&["llama3:latest"]);
        let mut harness = Harness::new(runtime);
        harness.process.expect_is_installed().returning(|| true);
        let service = harness.build();

        let status = service.get_status().await;
        assert!(status.installed);
        assert!(status.running);
        assert_eq!(status.loaded_models, vec!["llama3:latest".to_string()]);
        assert!(!status.shutting_down);
    }
}
