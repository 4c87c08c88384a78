//! Warm-up coordinator
//!
//! Gets models into the runtime's memory ahead of the first real request.
//! At most one probe runs per model name; concurrent callers join it and
//! share its outcome. Attempts for the same model are spaced by a cooldown.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::{RuntimeEvent, canonical_model_name};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, warn};

use super::model_catalog::ModelCatalog;
use crate::{
    error::ApplicationError,
    lifecycle::ShutdownFlag,
    ports::{
        EventPublisher, LOCAL_RUNTIME_PROVIDER, ModelKind, ModelRepositoryPort, RuntimeApiPort,
        SelectedModelPort,
    },
};

/// Configuration for warm-up behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupConfig {
    /// Minimum spacing between two attempts for the same model
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Prompt sent by the probe
    #[serde(default = "default_probe_prompt")]
    pub probe_prompt: String,
}

const fn default_cooldown_ms() -> u64 {
    5000
}

fn default_probe_prompt() -> String {
    "hi".to_string()
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            probe_prompt: default_probe_prompt(),
        }
    }
}

impl WarmupConfig {
    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Point-in-time copy of the warm-up sets, keyed by canonical model name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmupSnapshot {
    pub warming: HashSet<String>,
    pub warmed: HashSet<String>,
}

impl WarmupSnapshot {
    pub fn is_warming(&self, name: &str) -> bool {
        self.warming.contains(&canonical_model_name(name))
    }

    pub fn is_warmed(&self, name: &str) -> bool {
        self.warmed.contains(&canonical_model_name(name))
    }
}

type ProbeHandle = Shared<BoxFuture<'static, bool>>;

struct InFlight {
    handle: ProbeHandle,
    abort: AbortHandle,
    generation: u64,
}

/// Warm-up bookkeeping; `generation` is bumped on every reset so probes
/// started before it cannot mark their model warm afterwards
#[derive(Default)]
struct WarmupState {
    warming: HashMap<String, InFlight>,
    warmed: HashSet<String>,
    last_attempt: HashMap<String, Instant>,
    generation: u64,
}

/// Removes the in-flight entry when the probe task ends, however it ends
struct WarmingGuard {
    state: Arc<Mutex<WarmupState>>,
    key: String,
    generation: u64,
}

impl WarmingGuard {
    /// Record a successful probe unless state was reset while it ran
    fn settle(&self, model: &str, events: &dyn EventPublisher) -> bool {
        let mut state = self.state.lock();
        if state.generation != self.generation {
            debug!(model = %model, "Warm-up finished after reset, discarding");
            return false;
        }
        state.warmed.insert(self.key.clone());
        info!(model = %model, "Model warmed up");
        events.publish(RuntimeEvent::ModelWarmedUp {
            model: model.to_string(),
        });
        true
    }
}

impl Drop for WarmingGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state
            .warming
            .get(&self.key)
            .is_some_and(|f| f.generation == self.generation)
        {
            state.warming.remove(&self.key);
        }
    }
}

/// Everything one probe task needs, detached from the coordinator
struct Probe {
    model: String,
    prompt: String,
    runtime: Arc<dyn RuntimeApiPort>,
    catalog: Arc<ModelCatalog>,
    repository: Arc<dyn ModelRepositoryPort>,
    events: Arc<dyn EventPublisher>,
}

impl Probe {
    async fn run(&self) -> bool {
        match self.runtime.probe_chat(&self.model, &self.prompt).await {
            Ok(()) => true,
            Err(e) if e.is_model_not_found() => self.install_and_retry().await,
            Err(e) => {
                warn!(model = %self.model, error = %e, "Warm-up probe failed");
                false
            },
        }
    }

    async fn install_and_retry(&self) -> bool {
        info!(model = %self.model, "Model missing, pulling before warm-up");

        if let Err(e) = self.catalog.pull(&self.model).await {
            warn!(model = %self.model, error = %e, "Auto-install during warm-up failed");
            return false;
        }

        if let Err(e) = self
            .repository
            .update_install_status(&self.model, true, false)
            .await
        {
            warn!(model = %self.model, error = %e, "Failed to persist install status");
        }

        match self.runtime.probe_chat(&self.model, &self.prompt).await {
            Ok(()) => true,
            Err(e) => {
                warn!(model = %self.model, error = %e, "Warm-up probe failed after install");
                false
            },
        }
    }
}

/// Coordinates warm-up probes per model name
pub struct WarmupCoordinator {
    runtime: Arc<dyn RuntimeApiPort>,
    catalog: Arc<ModelCatalog>,
    repository: Arc<dyn ModelRepositoryPort>,
    selection: Arc<dyn SelectedModelPort>,
    events: Arc<dyn EventPublisher>,
    shutdown: ShutdownFlag,
    config: WarmupConfig,
    state: Arc<Mutex<WarmupState>>,
}

impl fmt::Debug for WarmupCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WarmupCoordinator")
            .field("config", &self.config)
            .field("warming", &state.warming.len())
            .field("warmed", &state.warmed)
            .finish_non_exhaustive()
    }
}

impl WarmupCoordinator {
    pub fn new(
        runtime: Arc<dyn RuntimeApiPort>,
        catalog: Arc<ModelCatalog>,
        repository: Arc<dyn ModelRepositoryPort>,
        selection: Arc<dyn SelectedModelPort>,
        events: Arc<dyn EventPublisher>,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            runtime,
            catalog,
            repository,
            selection,
            events,
            shutdown,
            config: WarmupConfig::default(),
            state: Arc::new(Mutex::new(WarmupState::default())),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: WarmupConfig) -> Self {
        self.config = config;
        self
    }

    /// Make `name` resident in the runtime's memory
    ///
    /// Returns `Ok(true)` once the model answered a probe, `Ok(false)` when
    /// the probe failed. Fails with `RateLimited` inside the cooldown window
    /// and with `ShuttingDown` once shutdown has begun.
    #[instrument(skip(self), fields(model = %name))]
    pub async fn warm_up(&self, name: &str, force_refresh: bool) -> Result<bool, ApplicationError> {
        self.shutdown.ensure_accepting()?;
        let key = canonical_model_name(name);

        let probe = {
            let mut state = self.state.lock();

            if !force_refresh && state.warmed.contains(&key) {
                debug!("Model already warm");
                return Ok(true);
            }

            if let Some(in_flight) = state.warming.get(&key) {
                debug!("Joining in-flight warm-up");
                in_flight.handle.clone()
            } else {
                if let Some(last) = state.last_attempt.get(&key) {
                    let elapsed = last.elapsed();
                    let cooldown = self.config.cooldown();
                    if elapsed < cooldown {
                        let retry_after_ms =
                            u64::try_from((cooldown - elapsed).as_millis()).unwrap_or(u64::MAX);
                        debug!(retry_after_ms, "Warm-up inside cooldown window");
                        return Err(ApplicationError::RateLimited {
                            model: key,
                            retry_after_ms,
                        });
                    }
                }

                state.last_attempt.insert(key.clone(), Instant::now());
                state.warmed.remove(&key);

                let in_flight = self.spawn_probe(name, key.clone(), state.generation);
                let handle = in_flight.handle.clone();
                state.warming.insert(key, in_flight);
                handle
            }
        };

        Ok(probe.await)
    }

    fn spawn_probe(&self, name: &str, key: String, generation: u64) -> InFlight {
        let probe = Probe {
            model: name.to_string(),
            prompt: self.config.probe_prompt.clone(),
            runtime: Arc::clone(&self.runtime),
            catalog: Arc::clone(&self.catalog),
            repository: Arc::clone(&self.repository),
            events: Arc::clone(&self.events),
        };
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            let guard = WarmingGuard {
                state,
                key,
                generation,
            };
            probe.run().await && guard.settle(&probe.model, probe.events.as_ref())
        });
        let abort = task.abort_handle();

        let handle = async move {
            task.await.unwrap_or_else(|e| {
                debug!(error = %e, "Warm-up task aborted");
                false
            })
        }
        .boxed()
        .shared();

        InFlight {
            handle,
            abort,
            generation,
        }
    }

    /// Warm the user's selected chat model when the local runtime serves it
    ///
    /// Returns `Ok(false)` when there is nothing to warm.
    #[instrument(skip(self))]
    pub async fn auto_warm_up_selected_model(&self) -> Result<bool, ApplicationError> {
        self.shutdown.ensure_accepting()?;

        let selected = self.selection.selected_models().await?;
        let Some(chat) = selected.into_iter().find(|m| m.kind == ModelKind::Chat) else {
            debug!("No chat model selected");
            return Ok(false);
        };

        let provider = self
            .selection
            .provider_for_model(ModelKind::Chat, &chat.id)
            .await;
        if provider.as_deref() != Some(LOCAL_RUNTIME_PROVIDER) {
            debug!(model = %chat.id, provider = ?provider, "Selected model not served locally");
            return Ok(false);
        }

        if !self.runtime.is_reachable().await {
            debug!("Runtime not running, dropping cached warm-up state");
            self.clear();
            return Ok(false);
        }

        self.warm_up(&chat.id, false).await
    }

    /// Forget that `name` was warm
    pub fn remove_from_warmed(&self, name: &str) {
        let key = canonical_model_name(name);
        if self.state.lock().warmed.remove(&key) {
            debug!(model = %key, "Model no longer warm");
        }
    }

    /// Drop cached warm state and cooldowns
    ///
    /// In-flight probes keep running and can still be joined, but they no
    /// longer mark their model warm.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.warmed.clear();
        state.last_attempt.clear();
    }

    pub fn is_warmed(&self, name: &str) -> bool {
        self.state.lock().warmed.contains(&canonical_model_name(name))
    }

    pub fn is_warming(&self, name: &str) -> bool {
        self.state
            .lock()
            .warming
            .contains_key(&canonical_model_name(name))
    }

    pub fn snapshot(&self) -> WarmupSnapshot {
        let state = self.state.lock();
        WarmupSnapshot {
            warming: state.warming.keys().cloned().collect(),
            warmed: state.warmed.clone(),
        }
    }

    /// Settle in-flight probes unless `force`, then clear all state
    ///
    /// A forced shutdown aborts in-flight probes instead of waiting.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, force: bool) {
        if !force {
            let pending: Vec<ProbeHandle> = self
                .state
                .lock()
                .warming
                .values()
                .map(|f| f.handle.clone())
                .collect();
            if !pending.is_empty() {
                info!(count = pending.len(), "Waiting for in-flight warm-ups");
                join_all(pending).await;
            }
        }

        let aborted: Vec<AbortHandle> = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.warmed.clear();
            state.last_attempt.clear();
            state.warming.drain().map(|(_, f)| f.abort).collect()
        };
        if !aborted.is_empty() {
            info!(count = aborted.len(), "Aborting in-flight warm-ups");
        }
        for abort in aborted {
            abort.abort();
        }
    }
}
