//! Model catalog
//!
//! Answers "what is installed" and "what is in memory" from the runtime's
//! API and drives model pulls. Listing failures degrade to an empty list:
//! callers must read empty as "unknown", not as "none".

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use domain::{
    InstalledModel, LoadedModel, ModelStatus, ModelView, RuntimeEvent, canonical_model_name,
    same_model,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::pull_progress::PullProgressTracker;
use super::warmup_coordinator::WarmupSnapshot;
use crate::{
    error::ApplicationError,
    lifecycle::ShutdownFlag,
    ports::{EventPublisher, RuntimeApiPort},
};

/// Configuration for the model catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Yield to the scheduler after this many models while building views
    #[serde(default = "default_yield_every")]
    pub yield_every: usize,

    /// Fail a pull that produces no progress line for this long
    #[serde(default = "default_pull_idle_timeout")]
    pub pull_idle_timeout_secs: u64,
}

const fn default_yield_every() -> usize {
    50
}

const fn default_pull_idle_timeout() -> u64 {
    300
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            yield_every: default_yield_every(),
            pull_idle_timeout_secs: default_pull_idle_timeout(),
        }
    }
}

/// Catalog of installed and loaded models
pub struct ModelCatalog {
    runtime: Arc<dyn RuntimeApiPort>,
    events: Arc<dyn EventPublisher>,
    shutdown: ShutdownFlag,
    config: CatalogConfig,
}

impl fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("config", &self.config)
            .field("shutting_down", &self.shutdown.is_shutting_down())
            .finish_non_exhaustive()
    }
}

impl ModelCatalog {
    /// Create a catalog with default configuration
    pub fn new(
        runtime: Arc<dyn RuntimeApiPort>,
        events: Arc<dyn EventPublisher>,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            runtime,
            events,
            shutdown,
            config: CatalogConfig::default(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: CatalogConfig) -> Self {
        self.config = config;
        self
    }

    /// Installed models; empty when the runtime cannot be asked
    #[instrument(skip(self))]
    pub async fn list_installed(&self) -> Vec<InstalledModel> {
        if self.shutdown.is_shutting_down() {
            debug!("Skipping installed-model query during shutdown");
            return Vec::new();
        }
        match self.runtime.list_installed().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "Failed to list installed models");
                Vec::new()
            },
        }
    }

    /// Models resident in memory; empty when the runtime cannot be asked
    #[instrument(skip(self))]
    pub async fn list_loaded(&self) -> Vec<LoadedModel> {
        if self.shutdown.is_shutting_down() {
            debug!("Skipping loaded-model query during shutdown");
            return Vec::new();
        }
        match self.runtime.list_loaded().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "Failed to list loaded models");
                Vec::new()
            },
        }
    }

    /// Whether `name` is in the runtime's local store
    pub async fn is_installed(&self, name: &str) -> bool {
        self.list_installed()
            .await
            .iter()
            .any(|m| same_model(&m.name, name))
    }

    /// Whether `name` is resident in memory
    pub async fn is_loaded(&self, name: &str) -> bool {
        self.list_loaded()
            .await
            .iter()
            .any(|m| same_model(&m.name, name))
    }

    /// Pull a model, emitting progress events until the runtime reports success
    pub async fn pull(&self, name: &str) -> Result<(), ApplicationError> {
        self.pull_with_progress(name, &|_| {}).await
    }

    /// Like [`pull`](Self::pull), also handing each progress value to `on_progress`
    #[instrument(skip(self, on_progress), fields(model = %name))]
    pub async fn pull_with_progress(
        &self,
        name: &str,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<(), ApplicationError> {
        self.shutdown.ensure_accepting()?;

        let pull_error = |reason: String| ApplicationError::Pull {
            model: name.to_string(),
            reason,
        };

        let mut stream = self
            .runtime
            .pull(name)
            .await
            .map_err(|e| pull_error(e.to_string()))?;

        let idle = Duration::from_secs(self.config.pull_idle_timeout_secs);
        let mut tracker = PullProgressTracker::new();

        info!("Pulling model");

        loop {
            let line = match tokio::time::timeout(idle, stream.next()).await {
                Err(_) => {
                    warn!(
                        progress = tracker.current(),
                        idle_secs = idle.as_secs(),
                        "Pull stalled"
                    );
                    return Err(pull_error(format!(
                        "stalled: no progress for {}s",
                        idle.as_secs()
                    )));
                },
                Ok(None) => {
                    return Err(pull_error(
                        "stream ended before the runtime reported success".to_string(),
                    ));
                },
                Ok(Some(Err(e))) => return Err(pull_error(e.to_string())),
                Ok(Some(Ok(line))) => line,
            };

            if let Some(reason) = line.error {
                return Err(pull_error(reason));
            }

            let progress = tracker.observe(&line.status, line.completed, line.total);
            on_progress(progress);
            self.events.publish(RuntimeEvent::ModelPullProgress {
                model: name.to_string(),
                status: line.status.clone(),
                progress,
            });

            if line.is_success() {
                info!("Model pull complete");
                self.events.publish(RuntimeEvent::ModelPullComplete {
                    model: name.to_string(),
                });
                return Ok(());
            }
        }
    }

    /// Merge installed models with warm-up state and in-progress pulls
    ///
    /// `installing` maps canonical model names to pull progress.
    #[instrument(skip(self, warmup, installing))]
    pub async fn list_with_status(
        &self,
        warmup: &WarmupSnapshot,
        installing: &HashMap<String, u8>,
    ) -> Vec<ModelView> {
        let installed = self.list_installed().await;
        let loaded: HashSet<String> = self
            .list_loaded()
            .await
            .iter()
            .map(|m| canonical_model_name(&m.name))
            .collect();

        let yield_every = self.config.yield_every.max(1);
        let mut seen = HashSet::with_capacity(installed.len());
        let mut views = Vec::with_capacity(installed.len() + installing.len());

        for (index, model) in installed.iter().enumerate() {
            if index > 0 && index % yield_every == 0 {
                tokio::task::yield_now().await;
            }

            let canonical = canonical_model_name(&model.name);
            let pulling = installing.get(&canonical).copied();
            let warming = warmup.is_warming(&canonical);
            let warmed = warmup.is_warmed(&canonical);
            let is_loaded = loaded.contains(&canonical);

            views.push(ModelView {
                name: model.name.clone(),
                installed: true,
                installing: pulling.is_some(),
                progress: pulling.unwrap_or(100),
                warmed_up: warmed,
                is_loaded,
                status: ModelStatus::resolve(warming, is_loaded, warmed),
            });
            seen.insert(canonical);
        }

        let mut pending: Vec<_> = installing
            .iter()
            .filter(|(name, _)| !seen.contains(*name))
            .collect();
        pending.sort_by(|a, b| a.0.cmp(b.0));

        for (name, progress) in pending {
            views.push(ModelView {
                name: name.clone(),
                installed: false,
                installing: true,
                progress: *progress,
                warmed_up: false,
                is_loaded: false,
                status: ModelStatus::Cold,
            });
        }

        views
    }
}
