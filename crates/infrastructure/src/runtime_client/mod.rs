//! Runtime HTTP API client
//!
//! Every API call goes through one queued slot: a caller waits for the call
//! in flight to finish before issuing its own, and the wait plus the call
//! share one deadline. Pull requests hold the slot only until the response
//! headers arrive; the body is decoded outside it. The liveness ping uses
//! neither the slot nor the shutdown flag.

mod ndjson;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use application::{ApplicationError, PullProgressLine, PullStream, RuntimeApiPort, ShutdownFlag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{InstalledModel, LoadedModel};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub use ndjson::{LineDecoder, decode_stream, parse_line};

use crate::config::RuntimeConfig;

/// Adapter for the runtime's HTTP API
pub struct RuntimeClient {
    client: Client,
    config: RuntimeConfig,
    gate: Arc<Mutex<()>>,
    shutdown: ShutdownFlag,
}

impl fmt::Debug for RuntimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeClient")
            .field("base_url", &self.config.base_url)
            .field("api_timeout_ms", &self.config.api_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl RuntimeClient {
    pub fn new(config: RuntimeConfig, shutdown: ShutdownFlag) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApplicationError::Configuration(e.to_string()))?;

        info!(base_url = %config.base_url, "Initialized runtime client");

        Ok(Self {
            client,
            config,
            gate: Arc::new(Mutex::new(())),
            shutdown,
        })
    }

    /// Build the API URL for a given endpoint
    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Run `call` inside the single-flight slot, bounded by the API timeout
    async fn gated<T, F, Fut>(&self, call: F) -> Result<T, ApplicationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        self.shutdown.ensure_accepting()?;

        let deadline = Duration::from_millis(self.config.api_timeout_ms);
        let gate = Arc::clone(&self.gate);

        tokio::time::timeout(deadline, async move {
            let _slot = gate.lock().await;
            call().await
        })
        .await
        .unwrap_or_else(|_| {
            warn!(timeout_ms = self.config.api_timeout_ms, "Runtime API call timed out");
            Err(ApplicationError::Timeout(self.config.api_timeout_ms))
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, ApplicationError> {
        let url = self.api_url(endpoint);
        self.gated(|| async move {
            let response = self.client.get(&url).send().await.map_err(transport_error)?;
            let response = ensure_success(response).await?;
            response
                .json::<T>()
                .await
                .map_err(|e| ApplicationError::ExternalService(format!("invalid response: {e}")))
        })
        .await
    }
}

fn transport_error(err: reqwest::Error) -> ApplicationError {
    ApplicationError::ExternalService(err.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, ApplicationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "Runtime request failed");
    Err(ApplicationError::ExternalService(format!(
        "Status {status}: {body}"
    )))
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// `GET /api/tags` response
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagsModel>,
}

#[derive(Debug, Deserialize)]
struct TagsModel {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    modified_at: Option<String>,
}

/// `GET /api/ps` response
#[derive(Debug, Deserialize)]
struct PsResponse {
    #[serde(default)]
    models: Vec<PsModel>,
}

#[derive(Debug, Deserialize)]
struct PsModel {
    name: String,
    #[serde(default)]
    size_vram: u64,
    #[serde(default)]
    expires_at: Option<String>,
}

/// Smallest possible chat completion
#[derive(Debug, Serialize)]
struct ProbeRequest<'a> {
    model: &'a str,
    messages: [ProbeMessage<'a>; 1],
    stream: bool,
    keep_alive: &'a str,
    options: ProbeOptions,
}

#[derive(Debug, Serialize)]
struct ProbeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ProbeOptions {
    num_predict: u32,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[async_trait]
impl RuntimeApiPort for RuntimeClient {
    fn base_url(&self) -> String {
        self.config.base_url.clone()
    }

    #[instrument(skip(self))]
    async fn is_reachable(&self) -> bool {
        let response = self
            .client
            .get(&self.config.base_url)
            .timeout(Duration::from_millis(self.config.liveness_timeout_ms))
            .send()
            .await;

        match response {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Runtime not reachable");
                false
            },
        }
    }

    #[instrument(skip(self))]
    async fn list_installed(&self) -> Result<Vec<InstalledModel>, ApplicationError> {
        let tags: TagsResponse = self.get_json("tags").await?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| InstalledModel {
                modified_at: parse_timestamp(m.modified_at.as_deref()),
                name: m.name,
                size: m.size,
                digest: m.digest,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_loaded(&self) -> Result<Vec<LoadedModel>, ApplicationError> {
        let ps: PsResponse = self.get_json("ps").await?;
        Ok(ps
            .models
            .into_iter()
            .map(|m| LoadedModel {
                expires_at: parse_timestamp(m.expires_at.as_deref()),
                name: m.name,
                size_vram: m.size_vram,
            })
            .collect())
    }

    #[instrument(skip(self, prompt))]
    async fn probe_chat(&self, model: &str, prompt: &str) -> Result<(), ApplicationError> {
        let url = self.api_url("chat");
        let request = ProbeRequest {
            model,
            messages: [ProbeMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            keep_alive: &self.config.keep_alive,
            options: ProbeOptions { num_predict: 1 },
        };

        self.gated(|| async move {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(transport_error)?;

            if response.status() == StatusCode::NOT_FOUND {
                debug!("Runtime does not know the model");
                return Err(ApplicationError::ModelNotFound(model.to_string()));
            }

            let response = ensure_success(response).await?;
            // Drain the body so the runtime finishes the generation inside the slot
            response.bytes().await.map_err(transport_error)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    async fn pull(&self, model: &str) -> Result<PullStream, ApplicationError> {
        let url = self.api_url("pull");
        let request = PullRequest {
            model,
            stream: true,
        };

        let response = self
            .gated(|| async move {
                let response = self
                    .client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(transport_error)?;
                ensure_success(response).await
            })
            .await?;

        debug!("Pull stream opened");
        let lines = decode_stream::<_, _, PullProgressLine>(response.bytes_stream());
        Ok(Box::pin(lines))
    }
}
