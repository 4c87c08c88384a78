//! Runtime connection and process-control configuration.

use serde::{Deserialize, Serialize};

// ==============================
// Runtime API Configuration
// ==============================

/// Settings for talking to and supervising the local runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Base URL of the runtime's HTTP API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Deadline for one gated API call, queue wait included (default: 30s)
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,

    /// Deadline for the liveness ping (default: 5s)
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_ms: u64,

    /// Reconciliation interval in seconds (default: 30)
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// How long `start` waits for the runtime to answer (default: 30s)
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,

    /// `keep_alive` sent with warm-up probes, e.g. `5m` or `-1`
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,

    /// Explicit path to the runtime binary; located automatically when unset
    #[serde(default)]
    pub binary_path: Option<std::path::PathBuf>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

const fn default_api_timeout() -> u64 {
    30_000
}

const fn default_liveness_timeout() -> u64 {
    5_000
}

const fn default_sync_interval() -> u64 {
    30
}

const fn default_start_timeout() -> u64 {
    30
}

fn default_keep_alive() -> String {
    "5m".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_timeout_ms: default_api_timeout(),
            liveness_timeout_ms: default_liveness_timeout(),
            sync_interval_secs: default_sync_interval(),
            start_timeout_secs: default_start_timeout(),
            keep_alive: default_keep_alive(),
            binary_path: None,
        }
    }
}

// ==============================
// Shutdown Configuration
// ==============================

/// Waits used by the shutdown manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Wait after asking the runtime to quit (default: 2000ms)
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,

    /// Wait after killing by name (default: 1000ms)
    #[serde(default = "default_kill_wait")]
    pub kill_wait_ms: u64,
}

const fn default_grace_period() -> u64 {
    2_000
}

const fn default_kill_wait() -> u64 {
    1_000
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period(),
            kill_wait_ms: default_kill_wait(),
        }
    }
}
