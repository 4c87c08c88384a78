//! Download manager configuration.

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Retry, timeout and redirect limits for artifact downloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Attempts per download, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff unit in milliseconds (default: 1000)
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Deadline for a single download attempt (default: 5 minutes)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Redirects followed before giving up (default: 5)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay() -> u64 {
    1_000
}

const fn default_timeout() -> u64 {
    300
}

const fn default_max_redirects() -> usize {
    5
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            timeout_secs: default_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl DownloadConfig {
    /// Retry policy for `fetch_with_retry`
    #[must_use]
    pub const fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, self.base_delay_ms)
    }
}
