//! Installer configuration.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where installer artifacts come from and where they go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Versioned release path the platform artifacts are fetched from
    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,

    /// `sha256sum`-style manifest published next to the artifacts, consulted
    /// for artifacts without a pinned digest; empty disables it
    #[serde(default = "default_checksum_manifest")]
    pub checksum_manifest: String,

    /// Application directory; platform default when unset
    #[serde(default)]
    pub app_dir: Option<PathBuf>,

    /// Directory receiving the CLI link; platform default when unset
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,

    /// Scratch directory for downloaded artifacts; system temp when unset
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Pinned SHA-256 digests of the installer artifact, keyed by platform
    /// (`macos`, `windows`); these win over the release manifest
    #[serde(default)]
    pub checksums: HashMap<String, String>,
}

fn default_download_base_url() -> String {
    "https://github.com/ollama/ollama/releases/download/v0.6.0".to_string()
}

fn default_checksum_manifest() -> String {
    "sha256sum.txt".to_string()
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            download_base_url: default_download_base_url(),
            checksum_manifest: default_checksum_manifest(),
            app_dir: None,
            bin_dir: None,
            temp_dir: None,
            checksums: HashMap::new(),
        }
    }
}
