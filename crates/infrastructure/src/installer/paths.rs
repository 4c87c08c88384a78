//! Install locations per platform

use std::path::{Path, PathBuf};

use domain::Platform;

use crate::config::InstallerConfig;

const APP_BUNDLE: &str = "Ollama.app";

/// Directories the installer reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    /// Where the application lands (`/Applications` on macOS)
    pub app_dir: PathBuf,
    /// Where the CLI link or shim goes
    pub bin_dir: PathBuf,
    /// Scratch space for downloaded artifacts
    pub temp_dir: PathBuf,
}

impl InstallPaths {
    /// Configured directories, falling back to the platform defaults
    pub fn for_platform(platform: Platform, config: &InstallerConfig) -> Self {
        let (app_default, bin_default) = default_dirs(platform);
        Self {
            app_dir: config.app_dir.clone().unwrap_or(app_default),
            bin_dir: config.bin_dir.clone().unwrap_or(bin_default),
            temp_dir: config.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
        }
    }

    /// macOS application bundle
    pub fn app_bundle(&self) -> PathBuf {
        self.app_dir.join(APP_BUNDLE)
    }

    /// Executable inside the macOS bundle
    pub fn bundle_executable(&self) -> PathBuf {
        self.app_bundle().join("Contents").join("MacOS").join("Ollama")
    }

    /// CLI shipped inside the macOS bundle
    pub fn bundled_cli(&self) -> PathBuf {
        self.app_bundle().join("Contents").join("Resources").join("ollama")
    }

    /// CLI link (macOS, Linux) or shim (Windows)
    pub fn cli_link(&self, platform: Platform) -> PathBuf {
        match platform {
            Platform::Windows => self.bin_dir.join("ollama.cmd"),
            Platform::MacOs | Platform::Linux => self.bin_dir.join(platform.binary_name()),
        }
    }

    /// Runtime binary installed into the application directory
    pub fn app_binary(&self, platform: Platform) -> PathBuf {
        match platform {
            Platform::MacOs => self.bundled_cli(),
            Platform::Windows | Platform::Linux => self.app_dir.join(platform.binary_name()),
        }
    }

    /// Scratch path for `artifact`
    pub fn artifact(&self, artifact: &str) -> PathBuf {
        self.temp_dir.join(artifact)
    }

    /// Windows uninstaller written by the setup program
    pub fn uninstaller(&self) -> PathBuf {
        self.app_dir.join("unins000.exe")
    }
}

fn default_dirs(platform: Platform) -> (PathBuf, PathBuf) {
    match platform {
        Platform::MacOs => (
            PathBuf::from("/Applications"),
            PathBuf::from("/usr/local/bin"),
        ),
        Platform::Windows => {
            let base = std::env::var_os("LOCALAPPDATA")
                .map_or_else(|| PathBuf::from(r"C:\Users\Default\AppData\Local"), PathBuf::from);
            let dir = base.join("Programs").join("Ollama");
            (dir.clone(), dir)
        },
        Platform::Linux => (
            PathBuf::from("/usr/local/lib/ollama"),
            PathBuf::from("/usr/local/bin"),
        ),
    }
}

/// Whether `path` exists as a file or directory
pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
