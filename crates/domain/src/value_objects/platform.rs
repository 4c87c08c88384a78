//! Supported host platforms
//!
//! The warden installs and terminates the runtime differently on each
//! operating system. Dispatch happens on this closed set instead of on
//! raw OS strings.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::DomainError;

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Apple macOS
    MacOs,
    /// Microsoft Windows
    Windows,
    /// Linux distributions
    Linux,
}

impl Platform {
    /// Detect the platform this process is running on
    pub fn current() -> Result<Self, DomainError> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` style identifier to a platform
    pub fn from_os(os: &str) -> Result<Self, DomainError> {
        match os {
            "macos" => Ok(Self::MacOs),
            "windows" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(DomainError::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Stable identifier used in checksum keys and configuration
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }

    /// File name of the runtime CLI on this platform
    #[must_use]
    pub const fn binary_name(&self) -> &'static str {
        match self {
            Self::Windows => "ollama.exe",
            Self::MacOs | Self::Linux => "ollama",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "darwin" | "mac" => Ok(Self::MacOs),
            "windows" | "win32" | "win" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(DomainError::UnsupportedPlatform(other.to_string())),
        }
    }
}
