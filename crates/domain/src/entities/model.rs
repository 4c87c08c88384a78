//! Models known to the local runtime

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A model installed in the runtime's local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModel {
    /// Model name including tag (e.g. `llama3:latest`)
    pub name: String,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: u64,
    /// Content digest reported by the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Last modification time reported by the runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl InstalledModel {
    /// Create an installed model entry with only a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            digest: None,
            modified_at: None,
        }
    }
}

/// A model currently resident in the runtime's memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedModel {
    /// Model name including tag
    pub name: String,
    /// Bytes of accelerator memory in use
    #[serde(default)]
    pub size_vram: u64,
    /// When the runtime will unload the model if idle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl LoadedModel {
    /// Create a loaded model entry with only a name
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size_vram: 0,
            expires_at: None,
        }
    }
}

/// Readiness of a model from the caller's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// A warm-up probe is in flight
    Warming,
    /// The runtime reports the model as resident in memory
    Loaded,
    /// A warm-up probe succeeded earlier
    Ready,
    /// Nothing known; the first request will pay the load cost
    Cold,
}

impl ModelStatus {
    /// Resolve the status with precedence warming > loaded > ready > cold
    #[must_use]
    pub const fn resolve(warming: bool, loaded: bool, warmed: bool) -> Self {
        if warming {
            Self::Warming
        } else if loaded {
            Self::Loaded
        } else if warmed {
            Self::Ready
        } else {
            Self::Cold
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warming => write!(f, "warming"),
            Self::Loaded => write!(f, "loaded"),
            Self::Ready => write!(f, "ready"),
            Self::Cold => write!(f, "cold"),
        }
    }
}

/// Unified view of a model merged from the catalog, warm-up state and
/// in-progress pulls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelView {
    pub name: String,
    pub installed: bool,
    pub installing: bool,
    /// Pull progress, 0-100
    pub progress: u8,
    pub warmed_up: bool,
    pub is_loaded: bool,
    pub status: ModelStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_precedence() {
        assert_eq!(ModelStatus::resolve(true, true, true), ModelStatus::Warming);
        assert_eq!(ModelStatus::resolve(false, true, true), ModelStatus::Loaded);
        assert_eq!(ModelStatus::resolve(false, false, true), ModelStatus::Ready);
        assert_eq!(ModelStatus::resolve(false, false, false), ModelStatus::Cold);
    }

    #[test]
    fn status_display() {
        assert_eq!(ModelStatus::Warming.to_string(), "warming");
        assert_eq!(ModelStatus::Cold.to_string(), "cold");
    }

    #[test]
    fn installed_model_deserializes_without_optional_fields() {
        let model: InstalledModel = serde_json::from_str(r#"{"name":"llama3:latest"}"#).unwrap();
        assert_eq!(model.name, "llama3:latest");
        assert_eq!(model.size, 0);
        assert!(model.digest.is_none());
    }

    #[test]
    fn model_view_serializes_camel_case() {
        let view = ModelView {
            name: "phi3:latest".to_string(),
            installed: true,
            installing: false,
            progress: 100,
            warmed_up: true,
            is_loaded: false,
            status: ModelStatus::Ready,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("warmedUp"));
        assert!(json.contains("isLoaded"));
        assert!(json.contains("\"status\":\"ready\""));
    }
}
