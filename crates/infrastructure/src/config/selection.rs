//! Model selection and model-status persistence configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ==============================
// Selection Configuration
// ==============================

/// Models the user picked and the providers serving them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub chat_model: Option<String>,

    #[serde(default = "default_provider")]
    pub chat_provider: String,

    #[serde(default)]
    pub embedding_model: Option<String>,

    #[serde(default = "default_provider")]
    pub embedding_provider: String,
}

fn default_provider() -> String {
    application::LOCAL_RUNTIME_PROVIDER.to_string()
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            chat_model: None,
            chat_provider: default_provider(),
            embedding_model: None,
            embedding_provider: default_provider(),
        }
    }
}

// ==============================
// Repository Configuration
// ==============================

/// Location of the persisted model-status file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,
}

fn default_repository_path() -> PathBuf {
    PathBuf::from("warden-models.json")
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            path: default_repository_path(),
        }
    }
}
