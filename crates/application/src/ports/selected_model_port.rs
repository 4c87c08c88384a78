//! Selected model port
//!
//! Read-only view of which models the user selected and which provider
//! serves them. Consulted only by automatic warm-up.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Provider identifier of the local runtime
pub const LOCAL_RUNTIME_PROVIDER: &str = "ollama";

/// Purpose a model is selected for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Embedding,
}

/// A user's model selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedModel {
    pub kind: ModelKind,
    pub id: String,
}

/// Port for reading model selections
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SelectedModelPort: Send + Sync {
    /// Current selections
    async fn selected_models(&self) -> Result<Vec<SelectedModel>, ApplicationError>;

    /// Provider configured for a model
    async fn provider_for_model(&self, kind: ModelKind, id: &str) -> Option<String>;
}
