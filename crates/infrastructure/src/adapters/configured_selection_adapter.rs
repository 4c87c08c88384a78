//! Model selection read from configuration

use application::ApplicationError;
use application::ports::{ModelKind, SelectedModel, SelectedModelPort};
use async_trait::async_trait;

use crate::config::SelectionConfig;

/// [`SelectedModelPort`] answering from [`SelectionConfig`]
#[derive(Debug, Clone)]
pub struct ConfiguredModelSelection {
    config: SelectionConfig,
}

impl ConfiguredModelSelection {
    pub const fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    fn entry(&self, kind: ModelKind) -> (Option<&str>, &str) {
        match kind {
            ModelKind::Chat => (
                self.config.chat_model.as_deref(),
                &self.config.chat_provider,
            ),
            ModelKind::Embedding => (
                self.config.embedding_model.as_deref(),
                &self.config.embedding_provider,
            ),
        }
    }
}

#[async_trait]
impl SelectedModelPort for ConfiguredModelSelection {
    async fn selected_models(&self) -> Result<Vec<SelectedModel>, ApplicationError> {
        Ok([ModelKind::Chat, ModelKind::Embedding]
            .into_iter()
            .filter_map(|kind| {
                self.entry(kind).0.map(|id| SelectedModel {
                    kind,
                    id: id.to_string(),
                })
            })
            .collect())
    }

    async fn provider_for_model(&self, kind: ModelKind, id: &str) -> Option<String> {
        match self.entry(kind) {
            (Some(model), provider) if model == id => Some(provider.to_string()),
            _ => None,
        }
    }
}
