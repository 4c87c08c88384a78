//! Model install flags persisted in a JSON file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use application::ApplicationError;
use application::ports::ModelRepositoryPort;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::canonical_model_name;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Persisted flags of one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub installed: bool,
    pub installing: bool,
    pub updated_at: DateTime<Utc>,
}

/// [`ModelRepositoryPort`] writing `{name -> record}` to a JSON file
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug)]
pub struct JsonFileModelRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileModelRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records; a missing file is an empty repository
    pub async fn load(&self) -> Result<BTreeMap<String, ModelRecord>, ApplicationError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                ApplicationError::Internal(format!(
                    "corrupt model repository {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(io_error(&self.path, &e)),
        }
    }

    pub async fn get(&self, name: &str) -> Result<Option<ModelRecord>, ApplicationError> {
        Ok(self.load().await?.remove(&canonical_model_name(name)))
    }

    async fn store(&self, records: &BTreeMap<String, ModelRecord>) -> Result<(), ApplicationError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }

        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| ApplicationError::Internal(e.to_string()))?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, json)
            .await
            .map_err(|e| io_error(&staging, &e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> ApplicationError {
    ApplicationError::Internal(format!("{}: {e}", path.display()))
}

#[async_trait]
impl ModelRepositoryPort for JsonFileModelRepository {
    #[instrument(skip(self))]
    async fn update_install_status(
        &self,
        name: &str,
        installed: bool,
        installing: bool,
    ) -> Result<(), ApplicationError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load().await?;
        let key = canonical_model_name(name);
        let unchanged = records
            .get(&key)
            .is_some_and(|r| r.installed == installed && r.installing == installing);
        if unchanged {
            return Ok(());
        }

        records.insert(
            key,
            ModelRecord {
                installed,
                installing,
                updated_at: Utc::now(),
            },
        );
        self.store(&records).await?;
        debug!("Model status persisted");
        Ok(())
    }
}
