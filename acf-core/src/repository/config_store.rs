//! Configuration store: applications and temporary access requests
//!
//! The whole configuration is one JSON document. Each save first writes a
//! timestamped snapshot of the document, then replaces the main file.

use crate::config::StoreConfig;
use crate::domain::{Application, ProvisionReport, TemporaryAccessRequest};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "1.0";

/// Persisted configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub applications: BTreeMap<String, Application>,
    #[serde(default)]
    pub temporary_requests: Vec<TemporaryAccessRequest>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            applications: BTreeMap::new(),
            temporary_requests: Vec::new(),
            version: default_version(),
            updated_at: None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    // Applications
    async fn list_applications(&self) -> Result<Vec<Application>>;
    async fn find_application(&self, name: &str) -> Result<Option<Application>>;
    async fn create_application(&self, application: &Application) -> Result<()>;
    async fn delete_application(&self, name: &str) -> Result<()>;
    async fn record_apply(
        &self,
        name: &str,
        applied_at: DateTime<Utc>,
        report: &ProvisionReport,
    ) -> Result<()>;

    // Temporary access requests
    async fn list_requests(&self) -> Result<Vec<TemporaryAccessRequest>>;
    async fn find_request(&self, id: Uuid) -> Result<Option<TemporaryAccessRequest>>;
    async fn insert_request(&self, request: &TemporaryAccessRequest) -> Result<()>;
    async fn update_request(&self, request: &TemporaryAccessRequest) -> Result<()>;

    /// Full document as currently stored
    async fn export(&self) -> Result<ConfigDocument>;
}

/// File-backed store holding the document in memory between saves
pub struct FileConfigRepository {
    config: StoreConfig,
    document: RwLock<ConfigDocument>,
}

impl FileConfigRepository {
    /// Load the document, starting empty when the file does not exist yet
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let document = load_document(&config.config_path).await?;
        tracing::info!(
            path = %config.config_path.display(),
            applications = document.applications.len(),
            temporary_requests = document.temporary_requests.len(),
            "Loaded configuration"
        );
        Ok(Self {
            config,
            document: RwLock::new(document),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config.config_path
    }

    /// Apply `change` to a copy of the document, persist it, then publish it.
    /// A failed save leaves the in-memory document untouched.
    async fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut ConfigDocument) -> Result<()>,
    {
        let mut current = self.document.write().await;
        let mut next = current.clone();
        change(&mut next)?;
        self.save(&mut next).await?;
        *current = next;
        Ok(())
    }

    async fn save(&self, document: &mut ConfigDocument) -> Result<()> {
        let snapshot = self.snapshot_path(Utc::now());
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize configuration: {}", e)))?;
        tokio::fs::write(&snapshot, &bytes).await.map_err(|e| {
            AppError::Persistence(format!(
                "Failed to write snapshot {}: {}",
                snapshot.display(),
                e
            ))
        })?;

        document.updated_at = Some(Utc::now());
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize configuration: {}", e)))?;
        write_atomic(&self.config.config_path, &bytes).await?;

        tracing::debug!(
            path = %self.config.config_path.display(),
            snapshot = %snapshot.display(),
            "Saved configuration"
        );
        Ok(())
    }

    fn snapshot_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.config.backup_dir.join(format!(
            "{}_{}.json",
            self.config.backup_prefix,
            at.format("%Y%m%d_%H%M%S")
        ))
    }
}

async fn load_document(path: &Path) -> Result<ConfigDocument> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Persistence(format!(
                "Configuration {} is not valid: {}",
                path.display(),
                e
            ))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigDocument::default()),
        Err(e) => Err(AppError::Persistence(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let to_persistence = |e: std::io::Error| {
        AppError::Persistence(format!("Failed to write {}: {}", path.display(), e))
    };
    tokio::fs::write(&tmp, bytes).await.map_err(to_persistence)?;
    tokio::fs::rename(&tmp, path).await.map_err(to_persistence)?;
    Ok(())
}

#[async_trait]
impl ConfigRepository for FileConfigRepository {
    async fn list_applications(&self) -> Result<Vec<Application>> {
        Ok(self
            .document
            .read()
            .await
            .applications
            .values()
            .cloned()
            .collect())
    }

    async fn find_application(&self, name: &str) -> Result<Option<Application>> {
        Ok(self.document.read().await.applications.get(name).cloned())
    }

    async fn create_application(&self, application: &Application) -> Result<()> {
        self.mutate(|doc| {
            if doc.applications.contains_key(&application.name) {
                return Err(AppError::Conflict(format!(
                    "Application {} already exists",
                    application.name
                )));
            }
            doc.applications
                .insert(application.name.clone(), application.clone());
            Ok(())
        })
        .await
    }

    async fn delete_application(&self, name: &str) -> Result<()> {
        self.mutate(|doc| {
            doc.applications
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| AppError::NotFound(format!("Application {} not found", name)))
        })
        .await
    }

    async fn record_apply(
        &self,
        name: &str,
        applied_at: DateTime<Utc>,
        report: &ProvisionReport,
    ) -> Result<()> {
        self.mutate(|doc| {
            let application = doc
                .applications
                .get_mut(name)
                .ok_or_else(|| AppError::NotFound(format!("Application {} not found", name)))?;
            application.last_applied = Some(applied_at);
            application.last_apply_results = Some(report.clone());
            application.updated_at = applied_at;
            Ok(())
        })
        .await
    }

    async fn list_requests(&self) -> Result<Vec<TemporaryAccessRequest>> {
        Ok(self.document.read().await.temporary_requests.clone())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<TemporaryAccessRequest>> {
        Ok(self
            .document
            .read()
            .await
            .temporary_requests
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn insert_request(&self, request: &TemporaryAccessRequest) -> Result<()> {
        self.mutate(|doc| {
            if doc.temporary_requests.iter().any(|r| r.id == request.id) {
                return Err(AppError::Conflict(format!(
                    "Temporary access request {} already exists",
                    request.id
                )));
            }
            doc.temporary_requests.push(request.clone());
            Ok(())
        })
        .await
    }

    async fn update_request(&self, request: &TemporaryAccessRequest) -> Result<()> {
        self.mutate(|doc| {
            let slot = doc
                .temporary_requests
                .iter_mut()
                .find(|r| r.id == request.id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Temporary access request {} not found",
                        request.id
                    ))
                })?;
            *slot = request.clone();
            Ok(())
        })
        .await
    }

    async fn export(&self) -> Result<ConfigDocument> {
        Ok(self.document.read().await.clone())
    }
}
