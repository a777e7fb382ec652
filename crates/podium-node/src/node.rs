use crate::config::NodeConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use podium_certification::CertificationServices;
use podium_storage::{MemoryBackend, SnapshotManager, StorageBackend, StorageStats};
use podium_types::EntityKind;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub storage: StorageStats,
}

/// One page of a raw table listing
#[derive(Debug, Clone, Serialize)]
pub struct TablePage {
    pub table: &'static str,
    pub total: usize,
    pub offset: usize,
    pub rows: Vec<serde_json::Value>,
}

/// The assembled service graph: one storage backend shared by every service
#[derive(Clone)]
pub struct PodiumNode {
    pub config: NodeConfig,
    pub storage: Arc<dyn StorageBackend>,
    pub services: CertificationServices,
    snapshots: Option<Arc<SnapshotManager>>,
    started_at: DateTime<Utc>,
}

impl PodiumNode {
    pub async fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());

        let snapshots = if config.storage.snapshots_enabled {
            let manager = SnapshotManager::new(config.snapshot_dir(), config.storage.max_snapshots);
            let restored = manager
                .restore_latest(storage.as_ref())
                .await
                .context("Failed to restore latest snapshot")?;
            if restored {
                info!(dir = ?config.snapshot_dir(), "Restored state from snapshot");
            }
            Some(Arc::new(manager))
        } else {
            None
        };

        let services = CertificationServices::new(storage.clone(), config.workflow_config());
        info!(
            name = %config.node.name,
            backend = %config.storage.backend,
            snapshots = snapshots.is_some(),
            "Podium node assembled"
        );

        Ok(Self {
            config,
            storage,
            services,
            snapshots,
            started_at: Utc::now(),
        })
    }

    pub async fn stats(&self) -> Result<NodeStats> {
        Ok(NodeStats {
            name: self.config.node.name.clone(),
            started_at: self.started_at,
            storage: self.storage.get_stats().await?,
        })
    }

    pub async fn browse(&self, kind: EntityKind, offset: usize, limit: usize) -> Result<TablePage> {
        Ok(TablePage {
            table: kind.table_name(),
            total: self.storage.count(kind).await?,
            offset,
            rows: self.storage.browse(kind, offset, limit).await?,
        })
    }

    /// Write a snapshot now; `None` when snapshots are disabled
    pub async fn snapshot(&self) -> Result<Option<PathBuf>> {
        match &self.snapshots {
            Some(manager) => Ok(Some(manager.save(self.storage.as_ref()).await?)),
            None => Ok(None),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        if self.config.workflow.snapshot_on_shutdown {
            match self.snapshot().await {
                Ok(Some(path)) => info!(path = ?path, "Shutdown snapshot written"),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Shutdown snapshot failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
