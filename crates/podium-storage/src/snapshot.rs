use crate::backend::{Result, StorageBackend, StorageError, StoreContents};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_PREFIX: &str = "podium-snapshot-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub version: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub record_count: usize,
    /// blake3 of the serialized contents, hex encoded
    pub hash: String,
}

/// Point-in-time copy of the whole store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: SnapshotMetadata,
    pub contents: StoreContents,
}

impl Snapshot {
    pub async fn create(backend: &dyn StorageBackend) -> Result<Self> {
        let contents = backend.export().await?;
        let hash = Self::calculate_hash(&contents)?;

        Ok(Self {
            metadata: SnapshotMetadata {
                version: SNAPSHOT_VERSION,
                created_at: chrono::Utc::now(),
                record_count: contents.record_count(),
                hash,
            },
            contents,
        })
    }

    /// Verify integrity and replace the backend's contents
    pub async fn restore(&self, backend: &dyn StorageBackend) -> Result<()> {
        if self.metadata.version != SNAPSHOT_VERSION {
            return Err(StorageError::BackendError(format!(
                "unsupported snapshot version {}",
                self.metadata.version
            )));
        }

        let hash = Self::calculate_hash(&self.contents)?;
        if hash != self.metadata.hash {
            return Err(StorageError::BackendError(
                "snapshot hash mismatch".to_string(),
            ));
        }

        backend.import(self.contents.clone()).await
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Snapshot written");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn calculate_hash(contents: &StoreContents) -> Result<String> {
        let bytes = serde_json::to_vec(contents)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

/// Rotating snapshot files in one directory
pub struct SnapshotManager {
    dir: PathBuf,
    max_snapshots: usize,
}

impl SnapshotManager {
    pub fn new(dir: impl Into<PathBuf>, max_snapshots: usize) -> Self {
        Self {
            dir: dir.into(),
            max_snapshots: max_snapshots.max(1),
        }
    }

    pub async fn save(&self, backend: &dyn StorageBackend) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let snapshot = Snapshot::create(backend).await?;
        let name = format!(
            "{}{}.json",
            SNAPSHOT_PREFIX,
            snapshot.metadata.created_at.format("%Y%m%dT%H%M%S%.6f")
        );
        let path = self.dir.join(name);
        snapshot.save(&path).await?;

        info!(
            path = %path.display(),
            records = snapshot.metadata.record_count,
            "💾 Snapshot saved"
        );

        self.prune().await?;
        Ok(path)
    }

    /// Restore the newest snapshot; `false` when the directory holds none
    pub async fn restore_latest(&self, backend: &dyn StorageBackend) -> Result<bool> {
        let Some(path) = self.list().await?.pop() else {
            return Ok(false);
        };

        let snapshot = Snapshot::load(&path).await?;
        snapshot.restore(backend).await?;
        info!(
            path = %path.display(),
            records = snapshot.metadata.record_count,
            "Snapshot restored"
        );
        Ok(true)
    }

    /// Snapshot files oldest first
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_snapshot = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(SNAPSHOT_PREFIX) && n.ends_with(".json"))
                .unwrap_or(false);
            if is_snapshot {
                paths.push(path);
            }
        }

        // Timestamped names sort chronologically
        paths.sort();
        Ok(paths)
    }

    async fn prune(&self) -> Result<()> {
        let paths = self.list().await?;
        if paths.len() <= self.max_snapshots {
            return Ok(());
        }

        let excess = paths.len() - self.max_snapshots;
        for path in paths.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to prune snapshot");
            }
        }
        Ok(())
    }
}
