pub mod backend;
pub mod memory;
pub mod snapshot;

pub use backend::{
    ExecutionOutcome, ResetSummary, SignatureOutcome, StorageBackend, StorageError,
    StorageStats, StoreContents, UpsertOutcome,
};
pub use memory::MemoryBackend;
pub use snapshot::{Snapshot, SnapshotManager, SnapshotMetadata};
