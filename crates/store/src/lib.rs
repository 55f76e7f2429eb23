//! Key-value storage for project records.
//!
//! Records live in one of two partitions: `autosave`, which only ever holds
//! the latest automatic checkpoint, and `projects`, which holds one record
//! per named project. Every operation is async and may fail with
//! [`StoreError`]; callers decide whether a failure is fatal.

mod fs;
mod memory;

use async_trait::async_trait;

pub use fs::FileStore;
pub use memory::MemoryStore;

/// Name of the database.
pub const DB_NAME: &str = "webdaw";

/// Layout version of the database. Bumped when partitions or key encoding change.
pub const DB_VERSION: u32 = 1;

/// Key of the single record in the autosave partition.
pub const AUTOSAVE_KEY: &str = "current";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    /// Single slot, overwritten by every write
    Autosave,
    /// Named projects, keyed by project name
    Projects,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Autosave, Partition::Projects];

    pub fn name(self) -> &'static str {
        match self {
            Partition::Autosave => "autosave",
            Partition::Projects => "projects",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("database version {found} does not match expected version {expected}")]
    Version { found: u32, expected: u32 },
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::unavailable(err.to_string())
    }
}

/// Async key-value storage partitioned into autosave and named projects.
#[async_trait]
pub trait Store: Send + Sync {
    /// Write a record. In [`Partition::Autosave`] this replaces whatever was there.
    async fn write(&self, partition: Partition, key: &str, bytes: Vec<u8>)
    -> Result<(), StoreError>;

    /// Read a record; `None` when the key does not exist.
    async fn read(&self, partition: Partition, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Keys in a partition, sorted.
    async fn list(&self, partition: Partition) -> Result<Vec<String>, StoreError>;

    /// Remove a record. Removing a missing key is not an error.
    async fn delete(&self, partition: Partition, key: &str) -> Result<(), StoreError>;
}
