//! # Key-Value Store
//!
//! The persistence layer under the chain. It knows nothing about blocks: it
//! reads byte values by byte key and commits groups of writes atomically.
//!
//! ## Table Layout
//!
//! Everything lives in a single named sled tree:
//!
//! | Key                      | Value                   |
//! |--------------------------|-------------------------|
//! | block `hash` (32 bytes)  | `codec::encode(block)`  |
//! | reserved tip key         | tip `hash` (32 bytes)   |
//!
//! ## Atomicity
//!
//! A new block and the tip pointer that references it are written in one
//! [`WriteBatch`]. sled applies a batch to a single tree atomically, and the
//! batch is flushed before `write_atomic` returns, so a reader sees either
//! both entries or neither.
//!
//! Two backends implement [`KvStore`]:
//!
//! - [`SledStore`]: the embedded on-disk engine.
//! - [`MemoryStore`]: a `BTreeMap` behind a lock, for fast tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sled::{Batch, Db, Tree};
use tracing::debug;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open store at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    #[error("read failed: {0}")]
    Read(#[source] sled::Error),

    #[error("write failed: {0}")]
    Write(#[source] sled::Error),

    /// The batch was applied and is visible to readers, but could not be
    /// made durable.
    #[error("flush failed after apply: {0}")]
    Flush(#[source] sled::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// A group of puts that commit together or not at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put. Later puts to the same key win.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// Byte-oriented transactional store.
///
/// Implementations must make every batch passed to `write_atomic` visible to
/// subsequent reads all at once, or not at all.
pub trait KvStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Commit every entry of `batch`, or none of them.
    ///
    /// `Write` means nothing became visible. `Flush` means everything became
    /// visible but may not survive a crash.
    fn write_atomic(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Force buffered writes to durable storage.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SledStore
// ---------------------------------------------------------------------------

/// sled-backed store holding one named tree.
///
/// sled trees are internally reference counted, so cloning a `SledStore` is
/// cheap and every clone sees the same data.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    table: Tree,
}

impl SledStore {
    /// Open or create a database directory at `path` and the tree `table`
    /// inside it.
    pub fn open<P: AsRef<Path>>(path: P, table: &str) -> StoreResult<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_db(db, table, path)
    }

    /// Open a database that lives until the store is dropped and is then
    /// deleted.
    pub fn open_temporary(table: &str) -> StoreResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|source| StoreError::Open {
                path: PathBuf::from("<temporary>"),
                source,
            })?;
        Self::from_db(db, table, Path::new("<temporary>"))
    }

    fn from_db(db: Db, table: &str, path: &Path) -> StoreResult<Self> {
        let table = db.open_tree(table).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { db, table })
    }

    /// True if something already exists at `path`. Used to tell "opening an
    /// existing chain" from "creating a new one" in the logs.
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists()
    }

    /// Delete a key. The chain never calls this; it exists for repair
    /// tooling and fault injection.
    pub fn remove(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let previous = self.table.remove(key).map_err(StoreError::Write)?;
        self.db.flush().map_err(StoreError::Write)?;
        Ok(previous.map(|v| v.to_vec()))
    }

    /// Number of entries in the table, tip pointer included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let value = self.table.get(key).map_err(StoreError::Read)?;
        Ok(value.map(|v| v.to_vec()))
    }

    fn write_atomic(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len();
        let mut sled_batch = Batch::default();
        for (key, value) in batch.entries {
            sled_batch.insert(key, value);
        }
        self.table
            .apply_batch(sled_batch)
            .map_err(StoreError::Write)?;
        self.db.flush().map_err(StoreError::Flush)?;
        debug!(entries = count, "batch committed");
        Ok(())
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush().map_err(StoreError::Flush)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store. A batch is applied under a single write lock, which is
/// what makes it atomic for concurrent readers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a key. See [`SledStore::remove`].
    pub fn remove(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn write_atomic(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.write();
        for (key, value) in batch.entries {
            entries.insert(key, value);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
