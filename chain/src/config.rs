//! # Chain Configuration & Constants
//!
//! Every magic number in LinkChain lives here. The on-disk layout (table
//! name, reserved tip key) is part of the data format: changing these after
//! a database has been written means the chain will bootstrap as empty and
//! mint a second genesis block next to the old one.
//!
//! Runtime parameters are grouped in [`ChainConfig`], which is passed
//! explicitly to [`Chain::open`](crate::storage::Chain::open) and
//! [`Chain::bootstrap`](crate::storage::Chain::bootstrap) so that tests can
//! point the chain at temporary stores.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Length in bytes of every block hash. BLAKE3 digests are 32 bytes.
pub const HASH_LENGTH: usize = 32;

/// A block hash.
pub type BlockHash = [u8; HASH_LENGTH];

/// Predecessor hash of the origin block. Anything equal to this, byte for
/// byte, means "no predecessor".
pub const SENTINEL_HASH: BlockHash = [0u8; HASH_LENGTH];

// ---------------------------------------------------------------------------
// Storage Layout
// ---------------------------------------------------------------------------

/// Default sled database directory, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "linkchain.db";

/// Default name of the sled tree holding blocks and the tip pointer.
pub const DEFAULT_TABLE_NAME: &str = "blocks";

/// Reserved key under which the current tip hash is recorded. It shares the
/// keyspace with 32-byte block hashes, so it must never be 32 bytes long.
pub const DEFAULT_TIP_KEY: &[u8] = b"newest_block_hash";

/// Payload of the origin block.
pub const GENESIS_DATA: &[u8] = b"Genesis Block...";

// ---------------------------------------------------------------------------
// Proof of Work
// ---------------------------------------------------------------------------

/// Leading zero bits required by the reference [`HashCash`](crate::pow::HashCash)
/// solver. 16 bits is ~65k attempts per block: noticeable, not painful.
pub const DEFAULT_DIFFICULTY_BITS: u32 = 16;

/// Upper bound on the reference solver's difficulty. Beyond 32 bits a single
/// block takes billions of hashes, which is never what a local chain wants.
pub const MAX_DIFFICULTY_BITS: u32 = 32;

// ---------------------------------------------------------------------------
// ChainConfig
// ---------------------------------------------------------------------------

/// Runtime configuration for opening and bootstrapping a chain.
///
/// Every field has a default, so a partial JSON/TOML document deserializes
/// cleanly:
///
/// ```
/// use linkchain::config::ChainConfig;
///
/// let config = ChainConfig::new("/tmp/my-chain").with_difficulty_bits(8);
/// assert_eq!(config.difficulty_bits, 8);
/// assert_eq!(config.table_name, "blocks");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Directory of the sled database. Ignored when `temporary` is set.
    pub path: PathBuf,
    /// Name of the sled tree that holds blocks and the tip pointer.
    pub table_name: String,
    /// Reserved key recording the tip hash. Must be non-empty and not
    /// [`HASH_LENGTH`] bytes long; `Chain::bootstrap` rejects anything else.
    pub tip_key: Vec<u8>,
    /// Payload stored in the origin block when a new chain is created.
    pub genesis_data: Vec<u8>,
    /// Leading zero bits required by the default proof-of-work solver.
    pub difficulty_bits: u32,
    /// Open a throwaway database that is deleted when the chain is dropped.
    pub temporary: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            tip_key: DEFAULT_TIP_KEY.to_vec(),
            genesis_data: GENESIS_DATA.to_vec(),
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            temporary: false,
        }
    }
}

impl ChainConfig {
    /// Default configuration rooted at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Configuration for a temporary database. Nothing survives the drop.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn with_tip_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.tip_key = key.into();
        self
    }

    pub fn with_genesis_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.genesis_data = data.into();
        self
    }

    pub fn with_difficulty_bits(mut self, bits: u32) -> Self {
        self.difficulty_bits = bits;
        self
    }
}
