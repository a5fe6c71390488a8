//! # Block Structure
//!
//! A block is one immutable entry of the chain: an opaque payload plus the
//! linkage that ties it to its predecessor.
//!
//! ## Block Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  height: u64            (0 for the origin)  │
//! │  timestamp: i64         (Unix seconds)      │
//! │  prev_block_hash: [u8; 32]                  │
//! │  hash: [u8; 32]         (from proof of work)│
//! │  data: Vec<u8>          (opaque payload)    │
//! │  nonce: u64             (from proof of work)│
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Who computes the hash?
//!
//! Not the block. `hash` and `nonce` arrive together as a [`Solution`] from
//! the proof-of-work collaborator; the block stores them verbatim and never
//! recomputes them. Re-verification is opt-in through
//! [`ProofOfWork::verify`](crate::pow::ProofOfWork::verify).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{BlockHash, SENTINEL_HASH};
use crate::pow::Solution;

/// One chain entry. Fields are private so that a block, once built, stays
/// exactly as it was built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    height: u64,
    timestamp: i64,
    prev_block_hash: BlockHash,
    hash: BlockHash,
    data: Vec<u8>,
    nonce: u64,
}

impl Block {
    /// Construct the origin block: height 0, sentinel predecessor.
    pub fn genesis(data: impl Into<Vec<u8>>, timestamp: i64, solution: Solution) -> Self {
        Self::from_parts(0, timestamp, SENTINEL_HASH, data, solution)
    }

    /// Construct a block that extends `parent`.
    ///
    /// Height and predecessor hash are taken from the parent; `solution`
    /// must have been solved against `parent.hash()`, `data` and `timestamp`.
    pub fn new(parent: &Block, data: impl Into<Vec<u8>>, timestamp: i64, solution: Solution) -> Self {
        Self::from_parts(parent.height + 1, timestamp, parent.hash, data, solution)
    }

    /// Assemble a block from raw fields. No linkage checks are performed.
    pub fn from_parts(
        height: u64,
        timestamp: i64,
        prev_block_hash: BlockHash,
        data: impl Into<Vec<u8>>,
        solution: Solution,
    ) -> Self {
        Self {
            height,
            timestamp,
            prev_block_hash,
            hash: solution.hash,
            data: data.into(),
            nonce: solution.nonce,
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn prev_block_hash(&self) -> &BlockHash {
        &self.prev_block_hash
    }

    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// True for the origin block. Byte equality against the sentinel, nothing
    /// cleverer.
    pub fn is_genesis(&self) -> bool {
        self.prev_block_hash == SENTINEL_HASH
    }

    /// True if `self` is the direct successor of `parent`: it points at the
    /// parent's hash and sits exactly one height above it.
    pub fn extends(&self, parent: &Block) -> bool {
        self.prev_block_hash == parent.hash && parent.height.checked_add(1) == Some(self.height)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn prev_hash_hex(&self) -> String {
        hex::encode(self.prev_block_hash)
    }

    /// Timestamp rendered as `YYYY-MM-DD HH:MM:SS` (UTC). Falls back to the
    /// raw seconds if the value is outside chrono's range.
    pub fn time_string(&self) -> String {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#####")?;
        writeln!(f, "Height:   {}", self.height)?;
        writeln!(f, "PrevHash: {}", self.prev_hash_hex())?;
        writeln!(f, "Hash:     {}", self.hash_hex())?;
        writeln!(f, "Data:     {}", String::from_utf8_lossy(&self.data))?;
        writeln!(f, "Time:     {}", self.time_string())?;
        writeln!(f, "Nonce:    {}", self.nonce)?;
        write!(f, "#####")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
