//! # Storage Module
//!
//! Everything that touches persisted blocks.
//!
//! ## Architecture
//!
//! ```text
//! block.rs  — Block value, genesis construction, display
//! codec.rs  — Deterministic bincode encoding of a Block
//! db.rs     — KvStore trait, sled and in-memory backends, atomic batches
//! chain.rs  — Chain: bootstrap, append, lookup, verify; SharedChain
//! iter.rs   — Reverse walk from tip to origin
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! append(data) → ProofOfWork → Block → codec → WriteBatch → KvStore
//!                                                 (block + tip, atomic)
//! ```
//!
//! The chain enforces ordering and hash-link integrity; the store only
//! guarantees that a batch lands whole or not at all.

pub mod block;
pub mod chain;
pub mod codec;
pub mod db;
pub mod iter;

pub use block::Block;
pub use chain::{Chain, ChainError, ChainResult, SharedChain};
pub use codec::{decode, encode, CodecError};
pub use db::{KvStore, MemoryStore, SledStore, StoreError, StoreResult, WriteBatch};
pub use iter::ChainIterator;
