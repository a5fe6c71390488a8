// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # LinkChain — Core Library
//!
//! An append-only, hash-linked chain of blocks persisted in sled. Each new
//! block is written together with the tip pointer that references it in one
//! atomic batch, so the stored tip always resolves to a stored block and every
//! stored block resolves back to the origin.
//!
//! ## Architecture
//!
//! - **config** — Constants and [`ChainConfig`](config::ChainConfig).
//! - **crypto** — BLAKE3 helpers.
//! - **pow** — The proof-of-work seam and the reference `HashCash` solver.
//! - **clock** — Timestamp sources.
//! - **storage** — Blocks, encoding, the key-value store, the chain and its
//!   iterator.
//! - **logging** — `tracing` subscriber setup for binaries and tests.
//!
//! ## Quick Start
//!
//! ```
//! use linkchain::{Chain, ChainConfig};
//!
//! let mut chain = Chain::open(ChainConfig::temporary().with_difficulty_bits(4)).unwrap();
//! let hash = chain.append(b"first").unwrap();
//! assert_eq!(chain.tip_hash(), hash);
//!
//! let heights: Vec<u64> = chain.iter().map(|b| b.unwrap().height()).collect();
//! assert_eq!(heights, vec![1, 0]);
//! ```

pub mod clock;
pub mod config;
pub mod crypto;
pub mod logging;
pub mod pow;
pub mod storage;

pub use config::{BlockHash, ChainConfig, SENTINEL_HASH};
pub use storage::{Block, Chain, ChainError, ChainIterator, ChainResult, SharedChain};
