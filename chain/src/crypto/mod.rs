//! # Cryptographic Primitives
//!
//! Thin wrappers around BLAKE3. Block hashes, proof-of-work digests and
//! verification all flow through here.

pub mod hash;

pub use hash::{blake3_hash, blake3_hash_parts, leading_zero_bits};
