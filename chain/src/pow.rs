//! # Proof of Work
//!
//! The chain does not decide what makes a block hash valid. It asks a
//! [`ProofOfWork`] collaborator for a `(hash, nonce)` pair and stores whatever
//! comes back. Difficulty rules, hash construction and verification all live
//! behind this trait.
//!
//! [`HashCash`] is the reference solver: BLAKE3 over
//! `prev_hash || data || timestamp_le || nonce_le`, accepting the first nonce
//! whose digest has at least `difficulty_bits` leading zero bits.
//!
//! Closures with the `solve` signature implement the trait too, which keeps
//! tests free of mining:
//!
//! ```
//! use linkchain::pow::{PowError, ProofOfWork, Solution};
//!
//! let fixed = |_prev: &[u8; 32], _data: &[u8], _ts: i64| -> Result<Solution, PowError> {
//!     Ok(Solution { hash: [1u8; 32], nonce: 0 })
//! };
//! assert_eq!(fixed.solve(&[0u8; 32], b"x", 0).unwrap().nonce, 0);
//! ```

use tracing::debug;

use crate::config::{BlockHash, MAX_DIFFICULTY_BITS};
use crate::crypto::{blake3_hash_parts, leading_zero_bits};
use crate::storage::block::Block;

/// Output of a successful search: the block hash and the nonce that
/// produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Solution {
    pub hash: BlockHash,
    pub nonce: u64,
}

/// Errors raised by proof-of-work solvers.
#[derive(Debug, thiserror::Error)]
pub enum PowError {
    #[error("difficulty of {requested} bits exceeds the maximum of {max}")]
    DifficultyTooHigh { requested: u32, max: u32 },

    #[error("nonce space exhausted without reaching {difficulty_bits} leading zero bits")]
    Exhausted { difficulty_bits: u32 },
}

/// Pluggable hash derivation for new blocks.
pub trait ProofOfWork: Send + Sync {
    /// Find a `(hash, nonce)` for a block with the given predecessor,
    /// payload and timestamp.
    fn solve(&self, prev_hash: &BlockHash, data: &[u8], timestamp: i64) -> Result<Solution, PowError>;

    /// Check a stored block against this solver's rules. Solvers that cannot
    /// re-derive their output accept everything.
    fn verify(&self, _block: &Block) -> bool {
        true
    }
}

impl<F> ProofOfWork for F
where
    F: Fn(&BlockHash, &[u8], i64) -> Result<Solution, PowError> + Send + Sync,
{
    fn solve(&self, prev_hash: &BlockHash, data: &[u8], timestamp: i64) -> Result<Solution, PowError> {
        self(prev_hash, data, timestamp)
    }
}

// ---------------------------------------------------------------------------
// HashCash
// ---------------------------------------------------------------------------

/// Leading-zero-bits proof of work over BLAKE3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashCash {
    difficulty_bits: u32,
}

impl HashCash {
    /// Create a solver. Fails if `difficulty_bits` exceeds
    /// [`MAX_DIFFICULTY_BITS`].
    pub fn new(difficulty_bits: u32) -> Result<Self, PowError> {
        if difficulty_bits > MAX_DIFFICULTY_BITS {
            return Err(PowError::DifficultyTooHigh {
                requested: difficulty_bits,
                max: MAX_DIFFICULTY_BITS,
            });
        }
        Ok(Self { difficulty_bits })
    }

    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    /// The digest a given nonce produces for a block candidate.
    pub fn digest(prev_hash: &BlockHash, data: &[u8], timestamp: i64, nonce: u64) -> BlockHash {
        blake3_hash_parts(&[
            prev_hash.as_slice(),
            data,
            &timestamp.to_le_bytes(),
            &nonce.to_le_bytes(),
        ])
    }

    /// True if `hash` has at least `difficulty_bits` leading zero bits.
    pub fn meets_difficulty(&self, hash: &BlockHash) -> bool {
        leading_zero_bits(hash) >= self.difficulty_bits
    }
}

impl ProofOfWork for HashCash {
    fn solve(&self, prev_hash: &BlockHash, data: &[u8], timestamp: i64) -> Result<Solution, PowError> {
        for nonce in 0..=u64::MAX {
            let hash = Self::digest(prev_hash, data, timestamp, nonce);
            if self.meets_difficulty(&hash) {
                debug!(
                    nonce,
                    difficulty_bits = self.difficulty_bits,
                    hash = %hex::encode(hash),
                    "proof of work solved"
                );
                return Ok(Solution { hash, nonce });
            }
        }
        Err(PowError::Exhausted {
            difficulty_bits: self.difficulty_bits,
        })
    }

    fn verify(&self, block: &Block) -> bool {
        let expected = Self::digest(
            block.prev_block_hash(),
            block.data(),
            block.timestamp(),
            block.nonce(),
        );
        &expected == block.hash() && self.meets_difficulty(&expected)
    }
}
