//! # Block Encoding
//!
//! On-disk representation of a [`Block`]: bincode with fixed-width integers,
//! little endian, and trailing bytes rejected. Fields are written in
//! declaration order, so the layout is
//!
//! ```text
//! height (8) | timestamp (8) | prev_block_hash (32) | hash (32)
//!   | data length (8) | data (n) | nonce (8)
//! ```
//!
//! for a total of `96 + data.len()` bytes. The encoding is deterministic: the
//! same block always produces the same bytes.

use bincode::Options;

use super::block::Block;

/// Bytes taken by everything except the payload.
pub const ENCODED_OVERHEAD: usize = 96;

/// A stored value could not be turned back into a block (or, in theory, a
/// block could not be encoded).
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct CodecError(#[from] bincode::Error);

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Encode a block for storage.
pub fn encode(block: &Block) -> Result<Vec<u8>, CodecError> {
    Ok(options().serialize(block)?)
}

/// Decode a stored block.
pub fn decode(bytes: &[u8]) -> Result<Block, CodecError> {
    Ok(options().deserialize(bytes)?)
}
