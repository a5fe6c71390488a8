//! # Hashing Utilities
//!
//! BLAKE3 is the only hash function LinkChain uses. It is fast on every
//! platform that matters and its 32-byte output matches [`HASH_LENGTH`].
//!
//! [`HASH_LENGTH`]: crate::config::HASH_LENGTH

use crate::config::BlockHash;

/// Compute the BLAKE3 hash of the input data.
///
/// ```
/// use linkchain::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"linkchain");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> BlockHash {
    *blake3::hash(data).as_bytes()
}

/// Hash the concatenation of several byte slices without allocating the
/// concatenated preimage.
pub fn blake3_hash_parts(parts: &[&[u8]]) -> BlockHash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Count the leading zero bits of a digest, most significant byte first.
pub fn leading_zero_bits(hash: &[u8]) -> u32 {
    let mut zero_bits = 0u32;
    for byte in hash {
        if *byte == 0 {
            zero_bits += 8;
        } else {
            zero_bits += byte.leading_zeros();
            break;
        }
    }
    zero_bits
}
