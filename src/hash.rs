//! Block content hashing.
//!
//! Thin wrapper around the `xxhash-rust` crate. Per-block integrity uses
//! XXH32 seeded with the container magic so that hashes from other XXH32
//! users cannot be confused with ours.

use crate::block::header::MAGIC;

pub use xxhash_rust::xxh32::Xxh32 as Xxh32State;

/// One-shot XXH32 of a whole block, seeded with the container magic.
#[inline]
pub fn block_hash(data: &[u8]) -> u32 {
    xxhash_rust::xxh32::xxh32(data, MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_seeded() {
        let data = b"compressible compressible compressible";
        assert_eq!(block_hash(data), block_hash(data));
        // The magic seed must change the digest relative to seed 0.
        assert_ne!(block_hash(data), xxhash_rust::xxh32::xxh32(data, 0));
    }

    #[test]
    fn hash_distinguishes_single_bit_flip() {
        let a = vec![0x55u8; 4096];
        let mut b = a.clone();
        b[1000] ^= 0x01;
        assert_ne!(block_hash(&a), block_hash(&b));
    }
}
