use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};
use ssz::{Decode, Encode};

use crate::MESSAGE_LENGTH;

/// Trait to model a hash function used for message hashing.
///
/// This is a variant of a tweakable hash function that we use for
/// message hashing. It is always executed with respect to epochs, i.e.,
/// tweaks are implicitly derived from the epoch, and it additionally binds
/// the produced chunks to the key's Merkle root.
///
/// Note that BASE must be at most 2^8, as we encode chunks as u8.
pub trait MessageHash {
    /// Value binding the hash to one keypair; the scheme passes the Merkle
    /// root here.
    type Binding: Clone + Sized + Serialize + DeserializeOwned;
    type Randomness: Copy
        + PartialEq
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Encode
        + Decode
        + Send
        + Sync;

    /// number of entries in a hash
    const DIMENSION: usize;

    /// each hash entry is between 0 and BASE - 1
    const BASE: usize;

    /// Generates a random randomness value.
    fn rand<R: Rng>(rng: &mut R) -> Self::Randomness;

    /// Applies the message hash to a binding value, an epoch, a randomness,
    /// and a message. It outputs a list of chunks. The list contains
    /// DIMENSION many elements, each between 0 and BASE - 1 (inclusive).
    fn apply(
        binding: &Self::Binding,
        epoch: u32,
        randomness: &Self::Randomness,
        message: &[u8; MESSAGE_LENGTH],
    ) -> Vec<u8>;

    /// Function to check internal consistency of any given parameters
    /// For testing only, and expected to panic if something is wrong.
    #[cfg(test)]
    fn internal_consistency_check();
}

/// Splits bytes into chunks of `chunk_size` bits, least significant bits
/// first within each byte. `chunk_size` must be 1, 2, 4, or 8.
pub fn bytes_to_chunks(bytes: &[u8], chunk_size: usize) -> Vec<u8> {
    assert!(
        [1, 2, 4, 8].contains(&chunk_size),
        "Chunk size must be 1, 2, 4, or 8"
    );

    let chunks_per_byte = 8 / chunk_size;
    let mask = ((1u16 << chunk_size) - 1) as u8;

    let mut chunks = Vec::with_capacity(bytes.len() * chunks_per_byte);
    for &byte in bytes {
        for i in 0..chunks_per_byte {
            chunks.push((byte >> (i * chunk_size)) & mask);
        }
    }
    chunks
}

pub mod poseidon;
