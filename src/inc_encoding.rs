use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};
use ssz::{Decode, Encode};

use crate::MESSAGE_LENGTH;

/// Trait to model incomparable encoding schemes.
///
/// An incomparable encoding maps `(binding, message, randomness, epoch)` to a
/// vector of `DIMENSION` chunks, each in `[0, BASE)`, such that no two valid
/// codewords are component-wise comparable. The chunks determine how far the
/// signer walks each hash chain. Encoding may fail (e.g. a missed target
/// sum), in which case the signer retries with fresh randomness, up to
/// `MAX_TRIES` attempts.
pub trait IncomparableEncoding {
    /// Value binding the encoding to one keypair (the Merkle root).
    type Binding;
    type Randomness: Copy
        + PartialEq
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Encode
        + Decode
        + Send
        + Sync;
    type Error;

    /// Number of chunks, i.e., number of hash chains.
    const DIMENSION: usize;

    /// How often the signer should re-sample randomness before giving up.
    const MAX_TRIES: usize;

    /// Chunks take values in 0..BASE. Must be at most 2^8.
    const BASE: usize;

    /// Samples a randomness to be used for the encoding.
    fn rand<R: Rng>(rng: &mut R) -> Self::Randomness;

    /// Applies the encoding to a message. Can fail, in which case the caller
    /// should retry with fresh randomness.
    fn encode(
        binding: &Self::Binding,
        message: &[u8; MESSAGE_LENGTH],
        randomness: &Self::Randomness,
        epoch: u32,
    ) -> Result<Vec<u8>, Self::Error>;

    /// Function to check internal consistency of any given parameters.
    /// For testing only, and expected to panic if something is wrong.
    #[cfg(test)]
    fn internal_consistency_check();
}

pub mod basic_winternitz;
pub mod target_sum;
