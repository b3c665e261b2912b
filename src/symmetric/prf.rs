use rand::Rng;

use crate::MESSAGE_LENGTH;

/// Trait to model a pseudorandom function used for key generation.
///
/// All deterministic per-epoch secrets of the scheme are derived from one
/// PRF key: the chain heads (one per epoch and chain index) and the
/// per-signature encoding randomness (a function of epoch, message, and a
/// retry counter so that target-sum sampling stays deterministic).
pub trait Pseudorandom {
    type Key: Clone + Send + Sync;
    /// Output type for chain heads.
    type Domain;
    /// Output type for encoding randomness.
    type Randomness;

    /// Length of a serialized key in bytes.
    const KEY_LENGTH: usize;

    /// Generates a uniformly random key.
    fn key_gen<R: Rng>(rng: &mut R) -> Self::Key;

    /// Derives the head of the hash chain for a given epoch and chain index.
    /// This is a pure function of its inputs.
    fn get_chain_head(key: &Self::Key, epoch: u32, chain_index: u64) -> Self::Domain;

    /// Derives per-signature encoding randomness from the epoch, the message,
    /// and a retry counter.
    fn get_randomness(
        key: &Self::Key,
        epoch: u32,
        message: &[u8; MESSAGE_LENGTH],
        counter: u64,
    ) -> Self::Randomness;

    /// Serializes a key into exactly [`Self::KEY_LENGTH`] bytes.
    fn key_to_bytes(key: &Self::Key) -> Vec<u8>;

    /// Parses a key from exactly [`Self::KEY_LENGTH`] bytes.
    fn key_from_bytes(bytes: &[u8]) -> Option<Self::Key>;

    /// Function to check internal consistency of any given parameters.
    /// For testing only, and expected to panic if something is wrong.
    #[cfg(test)]
    fn internal_consistency_check();
}

pub mod shake_to_field;
