use rand::Rng;
use rayon::prelude::*;
use serde::{Serialize, de::DeserializeOwned};
use ssz::{Decode, Encode};

use crate::symmetric::prf::Pseudorandom;

/// Trait to model a tweakable hash function. Such a function takes a tweak
/// and a message and returns a hash value. The tweak provides domain
/// separation between the three uses of the same permutation: steps within
/// hash chains, merging siblings in the Merkle tree, and compressing the
/// chain ends into a leaf.
pub trait TweakableHash: Send + Sync {
    type Tweak;
    type Domain: Copy
        + PartialEq
        + Eq
        + std::fmt::Debug
        + Serialize
        + DeserializeOwned
        + Encode
        + Decode
        + Send
        + Sync;

    /// Returns a tweak to be used in the Merkle tree.
    fn tree_tweak(level: u8, pos_in_level: u32) -> Self::Tweak;

    /// Returns a tweak to be used in chains.
    fn chain_tweak(epoch: u32, chain_index: u8, pos_in_chain: u8) -> Self::Tweak;

    /// Applies the tweakable hash to a tweak and a message.
    fn apply(tweak: &Self::Tweak, message: &[Self::Domain]) -> Self::Domain;

    /// Deterministic stand-in node for tree positions outside the
    /// materialised range. Trees padded with these nodes have a root that is
    /// a pure function of the leaves, independent of any RNG or of how the
    /// computation was parallelised.
    fn placeholder(level: u8, pos_in_level: u32) -> Self::Domain;

    /// Generates a random domain element, for tests and benchmarks.
    fn rand_domain<R: Rng>(rng: &mut R) -> Self::Domain;

    /// Computes one layer of a Merkle tree: hashes `children` in sibling
    /// pairs into their parents. `children` must have even length and
    /// `parent_start` is the tree index of the first parent produced.
    fn compute_tree_layer(
        level: u8,
        parent_start: usize,
        children: &[Self::Domain],
    ) -> Vec<Self::Domain> {
        children
            .par_chunks_exact(2)
            .enumerate()
            .map(|(i, pair)| {
                let pos = parent_start + i;
                Self::apply(&Self::tree_tweak(level, pos as u32), pair)
            })
            .collect()
    }

    /// Computes the Merkle leaves for a batch of epochs: for each epoch,
    /// derive all chain heads from the PRF, walk every chain to its end,
    /// and compress the chain ends under the epoch's leaf tweak.
    ///
    /// Epochs are independent, so they are fanned out over the worker pool;
    /// the result is identical to sequential computation.
    fn compute_tree_leaves<PRF>(
        prf_key: &PRF::Key,
        epochs: &[u32],
        num_chains: usize,
        chain_length: usize,
    ) -> Vec<Self::Domain>
    where
        PRF: Pseudorandom,
        PRF::Key: Sync,
        PRF::Domain: Into<Self::Domain>,
    {
        epochs
            .par_iter()
            .map(|&epoch| {
                let chain_ends: Vec<Self::Domain> = (0..num_chains)
                    .map(|chain_index| {
                        let start = PRF::get_chain_head(prf_key, epoch, chain_index as u64).into();
                        chain::<Self>(epoch, chain_index as u8, 0, chain_length - 1, &start)
                    })
                    .collect();
                Self::apply(&Self::tree_tweak(0, epoch), &chain_ends)
            })
            .collect()
    }

    /// Function to check internal consistency of any given parameters.
    /// For testing only, and expected to panic if something is wrong.
    #[cfg(test)]
    fn internal_consistency_check();
}

/// Walks a hash chain, starting at `start`, for `steps` many steps.
///
/// `start` is assumed to sit at position `start_pos_in_chain` of the chain
/// identified by `(epoch, chain_index)`; each step hashes under the tweak of
/// the position being produced. The caller must ensure
/// `start_pos_in_chain + steps <= chain_length - 1`. A single value buffer is
/// reused across all steps.
pub fn chain<TH: TweakableHash + ?Sized>(
    epoch: u32,
    chain_index: u8,
    start_pos_in_chain: u8,
    steps: usize,
    start: &TH::Domain,
) -> TH::Domain {
    let mut current = *start;
    for j in 0..steps {
        let pos = start_pos_in_chain as usize + j + 1;
        debug_assert!(pos < 1 << 8, "chain position must fit into u8");
        let tweak = TH::chain_tweak(epoch, chain_index, pos as u8);
        current = TH::apply(&tweak, std::slice::from_ref(&current));
    }
    current
}

pub mod poseidon;
