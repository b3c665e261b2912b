use p3_field::{PrimeCharacteristicRing, PrimeField64};
use p3_symmetric::CryptographicPermutation;

use crate::TWEAK_SEPARATOR_FOR_CHAIN_HASH;
use crate::TWEAK_SEPARATOR_FOR_MESSAGE_HASH;
use crate::TWEAK_SEPARATOR_FOR_TREE_HASH;
use crate::array::FieldArray;
use crate::poseidon2_16;
use crate::poseidon2_24;

use super::TweakableHash;

use crate::F;

const DOMAIN_PARAMETERS_LENGTH: usize = 4;
/// The state width for merging two hashes in a tree or for the sponge construction.
const MERGE_COMPRESSION_WIDTH: usize = 24;

/// Enum to implement tweaks.
#[derive(Debug)]
pub enum PoseidonTweak {
    TreeTweak {
        level: u8,
        pos_in_level: u32,
    },
    ChainTweak {
        epoch: u32,
        chain_index: u8,
        pos_in_chain: u8,
    },
    MessageTweak {
        epoch: u32,
    },
}

impl PoseidonTweak {
    pub fn to_field_elements<const TWEAK_LEN: usize>(&self) -> [F; TWEAK_LEN] {
        // We first represent the entire tweak as one big integer
        let mut acc = match self {
            Self::TreeTweak {
                level,
                pos_in_level,
            } => {
                ((*level as u128) << 40)
                    | ((*pos_in_level as u128) << 8)
                    | (TWEAK_SEPARATOR_FOR_TREE_HASH as u128)
            }
            Self::ChainTweak {
                epoch,
                chain_index,
                pos_in_chain,
            } => {
                ((*epoch as u128) << 24)
                    | ((*chain_index as u128) << 16)
                    | ((*pos_in_chain as u128) << 8)
                    | (TWEAK_SEPARATOR_FOR_CHAIN_HASH as u128)
            }
            Self::MessageTweak { epoch } => {
                ((*epoch as u128) << 8) | (TWEAK_SEPARATOR_FOR_MESSAGE_HASH as u128)
            }
        };

        // Now we interpret this integer in base-p to get field elements
        std::array::from_fn(|_| {
            let digit = (acc % F::ORDER_U64 as u128) as u64;
            acc /= F::ORDER_U64 as u128;
            F::from_u64(digit)
        })
    }
}

/// Poseidon Compression Function
///
/// Computes:
///     PoseidonCompress(x) = Truncate(PoseidonPermute(x) + x)
///
/// - `WIDTH`: total state width (input length to permutation).
/// - `OUT_LEN`: number of output elements to return.
/// - `perm`: a cryptographically secure Poseidon permutation over `[F; WIDTH]`.
/// - `input`: slice of input values, must be `<= WIDTH` and `>= OUT_LEN`.
///
/// ### Warning: Input Padding
/// The `input` slice is **always silently padded with zeros** to match the
/// permutation's `WIDTH`. Inputs that are distinct but become identical after
/// zero-padding (e.g., `[A, B]` and `[A, B, 0]`) will produce the same hash;
/// the tweak layout in this crate encodes which of the fixed input shapes is
/// being hashed, which rules such pairs out.
///
/// Returns: the first `OUT_LEN` elements of the permuted and compressed state.
///
/// Panics:
/// - If `input.len() > WIDTH` or `input.len() < OUT_LEN`
pub fn poseidon_compress<P, const WIDTH: usize, const OUT_LEN: usize>(
    perm: &P,
    input: &[F],
) -> [F; OUT_LEN]
where
    P: CryptographicPermutation<[F; WIDTH]>,
{
    assert!(
        input.len() >= OUT_LEN,
        "Poseidon Compression: Input length must be at least output length."
    );

    // Copy the input into a fixed-width buffer, zero-padding unused elements if any.
    let mut padded_input = [F::ZERO; WIDTH];
    padded_input[..input.len()].copy_from_slice(input);

    // Start with the input as the initial state.
    let mut state = padded_input;

    // Apply the Poseidon permutation in-place.
    perm.permute_mut(&mut state);

    // Feed-forward: Add the input back into the state element-wise.
    for i in 0..WIDTH {
        state[i] += padded_input[i];
    }

    // Truncate and return the first `OUT_LEN` elements of the state.
    state[..OUT_LEN]
        .try_into()
        .expect("OUT_LEN is larger than permutation width")
}

/// Computes a Poseidon-based domain separator by compressing an array of `u32`
/// values using the Poseidon2 KoalaBear permutation with width 24.
pub(crate) fn poseidon_safe_domain_separator<const OUT_LEN: usize>(
    perm: &p3_koala_bear::Poseidon2KoalaBear<MERGE_COMPRESSION_WIDTH>,
    params: &[u32; DOMAIN_PARAMETERS_LENGTH],
) -> [F; OUT_LEN] {
    // Combine params into a single number in base 2^32.
    //
    // WARNING: We can use a u128 instead of a BigUint only because `params`
    // has 4 elements in base 2^32.
    let mut acc: u128 = 0;
    for &param in params {
        acc = (acc << 32) | (param as u128);
    }

    // Compute base-p decomposition
    let input: [F; MERGE_COMPRESSION_WIDTH] = std::array::from_fn(|_| {
        let digit = (acc % F::ORDER_U64 as u128) as u64;
        acc /= F::ORDER_U64 as u128;
        F::from_u64(digit)
    });

    poseidon_compress::<_, MERGE_COMPRESSION_WIDTH, OUT_LEN>(perm, &input)
}

/// Poseidon Sponge Hash Function
///
/// Absorbs an arbitrary-length input using the Poseidon sponge construction
/// and outputs `OUT_LEN` field elements. Domain separation is achieved by
/// injecting a `capacity_value` into the state.
///
/// ### Sponge Construction
/// This follows the classic sponge structure:
/// - **Absorption**: inputs are added chunk-by-chunk into the first `rate` elements of the state.
/// - **Squeezing**: outputs are read from the first `rate` elements of the state, permuted as needed.
///
/// ### Panics
/// - If `capacity_value.len() >= WIDTH`
pub(crate) fn poseidon_sponge<P, const WIDTH: usize, const OUT_LEN: usize>(
    perm: &P,
    capacity_value: &[F],
    input: &[F],
) -> [F; OUT_LEN]
where
    P: CryptographicPermutation<[F; WIDTH]>,
{
    // The capacity length must be strictly smaller than the width to have a non-zero rate.
    // This check prevents a panic from subtraction underflow when calculating the rate.
    assert!(
        capacity_value.len() < WIDTH,
        "Capacity length must be smaller than the state width."
    );
    let rate = WIDTH - capacity_value.len();

    // initialize
    let mut state = [F::ZERO; WIDTH];
    state[rate..].copy_from_slice(capacity_value);

    // 1. absorb all full chunks and permute
    let mut it = input.chunks_exact(rate);
    for chunk in &mut it {
        for (i, x) in chunk.iter().enumerate() {
            state[i] += *x;
        }
        perm.permute_mut(&mut state);
    }
    // 2. absorb the remainder; padding with zeros does not mutate the state,
    //    so only permute if there was a remainder
    if !it.remainder().is_empty() {
        for (i, x) in it.remainder().iter().enumerate() {
            state[i] += *x;
        }
        perm.permute_mut(&mut state);
    }

    // squeeze
    let mut out = [F::ZERO; OUT_LEN];
    let mut out_idx = 0;
    while out_idx < OUT_LEN {
        let chunk_size = (OUT_LEN - out_idx).min(rate);
        out[out_idx..out_idx + chunk_size].copy_from_slice(&state[..chunk_size]);
        out_idx += chunk_size;
        if out_idx < OUT_LEN {
            perm.permute_mut(&mut state);
        }
    }
    out
}

/// A tweakable hash function implemented using Poseidon2.
///
/// One-step chain hashing runs on the permutation of width `CHAIN_WIDTH`
/// (16 or 24, per the hash variant); merging two siblings and the sponge
/// over all chain ends always run on the width-24 permutation.
///
/// Note: HASH_LEN, TWEAK_LEN, and CAPACITY must be given in the unit
/// "number of field elements".
#[derive(Clone, Debug)]
pub struct PoseidonTweakHash<
    const CHAIN_WIDTH: usize,
    const HASH_LEN: usize,
    const TWEAK_LEN: usize,
    const CAPACITY: usize,
    const NUM_CHUNKS: usize,
>;

/// Hash variant running chain steps on the width-16 permutation.
pub type PoseidonTweakW16<
    const HASH_LEN: usize,
    const TWEAK_LEN: usize,
    const CAPACITY: usize,
    const NUM_CHUNKS: usize,
> = PoseidonTweakHash<16, HASH_LEN, TWEAK_LEN, CAPACITY, NUM_CHUNKS>;

/// Hash variant running chain steps on the width-24 permutation.
pub type PoseidonTweakW24<
    const HASH_LEN: usize,
    const TWEAK_LEN: usize,
    const CAPACITY: usize,
    const NUM_CHUNKS: usize,
> = PoseidonTweakHash<24, HASH_LEN, TWEAK_LEN, CAPACITY, NUM_CHUNKS>;

impl<
    const CHAIN_WIDTH: usize,
    const HASH_LEN: usize,
    const TWEAK_LEN: usize,
    const CAPACITY: usize,
    const NUM_CHUNKS: usize,
> TweakableHash for PoseidonTweakHash<CHAIN_WIDTH, HASH_LEN, TWEAK_LEN, CAPACITY, NUM_CHUNKS>
{
    type Tweak = PoseidonTweak;

    type Domain = FieldArray<HASH_LEN>;

    fn tree_tweak(level: u8, pos_in_level: u32) -> Self::Tweak {
        PoseidonTweak::TreeTweak {
            level,
            pos_in_level,
        }
    }

    fn chain_tweak(epoch: u32, chain_index: u8, pos_in_chain: u8) -> Self::Tweak {
        PoseidonTweak::ChainTweak {
            epoch,
            chain_index,
            pos_in_chain,
        }
    }

    fn apply(tweak: &Self::Tweak, message: &[Self::Domain]) -> Self::Domain {
        // we are in one of three cases:
        // (1) hashing within chains. We use compression mode.
        // (2) hashing two siblings in the tree. We use compression mode.
        // (3) hashing a long vector of chain ends. We use sponge mode.
        //
        // The tweak occupies the leading rate positions, payload follows.

        let tweak_fe = tweak.to_field_elements::<TWEAK_LEN>();

        match message {
            [single] => {
                let combined_input: Vec<F> =
                    tweak_fe.iter().chain(single.iter()).copied().collect();
                if CHAIN_WIDTH == 24 {
                    let perm = poseidon2_24();
                    FieldArray(poseidon_compress::<_, 24, HASH_LEN>(&perm, &combined_input))
                } else {
                    let perm = poseidon2_16();
                    FieldArray(poseidon_compress::<_, 16, HASH_LEN>(&perm, &combined_input))
                }
            }

            [left, right] => {
                let perm = poseidon2_24();
                let combined_input: Vec<F> = tweak_fe
                    .iter()
                    .chain(left.iter())
                    .chain(right.iter())
                    .copied()
                    .collect();
                FieldArray(poseidon_compress::<_, MERGE_COMPRESSION_WIDTH, HASH_LEN>(
                    &perm,
                    &combined_input,
                ))
            }

            _ if message.len() > 2 => {
                // Hashing many blocks
                let perm = poseidon2_24();
                let combined_input: Vec<F> = tweak_fe
                    .iter()
                    .copied()
                    .chain(message.iter().flat_map(|x| x.iter().copied()))
                    .collect();

                let lengths: [u32; DOMAIN_PARAMETERS_LENGTH] = [
                    TWEAK_LEN as u32,
                    NUM_CHUNKS as u32,
                    HASH_LEN as u32,
                    CAPACITY as u32,
                ];
                let capacity_value = poseidon_safe_domain_separator::<CAPACITY>(&perm, &lengths);
                FieldArray(poseidon_sponge::<_, MERGE_COMPRESSION_WIDTH, HASH_LEN>(
                    &perm,
                    &capacity_value,
                    &combined_input,
                ))
            }
            _ => FieldArray([F::ONE; HASH_LEN]), // Unreachable case, added for safety
        }
    }

    fn placeholder(level: u8, pos_in_level: u32) -> Self::Domain {
        // absent tree positions stand in as the hash of a zero block under
        // the position's own tweak
        Self::apply(
            &Self::tree_tweak(level, pos_in_level),
            &[FieldArray::ZERO],
        )
    }

    fn rand_domain<R: rand::Rng>(rng: &mut R) -> Self::Domain {
        FieldArray(rng.random())
    }

    #[cfg(test)]
    fn internal_consistency_check() {
        assert!(
            CHAIN_WIDTH == 16 || CHAIN_WIDTH == 24,
            "Poseidon Tweak Hash: Chain width must be 16 or 24"
        );
        assert!(
            CAPACITY < 24,
            "Poseidon Tweak Hash: Capacity must be less than 24"
        );
        assert!(
            TWEAK_LEN + HASH_LEN <= CHAIN_WIDTH,
            "Poseidon Tweak Chain Hash: Input lengths too large for Poseidon instance"
        );
        assert!(
            TWEAK_LEN + 2 * HASH_LEN <= 24,
            "Poseidon Tweak Tree Hash: Input lengths too large for Poseidon instance"
        );

        let bits_per_fe = f64::floor(f64::log2(F::ORDER_U64 as f64));
        let state_bits = bits_per_fe * f64::from(24_u32);
        assert!(
            state_bits >= f64::from((DOMAIN_PARAMETERS_LENGTH * 32) as u32),
            "Poseidon Tweak Leaf Hash: not enough field elements to hash the domain separator"
        );

        let bits_for_tree_tweak = f64::from(32 + 8_u32);
        let bits_for_chain_tweak = f64::from(32 + 8 + 8 + 8_u32);
        let tweak_fe_bits = bits_per_fe * f64::from(TWEAK_LEN as u32);
        assert!(
            tweak_fe_bits >= bits_for_tree_tweak,
            "Poseidon Tweak Hash: not enough field elements to encode the tree tweak"
        );
        assert!(
            tweak_fe_bits >= bits_for_chain_tweak,
            "Poseidon Tweak Hash: not enough field elements to encode the chain tweak"
        );
    }
}
