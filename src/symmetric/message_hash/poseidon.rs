use p3_field::{PrimeCharacteristicRing, PrimeField32};

use crate::F;
use crate::MESSAGE_LENGTH;
use crate::array::FieldArray;
use crate::poseidon2_24;
use crate::symmetric::tweak_hash::poseidon::{
    PoseidonTweak, poseidon_safe_domain_separator, poseidon_sponge,
};

use super::{MessageHash, bytes_to_chunks};

/// The state width used for message hashing (sponge construction).
const MESSAGE_HASH_WIDTH: usize = 24;

/// Bytes of the message packed into each field element. Three bytes keep
/// every element canonical (24 bits < 31) and the packing injective.
const MSG_BYTES_PER_FE: usize = 3;

/// Number of field elements the 32-byte message decomposes into.
pub(crate) const MSG_LEN_FE: usize = MESSAGE_LENGTH.div_ceil(MSG_BYTES_PER_FE);

/// A message hash implemented using Poseidon2 in sponge mode.
///
/// The sponge absorbs, in order: the epoch tweak, the randomness rho, the
/// message (as 24-bit limbs), and the binding value (the key's Merkle root).
/// The squeezed elements are re-read as bytes and split into `DIMENSION`
/// chunks of `log2(BASE)` bits.
///
/// Note: RAND_LEN, HASH_LEN, OUT_LEN_FE, and TWEAK_LEN must be given in the
/// unit "number of field elements".
#[derive(Debug)]
pub struct PoseidonMessageHash<
    const RAND_LEN: usize,
    const HASH_LEN: usize,
    const OUT_LEN_FE: usize,
    const DIMENSION: usize,
    const BASE: usize,
    const TWEAK_LEN: usize,
>;

impl<
    const RAND_LEN: usize,
    const HASH_LEN: usize,
    const OUT_LEN_FE: usize,
    const DIMENSION: usize,
    const BASE: usize,
    const TWEAK_LEN: usize,
> PoseidonMessageHash<RAND_LEN, HASH_LEN, OUT_LEN_FE, DIMENSION, BASE, TWEAK_LEN>
{
    /// Bits per chunk, BASE = 2^CHUNK_SIZE.
    const CHUNK_SIZE: usize = BASE.trailing_zeros() as usize;

    /// Packs the message into field elements, three bytes per element,
    /// little-endian within each element.
    fn message_to_field_elements(message: &[u8; MESSAGE_LENGTH]) -> [F; MSG_LEN_FE] {
        std::array::from_fn(|i| {
            let start = i * MSG_BYTES_PER_FE;
            let end = (start + MSG_BYTES_PER_FE).min(MESSAGE_LENGTH);
            let mut limb: u32 = 0;
            for (shift, &byte) in message[start..end].iter().enumerate() {
                limb |= (byte as u32) << (8 * shift);
            }
            F::from_u32(limb)
        })
    }
}

impl<
    const RAND_LEN: usize,
    const HASH_LEN: usize,
    const OUT_LEN_FE: usize,
    const DIMENSION: usize,
    const BASE: usize,
    const TWEAK_LEN: usize,
> MessageHash for PoseidonMessageHash<RAND_LEN, HASH_LEN, OUT_LEN_FE, DIMENSION, BASE, TWEAK_LEN>
{
    type Binding = FieldArray<HASH_LEN>;

    type Randomness = FieldArray<RAND_LEN>;

    const DIMENSION: usize = DIMENSION;

    const BASE: usize = BASE;

    fn rand<R: rand::Rng>(rng: &mut R) -> Self::Randomness {
        FieldArray(rng.random())
    }

    fn apply(
        binding: &Self::Binding,
        epoch: u32,
        randomness: &Self::Randomness,
        message: &[u8; MESSAGE_LENGTH],
    ) -> Vec<u8> {
        let perm = poseidon2_24();

        // assemble the sponge input: epoch tweak, rho, message, binding
        let tweak_fe = PoseidonTweak::MessageTweak { epoch }.to_field_elements::<TWEAK_LEN>();
        let message_fe = Self::message_to_field_elements(message);

        let combined_input: Vec<F> = tweak_fe
            .iter()
            .chain(randomness.iter())
            .chain(message_fe.iter())
            .chain(binding.iter())
            .copied()
            .collect();

        let lengths: [u32; 4] = [
            TWEAK_LEN as u32,
            RAND_LEN as u32,
            DIMENSION as u32,
            BASE as u32,
        ];
        let capacity_value = poseidon_safe_domain_separator::<9>(&perm, &lengths);

        let squeezed: [F; OUT_LEN_FE] = poseidon_sponge::<_, MESSAGE_HASH_WIDTH, OUT_LEN_FE>(
            &perm,
            &capacity_value,
            &combined_input,
        );

        // re-read the squeezed elements as bytes and cut them into chunks
        let mut bytes = Vec::with_capacity(OUT_LEN_FE * 4);
        for elem in &squeezed {
            bytes.extend_from_slice(&elem.as_canonical_u32().to_le_bytes());
        }

        let mut chunks = bytes_to_chunks(&bytes, Self::CHUNK_SIZE);
        chunks.truncate(DIMENSION);
        chunks
    }

    #[cfg(test)]
    fn internal_consistency_check() {
        assert!(
            BASE.is_power_of_two() && BASE <= 1 << 8,
            "Poseidon Message Hash: Base must be a power of two, at most 2^8"
        );
        assert!(
            DIMENSION <= 1 << 8,
            "Poseidon Message Hash: Dimension must be at most 2^8"
        );
        assert!(
            OUT_LEN_FE * 4 * 8 >= DIMENSION * Self::CHUNK_SIZE,
            "Poseidon Message Hash: not enough output to cover all chunks"
        );
        assert!(
            TWEAK_LEN + RAND_LEN + MSG_LEN_FE + HASH_LEN <= 2 * (MESSAGE_HASH_WIDTH - 9),
            "Poseidon Message Hash: input should fit in two absorption rounds"
        );
    }
}
