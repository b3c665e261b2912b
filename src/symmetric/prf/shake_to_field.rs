use crate::F;
use crate::array::FieldArray;

use super::Pseudorandom;
use p3_field::PrimeCharacteristicRing;
use sha3::{
    Shake128,
    digest::{ExtendableOutput, Update, XofReader},
};

/// Number of pseudorandom bytes consumed per pseudorandom field element.
///
/// Interoperability requirement: exactly 16 bytes per element, interpreted
/// as a little-endian 128-bit integer and reduced into the field. Do not
/// shrink this even though fewer bytes would suffice statistically.
const PRF_BYTES_PER_FE: usize = 16;

const KEY_LENGTH: usize = 32; // 32 bytes
const PRF_DOMAIN_SEP: [u8; 16] = [
    0xae, 0xae, 0x22, 0xff, 0x00, 0x01, 0xfa, 0xff, 0x21, 0xaf, 0x12, 0x00, 0x01, 0x11, 0xff, 0x00,
];
const PRF_DOMAIN_SEP_CHAIN_HEAD: [u8; 1] = [0x00];
const PRF_DOMAIN_SEP_RANDOMNESS: [u8; 1] = [0x01];

/// A pseudorandom function mapping to field elements, implemented with
/// Shake128. Chain heads are HEAD_LEN_FE elements, encoding randomness is
/// RAND_LEN_FE elements.
pub struct ShakePRFtoF<const HEAD_LEN_FE: usize, const RAND_LEN_FE: usize>;

/// Reads field elements from the XOF, one 16-byte little-endian window each.
fn read_field_elements<const N: usize>(xof_reader: &mut impl XofReader) -> FieldArray<N> {
    FieldArray(std::array::from_fn(|_| {
        let mut buf = [0u8; PRF_BYTES_PER_FE];
        xof_reader.read(&mut buf);
        F::from_u128(u128::from_le_bytes(buf))
    }))
}

impl<const HEAD_LEN_FE: usize, const RAND_LEN_FE: usize> Pseudorandom
    for ShakePRFtoF<HEAD_LEN_FE, RAND_LEN_FE>
{
    type Key = [u8; KEY_LENGTH];
    type Domain = FieldArray<HEAD_LEN_FE>;
    type Randomness = FieldArray<RAND_LEN_FE>;

    const KEY_LENGTH: usize = KEY_LENGTH;

    fn key_gen<R: rand::Rng>(rng: &mut R) -> Self::Key {
        rng.random()
    }

    fn get_chain_head(key: &Self::Key, epoch: u32, chain_index: u64) -> Self::Domain {
        let mut hasher = Shake128::default();

        // Domain separator, then a second separator distinguishing chain
        // heads from encoding randomness.
        hasher.update(&PRF_DOMAIN_SEP);
        hasher.update(&PRF_DOMAIN_SEP_CHAIN_HEAD);

        hasher.update(key);
        hasher.update(&epoch.to_be_bytes());
        hasher.update(&chain_index.to_be_bytes());

        let mut xof_reader = hasher.finalize_xof();
        read_field_elements(&mut xof_reader)
    }

    fn get_randomness(
        key: &Self::Key,
        epoch: u32,
        message: &[u8; crate::MESSAGE_LENGTH],
        counter: u64,
    ) -> Self::Randomness {
        let mut hasher = Shake128::default();

        hasher.update(&PRF_DOMAIN_SEP);
        hasher.update(&PRF_DOMAIN_SEP_RANDOMNESS);

        hasher.update(key);
        hasher.update(&epoch.to_be_bytes());
        hasher.update(message);
        hasher.update(&counter.to_be_bytes());

        let mut xof_reader = hasher.finalize_xof();
        read_field_elements(&mut xof_reader)
    }

    fn key_to_bytes(key: &Self::Key) -> Vec<u8> {
        key.to_vec()
    }

    fn key_from_bytes(bytes: &[u8]) -> Option<Self::Key> {
        bytes.try_into().ok()
    }

    #[cfg(test)]
    fn internal_consistency_check() {
        // No check is needed
    }
}
