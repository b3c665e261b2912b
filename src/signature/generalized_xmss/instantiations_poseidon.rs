//! Named instantiations of the generalized XMSS scheme over KoalaBear.
//!
//! All instantiations share the chain geometry of the recognized parameter
//! sets (hash chains of length 256, 22 chains, 8 field elements per hash);
//! they differ in lifetime, encoding, and the permutation width used for
//! chain steps. The wire tag pinned by each alias must match the entry in
//! [`crate::params::RECOGNIZED`].

use crate::inc_encoding::{basic_winternitz::WinternitzEncoding, target_sum::TargetSumEncoding};
use crate::symmetric::message_hash::poseidon::PoseidonMessageHash;
use crate::symmetric::prf::shake_to_field::ShakePRFtoF;
use crate::symmetric::tweak_hash::poseidon::{PoseidonTweakW16, PoseidonTweakW24};

use super::GeneralizedXmssSignatureScheme;

/// Field elements per hash output.
pub const HASH_LEN_FE: usize = 8;
/// Field elements per tweak.
pub const TWEAK_LEN_FE: usize = 2;
/// Sponge capacity in field elements.
pub const CAPACITY: usize = 9;
/// Field elements of encoding randomness rho.
pub const RAND_LEN_FE: usize = 7;
/// Chunks take values in 0..256, i.e. one byte each.
pub const BASE: usize = 256;
/// Chains per one-time key, checksum chains included.
pub const DIMENSION: usize = 22;

/// Number of message chunks for the target-sum encoding (all chains carry
/// message chunks).
const TS_NUM_CHUNKS: usize = DIMENSION;
/// Chunks sum to the expected value of 22 uniform bytes.
const TARGET_SUM: usize = TS_NUM_CHUNKS * (BASE - 1) / 2;
/// Message-hash output sized to cover 22 one-byte chunks.
const TS_MSG_OUT_FE: usize = 6;

/// Number of message chunks for the Winternitz encoding; two checksum
/// chunks bring the total back to 22 chains.
const W_NUM_CHUNKS: usize = 20;
const W_NUM_CHUNKS_CHECKSUM: usize = 2;
const W_CHUNK_SIZE: usize = 8;
/// Message-hash output sized to cover 20 one-byte chunks.
const W_MSG_OUT_FE: usize = 5;

type Prf = ShakePRFtoF<HASH_LEN_FE, RAND_LEN_FE>;

type ThW16 = PoseidonTweakW16<HASH_LEN_FE, TWEAK_LEN_FE, CAPACITY, DIMENSION>;
type ThW24 = PoseidonTweakW24<HASH_LEN_FE, TWEAK_LEN_FE, CAPACITY, DIMENSION>;

type MhTargetSum =
    PoseidonMessageHash<RAND_LEN_FE, HASH_LEN_FE, TS_MSG_OUT_FE, TS_NUM_CHUNKS, BASE, TWEAK_LEN_FE>;
type IeTargetSum = TargetSumEncoding<MhTargetSum, TARGET_SUM>;

type MhWinternitz =
    PoseidonMessageHash<RAND_LEN_FE, HASH_LEN_FE, W_MSG_OUT_FE, W_NUM_CHUNKS, BASE, TWEAK_LEN_FE>;
type IeWinternitz = WinternitzEncoding<MhWinternitz, W_CHUNK_SIZE, W_NUM_CHUNKS_CHECKSUM>;

// Target sum, chain steps on the width-16 permutation.
pub type SigTargetSumLifetime8 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW16, 8, 0x01>;
pub type SigTargetSumLifetime10 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW16, 10, 0x02>;
pub type SigTargetSumLifetime16 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW16, 16, 0x03>;
pub type SigTargetSumLifetime18 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW16, 18, 0x04>;
pub type SigTargetSumLifetime20 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW16, 20, 0x05>;
pub type SigTargetSumLifetime28 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW16, 28, 0x06>;
pub type SigTargetSumLifetime32 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW16, 32, 0x07>;

// Winternitz with 8-bit chunks, chain steps on the width-16 permutation.
pub type SigWinternitzLifetime8 =
    GeneralizedXmssSignatureScheme<Prf, IeWinternitz, ThW16, 8, 0x11>;
pub type SigWinternitzLifetime10 =
    GeneralizedXmssSignatureScheme<Prf, IeWinternitz, ThW16, 10, 0x12>;
pub type SigWinternitzLifetime16 =
    GeneralizedXmssSignatureScheme<Prf, IeWinternitz, ThW16, 16, 0x13>;
pub type SigWinternitzLifetime18 =
    GeneralizedXmssSignatureScheme<Prf, IeWinternitz, ThW16, 18, 0x14>;
pub type SigWinternitzLifetime20 =
    GeneralizedXmssSignatureScheme<Prf, IeWinternitz, ThW16, 20, 0x15>;
pub type SigWinternitzLifetime28 =
    GeneralizedXmssSignatureScheme<Prf, IeWinternitz, ThW16, 28, 0x16>;
pub type SigWinternitzLifetime32 =
    GeneralizedXmssSignatureScheme<Prf, IeWinternitz, ThW16, 32, 0x17>;

// Target sum, chain steps on the width-24 permutation.
pub type SigTargetSumW24Lifetime8 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW24, 8, 0x21>;
pub type SigTargetSumW24Lifetime10 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW24, 10, 0x22>;
pub type SigTargetSumW24Lifetime16 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW24, 16, 0x23>;
pub type SigTargetSumW24Lifetime18 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW24, 18, 0x24>;
pub type SigTargetSumW24Lifetime20 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW24, 20, 0x25>;
pub type SigTargetSumW24Lifetime28 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW24, 28, 0x26>;
pub type SigTargetSumW24Lifetime32 =
    GeneralizedXmssSignatureScheme<Prf, IeTargetSum, ThW24, 32, 0x27>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{EncodingKind, ParameterSet, RECOGNIZED};
    use crate::signature::SignatureScheme;

    #[test]
    fn target_sum_matches_expected_sum_of_uniform_chunks() {
        assert_eq!(TARGET_SUM, 2805);
    }

    #[test]
    fn every_recognized_tag_has_consistent_geometry() {
        for params in RECOGNIZED {
            assert_eq!(params.chain_length, BASE);
            assert_eq!(params.num_chains, DIMENSION);
            assert_eq!(params.field_elems_per_hash, HASH_LEN_FE);
            match params.encoding {
                EncodingKind::TargetSum => {}
                EncodingKind::Winternitz => {
                    assert_eq!(DIMENSION, W_NUM_CHUNKS + W_NUM_CHUNKS_CHECKSUM);
                }
            }
        }
    }

    #[test]
    fn aliases_agree_with_registry() {
        fn check<S: SignatureScheme>() {
            let params = ParameterSet::from_tag(S::PARAMETER_TAG).expect("tag registered");
            assert_eq!(params.lifetime(), S::LIFETIME);
        }

        check::<SigTargetSumLifetime8>();
        check::<SigTargetSumLifetime10>();
        check::<SigTargetSumLifetime16>();
        check::<SigTargetSumLifetime18>();
        check::<SigTargetSumLifetime20>();
        check::<SigTargetSumLifetime28>();
        check::<SigTargetSumLifetime32>();
        check::<SigWinternitzLifetime8>();
        check::<SigWinternitzLifetime10>();
        check::<SigWinternitzLifetime16>();
        check::<SigWinternitzLifetime18>();
        check::<SigWinternitzLifetime20>();
        check::<SigWinternitzLifetime28>();
        check::<SigWinternitzLifetime32>();
        check::<SigTargetSumW24Lifetime8>();
        check::<SigTargetSumW24Lifetime10>();
        check::<SigTargetSumW24Lifetime16>();
        check::<SigTargetSumW24Lifetime18>();
        check::<SigTargetSumW24Lifetime20>();
        check::<SigTargetSumW24Lifetime28>();
        check::<SigTargetSumW24Lifetime32>();
    }
}
