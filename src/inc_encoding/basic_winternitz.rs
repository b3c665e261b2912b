use crate::{
    MESSAGE_LENGTH,
    symmetric::message_hash::{MessageHash, bytes_to_chunks},
};

use super::IncomparableEncoding;

/// Incomparable Encoding Scheme based on the basic Winternitz scheme,
/// implemented from a given message hash.
/// CHUNK_SIZE must be 1, 2, 4, or 8 and MH::BASE must be 2^CHUNK_SIZE.
/// NUM_CHUNKS_CHECKSUM is the precomputed number of checksum chunks (see
/// original Winternitz description).
pub struct WinternitzEncoding<
    MH: MessageHash,
    const CHUNK_SIZE: usize,
    const NUM_CHUNKS_CHECKSUM: usize,
> {
    _marker_mh: std::marker::PhantomData<MH>,
}

impl<MH: MessageHash, const CHUNK_SIZE: usize, const NUM_CHUNKS_CHECKSUM: usize>
    IncomparableEncoding for WinternitzEncoding<MH, CHUNK_SIZE, NUM_CHUNKS_CHECKSUM>
{
    type Binding = MH::Binding;

    type Randomness = MH::Randomness;

    type Error = ();

    const DIMENSION: usize = MH::DIMENSION + NUM_CHUNKS_CHECKSUM;

    const MAX_TRIES: usize = 1;

    const BASE: usize = MH::BASE;

    fn rand<R: rand::Rng>(rng: &mut R) -> Self::Randomness {
        MH::rand(rng)
    }

    fn encode(
        binding: &Self::Binding,
        message: &[u8; MESSAGE_LENGTH],
        randomness: &Self::Randomness,
        epoch: u32,
    ) -> Result<Vec<u8>, Self::Error> {
        // apply the message hash to get chunks
        let mut chunks_message = MH::apply(binding, epoch, randomness, message);

        // compute checksum and split into chunks in little endian
        let checksum: u64 = chunks_message
            .iter()
            .map(|&x| Self::BASE as u64 - 1 - x as u64)
            .sum();
        let checksum_bytes = checksum.to_le_bytes();
        let chunks_checksum = bytes_to_chunks(&checksum_bytes, CHUNK_SIZE);

        // append checksum chunks (truncate to the expected number)
        chunks_message.extend_from_slice(&chunks_checksum[..NUM_CHUNKS_CHECKSUM]);

        Ok(chunks_message)
    }

    #[cfg(test)]
    fn internal_consistency_check() {
        assert!(
            [1, 2, 4, 8].contains(&CHUNK_SIZE),
            "Winternitz Encoding: Chunk Size must be 1, 2, 4, or 8"
        );
        assert!(
            Self::DIMENSION <= 1 << 8,
            "Winternitz Encoding: Dimension must be at most 2^8"
        );
        assert!(
            MH::BASE == Self::BASE && MH::BASE == 1 << CHUNK_SIZE,
            "Winternitz Encoding: Base and chunk size not consistent with message hash"
        );
        // the checksum must fit into the checksum chunks
        let max_checksum = MH::DIMENSION as u64 * (Self::BASE as u64 - 1);
        let checksum_capacity = 1u64 << (CHUNK_SIZE * NUM_CHUNKS_CHECKSUM);
        assert!(
            max_checksum < checksum_capacity,
            "Winternitz Encoding: Checksum chunks cannot represent the maximal checksum"
        );

        MH::internal_consistency_check();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::FieldArray;
    use crate::symmetric::message_hash::poseidon::PoseidonMessageHash;
    use rand::Rng;

    /// Winternitz geometry of the production parameter sets:
    /// 20 message chunks of 8 bits plus 2 checksum chunks.
    type TestMH = PoseidonMessageHash<7, 8, 5, 20, 256, 2>;
    type TestWinternitzEncoding = WinternitzEncoding<TestMH, 8, 2>;

    #[test]
    fn test_internal_consistency() {
        TestWinternitzEncoding::internal_consistency_check();
    }

    #[test]
    fn test_encoding_never_fails_and_checksum_matches() {
        let mut rng = rand::rng();
        let binding: FieldArray<8> = FieldArray(rng.random());
        let message: [u8; 32] = rng.random();
        let randomness = TestWinternitzEncoding::rand(&mut rng);
        let epoch = 4;

        let chunks = TestWinternitzEncoding::encode(&binding, &message, &randomness, epoch)
            .expect("Winternitz encoding cannot fail");
        assert_eq!(chunks.len(), TestWinternitzEncoding::DIMENSION);

        // recompute the checksum from the message chunks and compare
        let message_chunks = &chunks[..TestMH::DIMENSION];
        let checksum: u64 = message_chunks
            .iter()
            .map(|&x| TestWinternitzEncoding::BASE as u64 - 1 - x as u64)
            .sum();
        let expected = checksum.to_le_bytes();
        assert_eq!(chunks[TestMH::DIMENSION], expected[0]);
        assert_eq!(chunks[TestMH::DIMENSION + 1], expected[1]);
    }

    #[test]
    fn test_codewords_are_incomparable_via_checksum() {
        // if all message chunks of a were >= those of b, the checksums would
        // order the other way; spot-check the mechanism on two encodings
        let mut rng = rand::rng();
        let binding: FieldArray<8> = FieldArray(rng.random());
        let randomness = TestWinternitzEncoding::rand(&mut rng);

        let m1: [u8; 32] = rng.random();
        let m2: [u8; 32] = rng.random();

        let c1 = TestWinternitzEncoding::encode(&binding, &m1, &randomness, 0).unwrap();
        let c2 = TestWinternitzEncoding::encode(&binding, &m2, &randomness, 0).unwrap();

        if c1 != c2 {
            let c1_dominates = c1.iter().zip(&c2).all(|(a, b)| a >= b);
            let c2_dominates = c1.iter().zip(&c2).all(|(a, b)| a <= b);
            assert!(!c1_dominates && !c2_dominates);
        }
    }
}
