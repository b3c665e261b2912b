//! Recognized parameter sets and their one-byte wire tags.
//!
//! A parameter set is chosen at key generation and embedded (as its tag) in
//! every public key, secret key, and therefore every operation on them. The
//! typed instantiations in
//! [`crate::signature::generalized_xmss::instantiations_poseidon`] pin the
//! tag at the type level; this module is the runtime view used by wire-format
//! validation and by the CLI's `inspect` command.

/// Which Poseidon2 permutation width the one-step chain hash runs on.
///
/// Tree merges and the sponge always use the width-24 permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashVariant {
    Poseidon2Width16,
    Poseidon2Width24,
}

/// Message-to-chunk encoding flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingKind {
    /// Rejection-sample rho until the chunks sum to a fixed target.
    TargetSum,
    /// Base-2^w digits plus a checksum, one attempt.
    Winternitz,
}

/// Immutable scheme configuration, identified on the wire by `tag`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSet {
    pub tag: u8,
    pub hash_variant: HashVariant,
    pub lifetime_log2: usize,
    /// Length of each hash chain (w). Chunks take values in [0, w).
    pub chain_length: usize,
    /// Number of chains per one-time key (v), checksum chains included.
    pub num_chains: usize,
    pub encoding: EncodingKind,
    /// Field elements per hash output.
    pub field_elems_per_hash: usize,
}

impl ParameterSet {
    /// Total number of epochs, `2^lifetime_log2`.
    pub const fn lifetime(&self) -> u64 {
        1u64 << self.lifetime_log2
    }

    /// Looks up a recognized parameter set by its wire tag.
    pub fn from_tag(tag: u8) -> Option<&'static ParameterSet> {
        RECOGNIZED.iter().find(|p| p.tag == tag)
    }
}

const fn set(
    tag: u8,
    hash_variant: HashVariant,
    lifetime_log2: usize,
    encoding: EncodingKind,
) -> ParameterSet {
    ParameterSet {
        tag,
        hash_variant,
        lifetime_log2,
        chain_length: 256,
        num_chains: 22,
        encoding,
        field_elems_per_hash: 8,
    }
}

/// All parameter sets this build understands. Unknown tags are rejected
/// during deserialization.
pub static RECOGNIZED: &[ParameterSet] = &[
    // Target sum, chain hashing on the width-16 permutation.
    set(0x01, HashVariant::Poseidon2Width16, 8, EncodingKind::TargetSum),
    set(0x02, HashVariant::Poseidon2Width16, 10, EncodingKind::TargetSum),
    set(0x03, HashVariant::Poseidon2Width16, 16, EncodingKind::TargetSum),
    set(0x04, HashVariant::Poseidon2Width16, 18, EncodingKind::TargetSum),
    set(0x05, HashVariant::Poseidon2Width16, 20, EncodingKind::TargetSum),
    set(0x06, HashVariant::Poseidon2Width16, 28, EncodingKind::TargetSum),
    set(0x07, HashVariant::Poseidon2Width16, 32, EncodingKind::TargetSum),
    // Winternitz with 8-bit chunks, chain hashing on the width-16 permutation.
    set(0x11, HashVariant::Poseidon2Width16, 8, EncodingKind::Winternitz),
    set(0x12, HashVariant::Poseidon2Width16, 10, EncodingKind::Winternitz),
    set(0x13, HashVariant::Poseidon2Width16, 16, EncodingKind::Winternitz),
    set(0x14, HashVariant::Poseidon2Width16, 18, EncodingKind::Winternitz),
    set(0x15, HashVariant::Poseidon2Width16, 20, EncodingKind::Winternitz),
    set(0x16, HashVariant::Poseidon2Width16, 28, EncodingKind::Winternitz),
    set(0x17, HashVariant::Poseidon2Width16, 32, EncodingKind::Winternitz),
    // Target sum, chain hashing on the width-24 permutation.
    set(0x21, HashVariant::Poseidon2Width24, 8, EncodingKind::TargetSum),
    set(0x22, HashVariant::Poseidon2Width24, 10, EncodingKind::TargetSum),
    set(0x23, HashVariant::Poseidon2Width24, 16, EncodingKind::TargetSum),
    set(0x24, HashVariant::Poseidon2Width24, 18, EncodingKind::TargetSum),
    set(0x25, HashVariant::Poseidon2Width24, 20, EncodingKind::TargetSum),
    set(0x26, HashVariant::Poseidon2Width24, 28, EncodingKind::TargetSum),
    set(0x27, HashVariant::Poseidon2Width24, 32, EncodingKind::TargetSum),
];
