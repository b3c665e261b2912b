use std::marker::PhantomData;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    MESSAGE_LENGTH,
    error::Error,
    inc_encoding::IncomparableEncoding,
    params::ParameterSet,
    serialization::Serializable,
    signature::{KeyRetention, SignatureScheme, SignatureSchemeSecretKey},
    symmetric::{
        prf::Pseudorandom,
        tweak_hash::{TweakableHash, chain},
        tweak_hash_tree::{HashSubTree, HashTreeOpening, combined_path, hash_tree_verify},
    },
};

use ssz::{Decode, DecodeError, Encode};

/// Implementation of the generalized XMSS signature scheme
/// from any incomparable encoding scheme and any tweakable hash.
///
/// It also uses a PRF for key generation, and one has to specify
/// the (base 2 log of the) key lifetime and the wire tag of the
/// parameter set the instantiation realizes.
///
/// Note: lifetimes beyond 2^32 are not supported.
pub struct GeneralizedXmssSignatureScheme<
    PRF: Pseudorandom,
    IE: IncomparableEncoding,
    TH: TweakableHash,
    const LOG_LIFETIME: usize,
    const PARAM_TAG: u8,
> {
    _prf: PhantomData<PRF>,
    _ie: PhantomData<IE>,
    _th: PhantomData<TH>,
}

/// Number of leafs covered by one bottom subtree.
const fn leafs_per_bottom_tree<const LOG_LIFETIME: usize>() -> u64 {
    1u64 << (LOG_LIFETIME / 2)
}

/// Checks an embedded parameter tag against the tag the caller expects.
/// A recognized-but-different tag is a parameter mismatch; anything else
/// cannot be decoded at all.
fn check_parameter_tag(expected: u8, found: u8) -> Result<(), Error> {
    if found == expected {
        return Ok(());
    }
    if ParameterSet::from_tag(found).is_some() {
        Err(Error::ParameterMismatch { expected, found })
    } else {
        Err(Error::Deserialization(format!(
            "unknown parameter tag {found:#04x}"
        )))
    }
}

fn read_u64(bytes: &[u8], pos: usize) -> Result<u64, Error> {
    let slice = bytes
        .get(pos..pos + 8)
        .ok_or_else(|| Error::Deserialization("truncated u64 field".into()))?;
    Ok(u64::from_le_bytes(slice.try_into().expect("slice is 8 bytes")))
}

fn read_u32(bytes: &[u8], pos: usize) -> Result<u32, Error> {
    let slice = bytes
        .get(pos..pos + 4)
        .ok_or_else(|| Error::Deserialization("truncated u32 field".into()))?;
    Ok(u32::from_le_bytes(slice.try_into().expect("slice is 4 bytes")))
}

/// Signature for GeneralizedXmssSignatureScheme.
/// It contains the epoch it was issued for, encoding randomness, a list of
/// chain hashes, and a Merkle authentication path.
#[derive(Serialize, Deserialize, Debug)]
#[serde(bound = "")]
pub struct GeneralizedXmssSignature<
    IE: IncomparableEncoding,
    TH: TweakableHash,
    const LOG_LIFETIME: usize,
> {
    epoch: u64,
    rho: IE::Randomness,
    path: HashTreeOpening<TH>,
    hashes: Vec<TH::Domain>,
}

impl<IE: IncomparableEncoding, TH: TweakableHash, const LOG_LIFETIME: usize>
    GeneralizedXmssSignature<IE, TH, LOG_LIFETIME>
{
    /// The epoch this signature was issued for.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The encoding randomness, exposed for tamper tests.
    #[cfg(test)]
    pub(crate) fn rho_mut(&mut self) -> &mut IE::Randomness {
        &mut self.rho
    }
}

impl<IE: IncomparableEncoding, TH: TweakableHash, const LOG_LIFETIME: usize> Encode
    for GeneralizedXmssSignature<IE, TH, LOG_LIFETIME>
{
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_bytes_len(&self) -> usize {
        // SSZ Container: epoch (8) + offset (4) + rho (fixed) + offset (4) + variable data
        let rho_size = self.rho.ssz_bytes_len();
        let path_size = self.path.ssz_bytes_len();
        let hashes_size = self.hashes.ssz_bytes_len();

        8 + 4 + rho_size + 4 + path_size + hashes_size
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        // Appends the SSZ encoding to the buffer.
        //
        // SSZ Container encoding with fields interleaved in declaration order:
        // - Field 1 (epoch): fixed → write data
        // - Field 2 (rho): fixed → write data  (declared after epoch)
        // - Field 3 (path): variable → write offset
        // - Field 4 (hashes): variable → write offset
        //
        // Then write variable data in order: path, hashes

        let rho_size = self.rho.ssz_bytes_len();
        // epoch + rho + two offsets
        let fixed_size = 8 + rho_size + 4 + 4;

        let offset_path = fixed_size;
        let offset_hashes = offset_path + self.path.ssz_bytes_len();

        // 1. Encode fixed field: epoch (u64)
        buf.extend_from_slice(&self.epoch.to_le_bytes());

        // 2. Encode fixed field: rho
        self.rho.ssz_append(buf);

        // 3. Encode offset for first variable field: path
        buf.extend_from_slice(&(offset_path as u32).to_le_bytes());

        // 4. Encode offset for second variable field: hashes
        buf.extend_from_slice(&(offset_hashes as u32).to_le_bytes());

        // 5. Encode variable data in order
        self.path.ssz_append(buf);
        self.hashes.ssz_append(buf);
    }
}

impl<IE: IncomparableEncoding, TH: TweakableHash, const LOG_LIFETIME: usize> Decode
    for GeneralizedXmssSignature<IE, TH, LOG_LIFETIME>
{
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        // Decodes a generalized XMSS signature from SSZ bytes.
        //
        // Fields are interleaved: epoch → rho → offset_path → offset_hashes → variable data

        // Get fixed size of rho field
        let rho_size = if <IE::Randomness as Encode>::is_ssz_fixed_len() {
            <IE::Randomness as Encode>::ssz_fixed_len()
        } else {
            return Err(DecodeError::BytesInvalid(
                "IE::Randomness must be fixed length".into(),
            ));
        };

        // Minimum size: epoch (8) + rho (fixed) + offsets (8)
        let min_size = 8 + rho_size + 8;
        if bytes.len() < min_size {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: min_size,
            });
        }

        // 1. Decode fixed field: epoch
        let epoch = u64::from_le_bytes(bytes[0..8].try_into().expect("slice is 8 bytes"));

        // 2. Decode fixed field: rho
        let rho = IE::Randomness::from_ssz_bytes(&bytes[8..8 + rho_size])?;

        // 3. Read offsets for the variable fields
        let mut pos = 8 + rho_size;
        let offset_path =
            u32::from_le_bytes(bytes[pos..pos + 4].try_into().expect("slice is 4 bytes"))
                as usize;
        pos += 4;
        let offset_hashes =
            u32::from_le_bytes(bytes[pos..pos + 4].try_into().expect("slice is 4 bytes"))
                as usize;
        pos += 4;

        // Validate offset_path points to end of fixed part
        if offset_path != pos {
            return Err(DecodeError::InvalidByteLength {
                len: offset_path,
                expected: pos,
            });
        }

        // Panic safety: Ensure offsets are monotonic and within bounds
        // This prevents panic when creating slices below
        if offset_path > offset_hashes || offset_hashes > bytes.len() {
            return Err(DecodeError::BytesInvalid(format!(
                "Invalid variable offsets: path={} hashes={} len={}",
                offset_path,
                offset_hashes,
                bytes.len()
            )));
        }

        // 4. Decode variable fields (now safe after bounds check)
        let path = HashTreeOpening::<TH>::from_ssz_bytes(&bytes[offset_path..offset_hashes])?;
        let hashes = Vec::<TH::Domain>::from_ssz_bytes(&bytes[offset_hashes..])?;

        Ok(Self {
            epoch,
            rho,
            path,
            hashes,
        })
    }
}

impl<IE: IncomparableEncoding, TH: TweakableHash, const LOG_LIFETIME: usize> Serializable
    for GeneralizedXmssSignature<IE, TH, LOG_LIFETIME>
{
    fn to_bytes(&self) -> Vec<u8> {
        // epoch || auth_path_len || auth_path || rho || hashes_len || hashes
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.epoch.to_le_bytes());
        buf.extend_from_slice(&(self.path.nodes().len() as u32).to_le_bytes());
        for node in self.path.nodes() {
            node.ssz_append(&mut buf);
        }
        self.rho.ssz_append(&mut buf);
        buf.extend_from_slice(&(self.hashes.len() as u32).to_le_bytes());
        for hash in &self.hashes {
            hash.ssz_append(&mut buf);
        }
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let node_len = <TH::Domain as Decode>::ssz_fixed_len();
        if !<IE::Randomness as Decode>::is_ssz_fixed_len() {
            return Err(Error::Deserialization(
                "encoding randomness must be fixed length".into(),
            ));
        }
        let rho_len = <IE::Randomness as Decode>::ssz_fixed_len();

        let epoch = read_u64(bytes, 0)?;
        let path_len = read_u32(bytes, 8)? as usize;
        if path_len != LOG_LIFETIME {
            return Err(Error::Deserialization(format!(
                "authentication path has {path_len} nodes, expected {LOG_LIFETIME}"
            )));
        }

        let mut pos = 12;
        let mut co_path = Vec::with_capacity(path_len);
        for _ in 0..path_len {
            let slice = bytes
                .get(pos..pos + node_len)
                .ok_or_else(|| Error::Deserialization("truncated authentication path".into()))?;
            co_path.push(TH::Domain::from_ssz_bytes(slice)?);
            pos += node_len;
        }

        let rho_slice = bytes
            .get(pos..pos + rho_len)
            .ok_or_else(|| Error::Deserialization("truncated encoding randomness".into()))?;
        let rho = IE::Randomness::from_ssz_bytes(rho_slice)?;
        pos += rho_len;

        let hashes_len = read_u32(bytes, pos)? as usize;
        pos += 4;
        if hashes_len != IE::DIMENSION {
            return Err(Error::Deserialization(format!(
                "signature has {hashes_len} chain hashes, expected {}",
                IE::DIMENSION
            )));
        }
        let mut hashes = Vec::with_capacity(hashes_len);
        for _ in 0..hashes_len {
            let slice = bytes
                .get(pos..pos + node_len)
                .ok_or_else(|| Error::Deserialization("truncated chain hashes".into()))?;
            hashes.push(TH::Domain::from_ssz_bytes(slice)?);
            pos += node_len;
        }

        if pos != bytes.len() {
            return Err(Error::Deserialization(
                "trailing bytes after signature".into(),
            ));
        }

        Ok(Self {
            epoch,
            rho,
            path: HashTreeOpening::from_nodes(co_path),
            hashes,
        })
    }
}

/// Public key for GeneralizedXmssSignatureScheme.
/// It contains a Merkle root; the parameter set is pinned by the type and
/// appears on the wire as its one-byte tag.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct GeneralizedXmssPublicKey<TH: TweakableHash, const PARAM_TAG: u8> {
    root: TH::Domain,
}

impl<TH: TweakableHash, const PARAM_TAG: u8> GeneralizedXmssPublicKey<TH, PARAM_TAG> {
    /// The parameter set this key was generated under, if the build
    /// recognizes its tag.
    pub fn parameter_set(&self) -> Option<&'static ParameterSet> {
        ParameterSet::from_tag(PARAM_TAG)
    }

    /// The wire tag of the parameter set.
    pub fn parameter_tag(&self) -> u8 {
        PARAM_TAG
    }

    /// The Merkle root this key commits to.
    pub fn root(&self) -> &TH::Domain {
        &self.root
    }
}

impl<TH: TweakableHash, const PARAM_TAG: u8> Encode for GeneralizedXmssPublicKey<TH, PARAM_TAG> {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <TH::Domain as Encode>::ssz_fixed_len() + 1
    }

    fn ssz_bytes_len(&self) -> usize {
        <Self as Encode>::ssz_fixed_len()
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        self.root.ssz_append(buf);
        buf.push(PARAM_TAG);
    }
}

impl<TH: TweakableHash, const PARAM_TAG: u8> Decode for GeneralizedXmssPublicKey<TH, PARAM_TAG> {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        <TH::Domain as Decode>::ssz_fixed_len() + 1
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let expected_len = <Self as Decode>::ssz_fixed_len();
        if bytes.len() != expected_len {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: expected_len,
            });
        }

        let (root_bytes, tag_bytes) = bytes.split_at(expected_len - 1);
        let root = TH::Domain::from_ssz_bytes(root_bytes)?;
        if tag_bytes[0] != PARAM_TAG {
            return Err(DecodeError::BytesInvalid(format!(
                "parameter tag {:#04x} does not match expected {:#04x}",
                tag_bytes[0], PARAM_TAG
            )));
        }

        Ok(Self { root })
    }
}

impl<TH: TweakableHash, const PARAM_TAG: u8> Serializable
    for GeneralizedXmssPublicKey<TH, PARAM_TAG>
{
    fn to_bytes(&self) -> Vec<u8> {
        // root || parameter tag
        let mut buf = Vec::with_capacity(<Self as Encode>::ssz_fixed_len());
        self.root.ssz_append(&mut buf);
        buf.push(PARAM_TAG);
        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let root_len = <TH::Domain as Decode>::ssz_fixed_len();
        if bytes.len() != root_len + 1 {
            return Err(Error::Deserialization(format!(
                "public key must be {} bytes, got {}",
                root_len + 1,
                bytes.len()
            )));
        }
        check_parameter_tag(PARAM_TAG, bytes[root_len])?;
        let root = TH::Domain::from_ssz_bytes(&bytes[..root_len])?;
        Ok(Self { root })
    }
}

/// The materialised part of the Merkle tree: the top tree over all bottom
/// subtree roots of the activation interval, plus the retained bottom
/// subtrees, consecutive from `first_bottom_tree_index`.
struct PreparedTree<TH: TweakableHash> {
    top_tree: HashSubTree<TH>,
    first_bottom_tree_index: u64,
    bottom_trees: Vec<HashSubTree<TH>>,
}

/// Staged key preparation.
///
/// A key starts `Fresh` when decoded from the minimal wire form and becomes
/// `Prepared` once its subtrees are materialised. Preparation then advances
/// through the activation interval one subtree at a time until it is
/// exhausted.
enum PreparationState<TH: TweakableHash> {
    Fresh,
    Prepared(PreparedTree<TH>),
}

/// Secret key for GeneralizedXmssSignatureScheme.
/// It contains a PRF key, the activation interval, and the preparation
/// state holding the materialised subtrees.
pub struct GeneralizedXmssSecretKey<
    PRF: Pseudorandom,
    IE: IncomparableEncoding,
    TH: TweakableHash,
    const LOG_LIFETIME: usize,
    const PARAM_TAG: u8,
> {
    prf_key: PRF::Key,
    activation_epoch: u64,
    num_active_epochs: u64,
    retention: KeyRetention,
    preparation: PreparationState<TH>,
    _encoding_type: PhantomData<IE>,
}

impl<
    PRF: Pseudorandom,
    IE: IncomparableEncoding,
    TH: TweakableHash,
    const LOG_LIFETIME: usize,
    const PARAM_TAG: u8,
> GeneralizedXmssSecretKey<PRF, IE, TH, LOG_LIFETIME, PARAM_TAG>
{
    /// The parameter set this key was generated under, if the build
    /// recognizes its tag.
    pub fn parameter_set(&self) -> Option<&'static ParameterSet> {
        ParameterSet::from_tag(PARAM_TAG)
    }

    /// The wire tag of the parameter set.
    pub fn parameter_tag(&self) -> u8 {
        PARAM_TAG
    }

    /// The retention policy chosen at key generation (or implied by the
    /// wire form the key was decoded from).
    pub fn retention(&self) -> KeyRetention {
        self.retention
    }
}

/// Helper function to take a desired activation time (given by start and duration)
/// and potentially increase it, so that, for C = 1 << (LOG_LIFETIME/2):
///     1. the new duration is a multiple of C
///     2. the new duration is at least 2 * C
///     3. the new activation time starts at a multiple of C
///     4. the new activation interval is contained in [0, LIFETIME).
///     5. the new interval contains the desired interval.
///
/// The returned result is a pair (start, excl_end) of integers, such that the new
/// activation interval is given by [start * C, excl_end * C).
fn expand_activation_time<const LOG_LIFETIME: usize>(
    desired_activation_epoch: u64,
    desired_num_active_epochs: u64,
) -> (u64, u64) {
    let lifetime = 1u64 << LOG_LIFETIME;
    let c = leafs_per_bottom_tree::<LOG_LIFETIME>();
    // c_mask has the form 1...10...0, with LOG_LIFETIME / 2 many 0's.
    let c_mask = !(c - 1);

    let desired_start = desired_activation_epoch;
    let desired_end = desired_activation_epoch + desired_num_active_epochs;

    // 1. Start by aligning the *start* downward to a multiple of C.
    // we can do that by bitwise and with c_mask.
    let mut start = desired_start & c_mask;

    // 2. Round the *end* upward to a multiple of C.
    // This guarantees the original interval is fully contained.
    let mut end = (desired_end + c - 1) & c_mask;

    // 3. Enforce minimum duration of 2*C.
    if end - start < 2 * c {
        end = start + 2 * c;
    }

    // 4. If the new interval exceeds lifetime, shift it left to fit inside [0, lifetime)
    if end > lifetime {
        let duration = end - start;
        if duration > lifetime {
            // Pathological: expanded interval exceeds lifetime
            start = 0;
            end = lifetime;
        } else {
            end = lifetime;
            start = (lifetime - duration) & c_mask;
        }
    }

    // now divide by c to get what we want
    start >>= LOG_LIFETIME / 2;
    end >>= LOG_LIFETIME / 2;

    (start, end)
}

/// Helper function to compute a bottom tree from the PRF key. The PRF key is used to re-generate
/// the chain heads, then the chains are walked to their ends and hashed to obtain the leafs of
/// the bottom tree. Then the bottom tree is computed.
fn bottom_tree_from_prf_key<PRF, IE, TH, const LOG_LIFETIME: usize>(
    prf_key: &PRF::Key,
    bottom_tree_index: u64,
) -> HashSubTree<TH>
where
    PRF: Pseudorandom,
    IE: IncomparableEncoding,
    TH: TweakableHash,
    PRF::Domain: Into<TH::Domain>,
{
    let leafs = leafs_per_bottom_tree::<LOG_LIFETIME>();
    let num_chains = IE::DIMENSION;
    let chain_length = IE::BASE;

    // the range of epochs covered by that bottom tree
    let epoch_start = bottom_tree_index * leafs;
    let epochs: Vec<u32> = (epoch_start..epoch_start + leafs).map(|e| e as u32).collect();

    // Compute the hashes of all chain ends (= leafs of our tree).
    let leaf_hashes =
        TH::compute_tree_leaves::<PRF>(prf_key, &epochs, num_chains, chain_length);

    HashSubTree::new_bottom_tree(LOG_LIFETIME, bottom_tree_index as usize, leaf_hashes)
}

/// Materialises the initial preparation window for the given range of bottom
/// subtree indices: the first two bottom trees are retained, the roots of all
/// bottom trees go into the top tree.
fn materialise_prepared_tree<PRF, IE, TH, const LOG_LIFETIME: usize>(
    prf_key: &PRF::Key,
    start_bottom_tree_index: u64,
    end_bottom_tree_index: u64,
) -> PreparedTree<TH>
where
    PRF: Pseudorandom,
    IE: IncomparableEncoding,
    TH: TweakableHash,
    PRF::Domain: Into<TH::Domain>,
{
    let num_bottom_trees = (end_bottom_tree_index - start_bottom_tree_index) as usize;
    debug_assert!(num_bottom_trees >= 2);

    // first, we build all bottom trees and keep track of their roots. We
    // treat the first two bottom trees differently, as we want to keep them
    // in our key for signing.
    let mut roots_of_bottom_trees = Vec::with_capacity(num_bottom_trees);

    let left_bottom_tree = bottom_tree_from_prf_key::<PRF, IE, TH, LOG_LIFETIME>(
        prf_key,
        start_bottom_tree_index,
    );
    roots_of_bottom_trees.push(left_bottom_tree.root());

    let right_bottom_tree = bottom_tree_from_prf_key::<PRF, IE, TH, LOG_LIFETIME>(
        prf_key,
        start_bottom_tree_index + 1,
    );
    roots_of_bottom_trees.push(right_bottom_tree.root());

    // the rest of the bottom trees in parallel
    roots_of_bottom_trees.extend(
        (start_bottom_tree_index + 2..end_bottom_tree_index)
            .into_par_iter()
            .map(|bottom_tree_index| {
                bottom_tree_from_prf_key::<PRF, IE, TH, LOG_LIFETIME>(prf_key, bottom_tree_index)
                    .root()
            })
            .collect::<Vec<_>>(), // note: roots are in the correct order.
    );

    // second, we build the top tree, which has the roots of our bottom trees
    // as leafs. the root of it will be the public key.
    let top_tree = HashSubTree::new_top_tree(
        LOG_LIFETIME,
        start_bottom_tree_index as usize,
        roots_of_bottom_trees,
    );

    PreparedTree {
        top_tree,
        first_bottom_tree_index: start_bottom_tree_index,
        bottom_trees: vec![left_bottom_tree, right_bottom_tree],
    }
}

impl<
    PRF: Pseudorandom,
    IE: IncomparableEncoding,
    TH: TweakableHash,
    const LOG_LIFETIME: usize,
    const PARAM_TAG: u8,
> SignatureSchemeSecretKey for GeneralizedXmssSecretKey<PRF, IE, TH, LOG_LIFETIME, PARAM_TAG>
where
    PRF::Domain: Into<TH::Domain>,
{
    fn activation_interval(&self) -> std::ops::Range<u64> {
        let start = self.activation_epoch;
        let end = start + self.num_active_epochs;
        start..end
    }

    fn prepared_interval(&self) -> std::ops::Range<u64> {
        match &self.preparation {
            // not materialised yet: the window is empty
            PreparationState::Fresh => self.activation_epoch..self.activation_epoch,
            PreparationState::Prepared(tree) => {
                let leafs = leafs_per_bottom_tree::<LOG_LIFETIME>();
                let start = tree.first_bottom_tree_index * leafs;
                let end = start + tree.bottom_trees.len() as u64 * leafs;
                start..end
            }
        }
    }

    fn prepare(&mut self) -> Result<(), Error> {
        if matches!(self.preparation, PreparationState::Prepared(_)) {
            return Ok(());
        }

        let leafs = leafs_per_bottom_tree::<LOG_LIFETIME>();
        let start_index = self.activation_epoch / leafs;
        let end_index = (self.activation_epoch + self.num_active_epochs) / leafs;
        let tree = materialise_prepared_tree::<PRF, IE, TH, LOG_LIFETIME>(
            &self.prf_key,
            start_index,
            end_index,
        );
        self.preparation = PreparationState::Prepared(tree);
        Ok(())
    }

    fn advance_preparation(&mut self) -> Result<(), Error> {
        let leafs = leafs_per_bottom_tree::<LOG_LIFETIME>();
        let activation_end = self.activation_epoch + self.num_active_epochs;

        let PreparationState::Prepared(tree) = &mut self.preparation else {
            // advancing a fresh key first materialises the initial window
            return self.prepare();
        };

        // First, check if advancing is possible by comparing to the
        // activation interval.
        let next_index = tree.first_bottom_tree_index + tree.bottom_trees.len() as u64;
        if (next_index + 1) * leafs > activation_end {
            return Err(Error::LifetimeExhausted {
                end: activation_end,
            });
        }

        // Compute the next bottom subtree.
        let new_bottom_tree =
            bottom_tree_from_prf_key::<PRF, IE, TH, LOG_LIFETIME>(&self.prf_key, next_index);

        // Keep or slide, depending on the retention policy. In the sliding
        // case, at any point in time we hold at most three bottom trees (two
        // current, one new) plus the top tree.
        match self.retention {
            KeyRetention::Full => {
                tree.bottom_trees.push(new_bottom_tree);
            }
            KeyRetention::Minimal => {
                tree.bottom_trees.remove(0);
                tree.bottom_trees.push(new_bottom_tree);
                tree.first_bottom_tree_index += 1;
            }
        }

        Ok(())
    }
}

impl<
    PRF: Pseudorandom,
    IE: IncomparableEncoding,
    TH: TweakableHash,
    const LOG_LIFETIME: usize,
    const PARAM_TAG: u8,
> Serializable for GeneralizedXmssSecretKey<PRF, IE, TH, LOG_LIFETIME, PARAM_TAG>
where
    PRF::Domain: Into<TH::Domain>,
{
    fn to_bytes(&self) -> Vec<u8> {
        // prf_key || activation_epoch || num_active_epochs || parameter_tag
        // followed, in the full form, by the packed tree nodes: top tree
        // first, then the retained bottom subtrees in epoch order.
        let mut buf = PRF::key_to_bytes(&self.prf_key);
        buf.extend_from_slice(&self.activation_epoch.to_le_bytes());
        buf.extend_from_slice(&self.num_active_epochs.to_le_bytes());
        buf.push(PARAM_TAG);

        if self.retention == KeyRetention::Full {
            if let PreparationState::Prepared(tree) = &self.preparation {
                tree.top_tree.append_packed_nodes(&mut buf);
                for bottom_tree in &tree.bottom_trees {
                    bottom_tree.append_packed_nodes(&mut buf);
                }
            }
        }

        buf
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let key_len = PRF::KEY_LENGTH;
        let header_len = key_len + 8 + 8 + 1;
        if bytes.len() < header_len {
            return Err(Error::Deserialization(format!(
                "secret key must be at least {header_len} bytes, got {}",
                bytes.len()
            )));
        }

        let prf_key = PRF::key_from_bytes(&bytes[..key_len])
            .ok_or_else(|| Error::Deserialization("malformed PRF key".into()))?;
        let activation_epoch = read_u64(bytes, key_len)?;
        let num_active_epochs = read_u64(bytes, key_len + 8)?;
        check_parameter_tag(PARAM_TAG, bytes[key_len + 16])?;

        // the stored interval is always aligned to bottom subtrees
        let leafs = leafs_per_bottom_tree::<LOG_LIFETIME>();
        let lifetime = 1u64 << LOG_LIFETIME;
        if activation_epoch % leafs != 0
            || num_active_epochs % leafs != 0
            || num_active_epochs < 2 * leafs
            || activation_epoch
                .checked_add(num_active_epochs)
                .is_none_or(|end| end > lifetime)
        {
            return Err(Error::Deserialization(
                "activation interval is not aligned to subtree boundaries".into(),
            ));
        }

        let rest = &bytes[header_len..];
        if rest.is_empty() {
            // minimal form: the preparation window is materialised lazily
            return Ok(Self {
                prf_key,
                activation_epoch,
                num_active_epochs,
                retention: KeyRetention::Minimal,
                preparation: PreparationState::Fresh,
                _encoding_type: PhantomData,
            });
        }

        // full form: reconstruct the packed trees. The number of retained
        // bottom subtrees is implied by the byte count.
        let node_len = <TH::Domain as Decode>::ssz_fixed_len() as u64;
        let start_index = activation_epoch / leafs;
        let num_subtrees_total = num_active_epochs / leafs;

        let top_tree_len = HashSubTree::<TH>::top_tree_node_count(
            LOG_LIFETIME,
            start_index,
            num_subtrees_total,
        ) * node_len;
        let bottom_tree_len = HashSubTree::<TH>::bottom_tree_node_count(LOG_LIFETIME) * node_len;

        let rest_len = rest.len() as u64;
        if rest_len < top_tree_len || (rest_len - top_tree_len) % bottom_tree_len != 0 {
            return Err(Error::Deserialization(
                "packed tree section has the wrong size".into(),
            ));
        }
        let num_retained = (rest_len - top_tree_len) / bottom_tree_len;
        if num_retained < 2 || num_retained > num_subtrees_total {
            return Err(Error::Deserialization(format!(
                "full secret key retains {num_retained} subtrees, expected between 2 and {num_subtrees_total}"
            )));
        }

        let top_tree = HashSubTree::<TH>::top_tree_from_packed(
            LOG_LIFETIME,
            start_index,
            num_subtrees_total,
            &rest[..top_tree_len as usize],
        )?;

        let mut bottom_trees = Vec::with_capacity(num_retained as usize);
        let mut pos = top_tree_len as usize;
        for i in 0..num_retained {
            let chunk = &rest[pos..pos + bottom_tree_len as usize];
            bottom_trees.push(HashSubTree::<TH>::bottom_tree_from_packed(
                LOG_LIFETIME,
                start_index + i,
                chunk,
            )?);
            pos += bottom_tree_len as usize;
        }

        Ok(Self {
            prf_key,
            activation_epoch,
            num_active_epochs,
            retention: KeyRetention::Full,
            preparation: PreparationState::Prepared(PreparedTree {
                top_tree,
                first_bottom_tree_index: start_index,
                bottom_trees,
            }),
            _encoding_type: PhantomData,
        })
    }
}

impl<
    PRF: Pseudorandom,
    IE: IncomparableEncoding + Sync + Send,
    TH: TweakableHash,
    const LOG_LIFETIME: usize,
    const PARAM_TAG: u8,
> SignatureScheme for GeneralizedXmssSignatureScheme<PRF, IE, TH, LOG_LIFETIME, PARAM_TAG>
where
    PRF::Domain: Into<TH::Domain>,
    PRF::Randomness: Into<IE::Randomness>,
    TH::Domain: Into<IE::Binding>,
{
    type PublicKey = GeneralizedXmssPublicKey<TH, PARAM_TAG>;

    type SecretKey = GeneralizedXmssSecretKey<PRF, IE, TH, LOG_LIFETIME, PARAM_TAG>;

    type Signature = GeneralizedXmssSignature<IE, TH, LOG_LIFETIME>;

    const LIFETIME: u64 = 1 << LOG_LIFETIME;

    const PARAMETER_TAG: u8 = PARAM_TAG;

    fn key_gen<R: Rng>(
        rng: &mut R,
        activation_epoch: u64,
        num_active_epochs: u64,
        retention: KeyRetention,
    ) -> Result<(Self::PublicKey, Self::SecretKey), Error> {
        if num_active_epochs == 0
            || activation_epoch
                .checked_add(num_active_epochs)
                .is_none_or(|end| end > Self::LIFETIME)
        {
            return Err(Error::EpochOutOfRange {
                epoch: activation_epoch,
                start: 0,
                end: Self::LIFETIME,
            });
        }

        // Note: this implementation uses the top-bottom tree approach. We
        // envision the full Merkle tree split into one top tree and
        // `sqrt(LIFETIME)` bottom trees. The top tree contains the root and
        // the `LOG_LIFETIME/2` layers below it; each of its existing leaves
        // is the root of a bottom tree with `sqrt(LIFETIME)` leaves. The
        // activation interval is widened so that it aligns with these bottom
        // trees and spans at least two of them.
        //
        // The secret key always stores the full top tree and at least two
        // consecutive bottom trees: those form the prepared window. The
        // advance function computes the next bottom tree and, depending on
        // the retention policy, keeps or drops the oldest one.

        let leafs = leafs_per_bottom_tree::<LOG_LIFETIME>();
        let (start_bottom_tree_index, end_bottom_tree_index) =
            expand_activation_time::<LOG_LIFETIME>(activation_epoch, num_active_epochs);
        let activation_epoch = start_bottom_tree_index * leafs;
        let num_active_epochs = (end_bottom_tree_index - start_bottom_tree_index) * leafs;

        // we need a PRF key to generate our list of actual one-time secret keys
        let prf_key = PRF::key_gen(rng);

        let prepared = materialise_prepared_tree::<PRF, IE, TH, LOG_LIFETIME>(
            &prf_key,
            start_bottom_tree_index,
            end_bottom_tree_index,
        );
        let root = prepared.top_tree.root();

        // assemble public key and secret key
        let pk = GeneralizedXmssPublicKey { root };
        let sk = GeneralizedXmssSecretKey {
            prf_key,
            activation_epoch,
            num_active_epochs,
            retention,
            preparation: PreparationState::Prepared(prepared),
            _encoding_type: PhantomData,
        };

        Ok((pk, sk))
    }

    fn sign(
        sk: &Self::SecretKey,
        epoch: u64,
        message: &[u8; MESSAGE_LENGTH],
    ) -> Result<Self::Signature, Error> {
        // check that epoch is indeed a valid epoch in the activation range
        let activation = sk.activation_interval();
        if !activation.contains(&epoch) {
            return Err(Error::EpochOutOfRange {
                epoch,
                start: activation.start,
                end: activation.end,
            });
        }

        // check that we are already prepared for this epoch
        let window = sk.prepared_interval();
        let tree = match &sk.preparation {
            PreparationState::Prepared(tree) if window.contains(&epoch) => tree,
            _ => {
                return Err(Error::EpochNotPrepared {
                    epoch,
                    start: window.start,
                    end: window.end,
                });
            }
        };

        // first component of the signature is the Merkle path that
        // opens the one-time pk for that epoch, where the one-time pk
        // will be recomputed by the verifier from the signature.
        let leafs = leafs_per_bottom_tree::<LOG_LIFETIME>();
        let bottom_tree_position = (epoch / leafs - tree.first_bottom_tree_index) as usize;
        let bottom_tree = &tree.bottom_trees[bottom_tree_position];
        let path = combined_path(&tree.top_tree, bottom_tree, epoch as u32);

        // the encoding is bound to this key via the Merkle root
        let root = tree.top_tree.root();

        // now, we need to encode our message using the incomparable encoding.
        // we retry until we get a valid codeword, or until we give up.
        // Note: we get the randomness from the PRF, which ensures that
        // signing is deterministic. The PRF is applied to the message and the
        // epoch. While users of the scheme should never sign twice with the
        // same (epoch, sk) pair, this deterministic approach ensures that
        // calling sign twice is fine, as long as the message stays the same.
        let max_tries = IE::MAX_TRIES;
        let mut attempts = 0;
        let mut x = None;
        let mut rho = None;
        while attempts < max_tries {
            let curr_rho: IE::Randomness =
                PRF::get_randomness(&sk.prf_key, epoch as u32, message, attempts as u64).into();
            let curr_x = IE::encode(&root.into(), message, &curr_rho, epoch as u32);

            // check if we have found a valid codeword, and if so, stop searching
            if let Ok(codeword) = curr_x {
                rho = Some(curr_rho);
                x = Some(codeword);
                break;
            }

            attempts += 1;
        }

        // if we have not found a valid codeword, the sampler is exhausted
        let (Some(x), Some(rho)) = (x, rho) else {
            return Err(Error::EncodingRejected {
                attempts: max_tries,
            });
        };

        // we will include rho in the signature, and
        // we use x to determine how far the signer walks in the chains
        let num_chains = IE::DIMENSION;
        assert!(
            x.len() == num_chains,
            "Encoding is broken: returned too many or too few chunks."
        );

        // In parallel, compute the hash values for each chain based on the codeword `x`.
        let hashes = (0..num_chains)
            .into_par_iter()
            .map(|chain_index| {
                // get back to the start of the chain from the PRF
                let start =
                    PRF::get_chain_head(&sk.prf_key, epoch as u32, chain_index as u64).into();
                // now walk the chain for a number of steps determined by the current chunk of x
                let steps = x[chain_index] as usize;
                chain::<TH>(epoch as u32, chain_index as u8, 0, steps, &start)
            })
            .collect();

        // assemble the signature: epoch, randomness, Merkle path, chain elements
        Ok(GeneralizedXmssSignature {
            epoch,
            rho,
            path,
            hashes,
        })
    }

    fn verify(
        pk: &Self::PublicKey,
        epoch: u64,
        message: &[u8; MESSAGE_LENGTH],
        sig: &Self::Signature,
    ) -> Result<bool, Error> {
        if epoch >= Self::LIFETIME {
            return Err(Error::EpochTooLarge {
                epoch,
                lifetime_log2: LOG_LIFETIME,
            });
        }

        // a signature for a different epoch can never be valid
        if sig.epoch != epoch {
            return Ok(false);
        }

        // malformed shapes cannot verify either; canonical decoding already
        // rejects them, but signatures can also be built in memory
        if sig.path.nodes().len() != LOG_LIFETIME || sig.hashes.len() != IE::DIMENSION {
            return Ok(false);
        }

        // first get back the codeword and make sure
        // encoding succeeded with the given randomness.
        let Ok(x) = IE::encode(&pk.root.into(), message, &sig.rho, epoch as u32) else {
            return Ok(false);
        };

        // now, we recompute the epoch's one-time public key
        // from the hashes by walking hash chains.
        let chain_length = IE::BASE;
        let num_chains = IE::DIMENSION;
        assert!(
            x.len() == num_chains,
            "Encoding is broken: returned too many or too few chunks."
        );
        let mut chain_ends = Vec::with_capacity(num_chains);
        for (chain_index, xi) in x.iter().enumerate() {
            // If the signer has already walked x[i] steps, then we need
            // to walk chain_length - 1 - x[i] steps to reach the end of the chain.
            // Note: by our consistency checks, chain_length <= 2^8, so chain_length - 1 fits into u8
            let steps = (chain_length - 1) - *xi as usize;
            let start_pos_in_chain = *xi;
            let start = &sig.hashes[chain_index];
            let end = chain::<TH>(
                epoch as u32,
                chain_index as u8,
                start_pos_in_chain,
                steps,
                start,
            );
            chain_ends.push(end);
        }

        // this set of chain ends should be a leaf in the Merkle tree
        // we verify that by checking the Merkle authentication path
        Ok(hash_tree_verify(
            &pk.root,
            epoch as u32,
            chain_ends.as_slice(),
            &sig.path,
        ))
    }

    #[cfg(test)]
    fn internal_consistency_check() {
        // we check consistency of all internally used components
        // namely, PRF, incomparable encoding, and tweak hash
        PRF::internal_consistency_check();
        IE::internal_consistency_check();
        TH::internal_consistency_check();

        // assert BASE and DIMENSION are small enough to make sure that we can
        // fit pos_in_chain and chain_index in u8.
        assert!(
            IE::BASE <= 1 << 8,
            "Generalized XMSS: Encoding base too large, must be at most 2^8"
        );
        assert!(
            IE::DIMENSION <= 1 << 8,
            "Generalized XMSS: Encoding dimension too large, must be at most 2^8"
        );

        // LOG_LIFETIME needs to be even, so that we can use the top-bottom tree approach
        assert!(
            LOG_LIFETIME % 2 == 0,
            "Generalized XMSS: LOG_LIFETIME must be multiple of two"
        );

        // the wire tag must be registered and must describe this instantiation
        let params = ParameterSet::from_tag(PARAM_TAG)
            .expect("Generalized XMSS: parameter tag must be registered");
        assert_eq!(params.lifetime_log2, LOG_LIFETIME);
        assert_eq!(params.chain_length, IE::BASE);
        assert_eq!(params.num_chains, IE::DIMENSION);
    }
}

/// Instantiations of the generalized XMSS signature scheme based on Poseidon2
pub mod instantiations_poseidon;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::test_templates::{advance_until_prepared, test_signature_scheme_correctness};
    use crate::signature::generalized_xmss::instantiations_poseidon::{
        SigTargetSumLifetime8, SigTargetSumW24Lifetime8, SigWinternitzLifetime8,
    };
    use p3_field::PrimeCharacteristicRing;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    type Sig = SigTargetSumLifetime8;

    #[test]
    fn test_internal_consistency() {
        SigTargetSumLifetime8::internal_consistency_check();
        SigWinternitzLifetime8::internal_consistency_check();
        SigTargetSumW24Lifetime8::internal_consistency_check();
    }

    #[test]
    fn test_target_sum_correctness() {
        test_signature_scheme_correctness::<SigTargetSumLifetime8>(
            11,
            0,
            64,
            KeyRetention::Full,
        );
        test_signature_scheme_correctness::<SigTargetSumLifetime8>(
            19,
            0,
            64,
            KeyRetention::Minimal,
        );
    }

    #[test]
    fn test_winternitz_correctness() {
        test_signature_scheme_correctness::<SigWinternitzLifetime8>(
            2,
            0,
            64,
            KeyRetention::Full,
        );
    }

    #[test]
    fn test_width_24_variant_correctness() {
        test_signature_scheme_correctness::<SigTargetSumW24Lifetime8>(
            7,
            0,
            64,
            KeyRetention::Full,
        );
    }

    #[test]
    fn test_deterministic_signing() {
        // we sign the same (epoch, message) pair twice (which users of this
        // code should not do) and ensure the signatures agree byte for byte.
        let mut rng = rand::rng();
        let (_pk, mut sk) = Sig::key_gen(&mut rng, 0, 64, KeyRetention::Full).unwrap();
        let message = rng.random();
        let epoch = 13;

        advance_until_prepared(&mut sk, epoch);

        let sig1 = Sig::sign(&sk, epoch, &message).unwrap();
        let sig2 = Sig::sign(&sk, epoch, &message).unwrap();
        assert_eq!(sig1.rho, sig2.rho);
        assert_eq!(sig1.to_bytes(), sig2.to_bytes());
    }

    #[test]
    fn test_same_seed_same_keys() {
        // key generation consumes randomness only for the PRF key, so a
        // seeded RNG pins down the whole key pair
        let mut rng1 = StdRng::from_seed([0x42; 32]);
        let mut rng2 = StdRng::from_seed([0x42; 32]);

        let (pk1, sk1) = Sig::key_gen(&mut rng1, 0, 32, KeyRetention::Full).unwrap();
        let (pk2, sk2) = Sig::key_gen(&mut rng2, 0, 32, KeyRetention::Full).unwrap();

        assert_eq!(pk1.to_bytes(), pk2.to_bytes());
        assert_eq!(sk1.to_bytes(), sk2.to_bytes());
    }

    #[test]
    fn test_verify_rejects_wrong_epoch() {
        let mut rng = rand::rng();
        let (pk, mut sk) = Sig::key_gen(&mut rng, 0, 64, KeyRetention::Full).unwrap();
        let message = rng.random();
        let epoch = 5;

        advance_until_prepared(&mut sk, epoch);
        let sig = Sig::sign(&sk, epoch, &message).unwrap();
        assert!(Sig::verify(&pk, epoch, &message, &sig).unwrap());

        // a different in-range epoch must not verify
        assert!(!Sig::verify(&pk, epoch + 1, &message, &sig).unwrap());

        // an out-of-range epoch is a structural error
        assert!(matches!(
            Sig::verify(&pk, 999, &message, &sig),
            Err(Error::EpochTooLarge { epoch: 999, .. })
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_rho() {
        let mut rng = rand::rng();
        let (pk, sk) = Sig::key_gen(&mut rng, 0, 64, KeyRetention::Full).unwrap();
        let message = rng.random();
        let epoch = 29;
        // epoch 29 is inside the initial window of [0, 32)
        let mut sig = Sig::sign(&sk, epoch, &message).unwrap();

        sig.rho_mut()[0] += crate::F::ONE;
        assert!(!Sig::verify(&pk, epoch, &message, &sig).unwrap());
    }

    #[test]
    fn test_verify_rejects_wrong_message() {
        let mut rng = rand::rng();
        let (pk, sk) = Sig::key_gen(&mut rng, 0, 64, KeyRetention::Full).unwrap();
        let message: [u8; MESSAGE_LENGTH] = rng.random();
        let mut other = message;
        other[0] ^= 1;
        let epoch = 3;
        let sig = Sig::sign(&sk, epoch, &message).unwrap();

        assert!(Sig::verify(&pk, epoch, &message, &sig).unwrap());
        assert!(!Sig::verify(&pk, epoch, &other, &sig).unwrap());
    }

    #[test]
    fn test_preparation_windows() {
        let mut rng = rand::rng();

        // full retention: the window start is pinned, the end grows
        let (_pk, mut sk) = Sig::key_gen(&mut rng, 0, 128, KeyRetention::Full).unwrap();
        assert_eq!(sk.prepared_interval(), 0..32);
        sk.advance_preparation().unwrap();
        assert_eq!(sk.prepared_interval(), 0..48);
        sk.advance_preparation().unwrap();
        assert_eq!(sk.prepared_interval(), 0..64);

        // minimal retention: the window slides
        let (_pk, mut sk) = Sig::key_gen(&mut rng, 0, 128, KeyRetention::Minimal).unwrap();
        assert_eq!(sk.prepared_interval(), 0..32);
        sk.advance_preparation().unwrap();
        assert_eq!(sk.prepared_interval(), 16..48);
        sk.advance_preparation().unwrap();
        assert_eq!(sk.prepared_interval(), 32..64);
    }

    #[test]
    fn test_preparation_exhausts() {
        let mut rng = rand::rng();
        let (_pk, mut sk) = Sig::key_gen(&mut rng, 0, 48, KeyRetention::Full).unwrap();
        // activation covers three subtrees, two are prepared initially
        assert_eq!(sk.activation_interval(), 0..48);
        assert_eq!(sk.prepared_interval(), 0..32);
        sk.advance_preparation().unwrap();
        assert_eq!(sk.prepared_interval(), 0..48);
        assert!(matches!(
            sk.advance_preparation(),
            Err(Error::LifetimeExhausted { end: 48 })
        ));
        // the window is unchanged by the failed advancement
        assert_eq!(sk.prepared_interval(), 0..48);
    }

    #[test]
    fn test_sign_requires_preparation() {
        let mut rng = rand::rng();
        let (pk, mut sk) = Sig::key_gen(&mut rng, 0, 128, KeyRetention::Minimal).unwrap();
        let message = rng.random();

        // epoch 100 is active but not prepared yet
        let err = Sig::sign(&sk, 100, &message).unwrap_err();
        assert!(matches!(err, Error::EpochNotPrepared { epoch: 100, .. }));

        advance_until_prepared(&mut sk, 100);
        let sig = Sig::sign(&sk, 100, &message).unwrap();
        assert!(Sig::verify(&pk, 100, &message, &sig).unwrap());

        // an epoch outside the activation interval is a different error
        assert!(matches!(
            Sig::sign(&sk, 200, &message),
            Err(Error::EpochOutOfRange { epoch: 200, .. })
        ));
    }

    #[test]
    fn test_minimal_key_roundtrip_and_lazy_preparation() {
        let mut rng = rand::rng();
        let (pk, sk) = Sig::key_gen(&mut rng, 0, 64, KeyRetention::Minimal).unwrap();
        let message = rng.random();

        let bytes = sk.to_bytes();
        // minimal form: prf key (32) + two u64 + tag
        assert_eq!(bytes.len(), 49);

        let mut decoded = <Sig as SignatureScheme>::SecretKey::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.activation_interval(), sk.activation_interval());
        // decoded key is fresh: empty window until prepared
        assert!(decoded.prepared_interval().is_empty());
        assert!(matches!(
            Sig::sign(&decoded, 0, &message),
            Err(Error::EpochNotPrepared { .. })
        ));

        decoded.prepare().unwrap();
        assert_eq!(decoded.prepared_interval(), 0..32);
        let sig = Sig::sign(&decoded, 0, &message).unwrap();
        assert!(Sig::verify(&pk, 0, &message, &sig).unwrap());
    }

    #[test]
    fn test_full_key_roundtrip() {
        let mut rng = rand::rng();
        let (pk, mut sk) = Sig::key_gen(&mut rng, 0, 64, KeyRetention::Full).unwrap();
        sk.advance_preparation().unwrap();
        let message = rng.random();

        let bytes = sk.to_bytes();
        let decoded = <Sig as SignatureScheme>::SecretKey::from_bytes(&bytes).unwrap();

        // the decoded key signs immediately, with identical output
        assert_eq!(decoded.prepared_interval(), sk.prepared_interval());
        let sig_a = Sig::sign(&sk, 40, &message).unwrap();
        let sig_b = Sig::sign(&decoded, 40, &message).unwrap();
        assert_eq!(sig_a.to_bytes(), sig_b.to_bytes());
        assert!(Sig::verify(&pk, 40, &message, &sig_a).unwrap());

        // re-encoding reproduces the exact bytes
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn test_public_key_roundtrip_and_tag_checks() {
        let mut rng = rand::rng();
        let (pk, _sk) = Sig::key_gen(&mut rng, 0, 32, KeyRetention::Full).unwrap();

        let bytes = pk.to_bytes();
        assert_eq!(bytes.len(), 33);
        assert_eq!(*bytes.last().unwrap(), Sig::PARAMETER_TAG);

        let decoded = <Sig as SignatureScheme>::PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.to_bytes(), bytes);

        // a recognized but different tag is a parameter mismatch
        let mut foreign = bytes.clone();
        *foreign.last_mut().unwrap() = SigWinternitzLifetime8::PARAMETER_TAG;
        assert!(matches!(
            <Sig as SignatureScheme>::PublicKey::from_bytes(&foreign),
            Err(Error::ParameterMismatch { .. })
        ));

        // an unknown tag cannot be decoded at all
        let mut unknown = bytes;
        *unknown.last_mut().unwrap() = 0xee;
        assert!(matches!(
            <Sig as SignatureScheme>::PublicKey::from_bytes(&unknown),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_signature_roundtrip_canonical_and_ssz() {
        let mut rng = rand::rng();
        let (pk, sk) = Sig::key_gen(&mut rng, 0, 32, KeyRetention::Full).unwrap();
        let message = rng.random();
        let epoch = 17;
        let sig = Sig::sign(&sk, epoch, &message).unwrap();

        // canonical bytes: epoch || path_len || path || rho || hashes_len || hashes
        let bytes = sig.to_bytes();
        assert_eq!(read_u64(&bytes, 0).unwrap(), epoch);
        assert_eq!(read_u32(&bytes, 8).unwrap() as usize, 8);
        let decoded = <Sig as SignatureScheme>::Signature::from_bytes(&bytes).unwrap();
        assert!(Sig::verify(&pk, epoch, &message, &decoded).unwrap());
        assert_eq!(decoded.to_bytes(), bytes);

        // SSZ round trip
        let ssz_bytes = sig.as_ssz_bytes();
        assert_eq!(ssz_bytes.len(), sig.ssz_bytes_len());
        let ssz_decoded =
            <Sig as SignatureScheme>::Signature::from_ssz_bytes(&ssz_bytes).unwrap();
        assert!(Sig::verify(&pk, epoch, &message, &ssz_decoded).unwrap());

        // truncated canonical bytes are rejected
        assert!(
            <Sig as SignatureScheme>::Signature::from_bytes(&bytes[..bytes.len() - 1]).is_err()
        );
        // as are trailing bytes
        let mut extended = bytes.clone();
        extended.push(0);
        assert!(<Sig as SignatureScheme>::Signature::from_bytes(&extended).is_err());
    }

    #[test]
    fn test_tampered_signature_bytes_fail() {
        let mut rng = rand::rng();
        let (pk, sk) = Sig::key_gen(&mut rng, 0, 32, KeyRetention::Full).unwrap();
        let message = rng.random();
        let epoch = 23;
        let sig = Sig::sign(&sk, epoch, &message).unwrap();
        let bytes = sig.to_bytes();

        // flip one bit in a handful of positions spread over the encoding;
        // every flip must either fail to decode or fail to verify
        for byte_index in (0..bytes.len()).step_by(37) {
            let mut tampered = bytes.clone();
            tampered[byte_index] ^= 0x01;
            match <Sig as SignatureScheme>::Signature::from_bytes(&tampered) {
                Err(_) => {}
                Ok(decoded) => {
                    assert!(
                        !Sig::verify(&pk, epoch, &message, &decoded).unwrap_or(false),
                        "bit flip at byte {byte_index} still verifies"
                    );
                }
            }
        }
    }

    #[test]
    fn test_ssz_panic_safety_malicious_offsets() {
        // SCENARIO 1: Signature with reversed offsets (non-monotonic)
        //
        // SSZ layout: [epoch (8)] [rho] [offset path (4)] [offset hashes (4)] | ...
        let mut rng = rand::rng();
        let dummy_rho =
            <crate::inc_encoding::target_sum::TargetSumEncoding<
                crate::symmetric::message_hash::poseidon::PoseidonMessageHash<7, 8, 6, 22, 256, 2>,
                2805,
            > as IncomparableEncoding>::rand(&mut rng);
        let rho_size = dummy_rho.ssz_bytes_len();
        let fixed_part_size = 8 + rho_size + 8;

        let mut encoded = vec![0u8; 200];
        // epoch stays zero; write valid rho
        let mut rho_buf = Vec::new();
        dummy_rho.ssz_append(&mut rho_buf);
        encoded[8..8 + rho_size].copy_from_slice(&rho_buf);
        // offset path: correctly points to end of fixed part
        encoded[8 + rho_size..12 + rho_size]
            .copy_from_slice(&(fixed_part_size as u32).to_le_bytes());
        // offset hashes: MALICIOUS, points before offset path
        encoded[12 + rho_size..16 + rho_size].copy_from_slice(&10u32.to_le_bytes());

        let result = <Sig as SignatureScheme>::Signature::from_ssz_bytes(&encoded);
        assert!(matches!(result, Err(DecodeError::BytesInvalid(_))));

        // SCENARIO 2: offset beyond the buffer
        let mut encoded = vec![0u8; 100];
        encoded[8..8 + rho_size].copy_from_slice(&rho_buf);
        encoded[8 + rho_size..12 + rho_size]
            .copy_from_slice(&(fixed_part_size as u32).to_le_bytes());
        encoded[12 + rho_size..16 + rho_size].copy_from_slice(&200u32.to_le_bytes());

        let result = <Sig as SignatureScheme>::Signature::from_ssz_bytes(&encoded);
        assert!(matches!(result, Err(DecodeError::BytesInvalid(_))));
    }

    #[test]
    fn test_secret_key_decode_rejects_malformed() {
        let mut rng = rand::rng();
        let (_pk, sk) = Sig::key_gen(&mut rng, 0, 64, KeyRetention::Full).unwrap();
        let bytes = sk.to_bytes();

        // too short
        assert!(<Sig as SignatureScheme>::SecretKey::from_bytes(&bytes[..48]).is_err());

        // unaligned activation interval
        let mut bad = bytes.clone();
        bad[32..40].copy_from_slice(&3u64.to_le_bytes());
        assert!(<Sig as SignatureScheme>::SecretKey::from_bytes(&bad).is_err());

        // tree section with a size that fits no subtree count
        let mut bad = bytes.clone();
        bad.truncate(bytes.len() - 1);
        assert!(<Sig as SignatureScheme>::SecretKey::from_bytes(&bad).is_err());

        // non-canonical field element inside the tree section
        let mut bad = bytes;
        let last4 = bad.len() - 4;
        bad[last4..].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(<Sig as SignatureScheme>::SecretKey::from_bytes(&bad).is_err());
    }

    #[test]
    fn test_expand_activation_time() {
        const LOG_LIFETIME: usize = 4;

        // no padding needed
        let (start, end_excl) = expand_activation_time::<LOG_LIFETIME>(0, 8);
        assert!((start == 0) && (end_excl == 2));

        // extended to minimum duration of two bottom trees
        let (start, end_excl) = expand_activation_time::<LOG_LIFETIME>(0, 4);
        assert!((start == 0) && (end_excl == 2));

        // simple padding needed
        let (start, end_excl) = expand_activation_time::<LOG_LIFETIME>(0, 7);
        assert!((start == 0) && (end_excl == 2));

        // padding on both sides needed
        let (start, end_excl) = expand_activation_time::<LOG_LIFETIME>(1, 8);
        assert!((start == 0) && (end_excl == 3));

        // padding only in the end needed
        let (start, end_excl) = expand_activation_time::<LOG_LIFETIME>(8, 5);
        assert!((start == 2) && (end_excl == 4));

        // large padding to the left needed because of two bottom trees constraint
        let (start, end_excl) = expand_activation_time::<LOG_LIFETIME>(12, 2);
        assert!((start == 2) && (end_excl == 4));
    }

    #[test]
    fn test_key_gen_rejects_bad_intervals() {
        let mut rng = rand::rng();
        assert!(matches!(
            Sig::key_gen(&mut rng, 0, 0, KeyRetention::Full),
            Err(Error::EpochOutOfRange { .. })
        ));
        assert!(matches!(
            Sig::key_gen(&mut rng, 250, 100, KeyRetention::Full),
            Err(Error::EpochOutOfRange { .. })
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn proptest_expand_activation_time_invariants(
                desired_start in 0u64..256,
                desired_duration in 1u64..256
            ) {
                const LOG_LIFETIME: usize = 8;
                const C: u64 = 1 << (LOG_LIFETIME / 2);
                const LIFETIME: u64 = 1 << LOG_LIFETIME;

                let desired_end = (desired_start + desired_duration).min(LIFETIME);

                let (start, end) = expand_activation_time::<LOG_LIFETIME>(desired_start, desired_duration);

                let actual_start = start * C;
                let actual_end = end * C;

                // check minimum duration of 2 bottom trees
                prop_assert!(end - start >= 2);

                // check result fits within lifetime
                prop_assert!(actual_end <= LIFETIME);

                // check result contains the desired interval
                prop_assert!(actual_start <= desired_start);
                prop_assert!(actual_end >= desired_end);

                // check determinism by calling twice
                let (start2, end2) = expand_activation_time::<LOG_LIFETIME>(desired_start, desired_duration);
                prop_assert_eq!((start, end), (start2, end2));
            }
        }
    }
}
