use serde::{Deserialize, Serialize};
use ssz::{Decode, DecodeError, Encode};

use crate::error::Error;
use crate::symmetric::tweak_hash::TweakableHash;

/// A single layer of a sparse Hash-Tree
/// based on tweakable hash function
#[derive(Clone)]
struct HashTreeLayer<TH: TweakableHash> {
    start_index: u64,
    nodes: Vec<TH::Domain>,
}

impl<TH: TweakableHash> HashTreeLayer<TH> {
    /// Construct a layer from a contiguous run of nodes and pad it so that:
    /// - the layer starts at an even index (a left child), and
    /// - the layer ends at an odd index (a right child).
    ///
    /// Input interpretation:
    /// - `nodes` conceptually occupy tree indices
    ///   `[start_index, start_index + nodes.len() - 1]` (inclusive).
    ///
    /// Padding rules:
    /// - If `start_index` is odd, we insert the placeholder node for the
    ///   previous even index in front.
    /// - If the end index is even, we append the placeholder node for the
    ///   next odd index at the back.
    ///
    /// Why this matters:
    /// - With this alignment every parent is formed from exactly two children,
    ///   so upper layers can be built with exact size-2 chunks, with no edge
    ///   cases. Because the padding nodes are deterministic placeholders, the
    ///   whole tree is a pure function of its real leaves.
    #[inline]
    fn padded(level: u8, nodes: Vec<TH::Domain>, start_index: usize) -> Self {
        // End index of the provided contiguous run (inclusive).
        let end_index = start_index + nodes.len() - 1;

        // Do we need a front pad? Start must be even.
        let needs_front = (start_index & 1) == 1;

        // Do we need a back pad? End must be odd.
        let needs_back = (end_index & 1) == 0;

        // The effective start index after optional front padding (always even).
        let actual_start_index = start_index - (needs_front as usize);

        // Reserve exactly the space we may need: original nodes plus up to two pads.
        let mut out =
            Vec::with_capacity(nodes.len() + (needs_front as usize) + (needs_back as usize));

        // Optional front padding to align to an even start index.
        if needs_front {
            out.push(TH::placeholder(level, actual_start_index as u32));
        }

        // Insert the actual content in order.
        out.extend(nodes);

        // Optional back padding to ensure we end on an odd index.
        if needs_back {
            out.push(TH::placeholder(level, (end_index + 1) as u32));
        }

        // Return the padded layer with the corrected start index.
        Self {
            start_index: actual_start_index as u64,
            nodes: out,
        }
    }
}

/// Alignment padding applied by [`HashTreeLayer::padded`], as pure shape
/// arithmetic: maps `(start_index, len)` of a run to the padded
/// `(start_index, len)`. Used to reconstruct layer boundaries when decoding
/// packed tree nodes.
pub(crate) fn padded_shape(start_index: u64, len: u64) -> (u64, u64) {
    debug_assert!(len >= 1);
    let end_index = start_index + len - 1;
    let front = start_index & 1;
    let back = 1 - (end_index & 1);
    (start_index - front, len + front + back)
}

/// Layer shapes `(start_index, len)`, lowest first, of the subtree that
/// [`HashSubTree::new_subtree`] builds from `count` nodes at `start_index`
/// of layer `lowest_layer`.
pub(crate) fn subtree_layer_shapes(
    lowest_layer: u64,
    depth: u64,
    start_index: u64,
    count: u64,
) -> Vec<(u64, u64)> {
    let mut shapes = Vec::with_capacity((depth - lowest_layer + 1) as usize);
    let (mut start, mut len) = padded_shape(start_index, count);
    shapes.push((start, len));
    for _ in lowest_layer..depth {
        let (s, l) = padded_shape(start >> 1, len / 2);
        start = s;
        len = l;
        shapes.push((start, len));
    }
    shapes
}

/// Sub-tree of a sparse Hash-Tree based on tweakable hashes.
/// We consider hash trees in which each leaf is first
/// hashed individually.
///
/// The tree can be sparse in the following sense:
/// There is a contiguous range of leafs that exist,
/// and the tree is built on top of that. Tree positions outside that range
/// are filled with the deterministic placeholder nodes of
/// [`TweakableHash::placeholder`], so the root still commits to the whole
/// position space and is a pure function of the existing leaves.
///
/// This struct may represent only a subtree of the full tree,
/// which may only contain the top layers of the tree.
#[derive(Clone)]
pub struct HashSubTree<TH: TweakableHash> {
    /// Depth of the full tree. The tree can have at most
    /// 1 << depth many leafs. The full tree has depth + 1
    /// many layers, whereas the sub-tree can have less.
    depth: u64,

    /// The lowest layer of the sub-tree. If this represents the
    /// full tree, then lowest_layer = 0.
    lowest_layer: u64,

    /// Layers of the hash tree, starting with the
    /// lowest_layer. That is, layers[i] contains the nodes
    /// in level i + lowest_layer of the tree. For the full tree
    /// (lowest_layer = 0), the leafs are not included: the
    /// bottom layer is the list of hashes of all leafs
    layers: Vec<HashTreeLayer<TH>>,
}

/// Opening in a hash-tree: a co-path, without the leaf
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(bound = "")]
pub struct HashTreeOpening<TH: TweakableHash> {
    /// The co-path needed to verify.
    /// If the tree has depth h, i.e., 2^h leafs,
    /// the co-path has h entries.
    co_path: Vec<TH::Domain>,
}

impl<TH: TweakableHash> HashTreeOpening<TH> {
    /// The sibling nodes, ordered from the leaf layer up to the root.
    pub fn nodes(&self) -> &[TH::Domain] {
        &self.co_path
    }

    /// Builds an opening from sibling nodes ordered leaf-to-root.
    pub fn from_nodes(co_path: Vec<TH::Domain>) -> Self {
        Self { co_path }
    }
}

impl<TH: TweakableHash> Encode for HashTreeOpening<TH> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn ssz_bytes_len(&self) -> usize {
        // - Fixed part: offset (4 bytes)
        // - Variable part: co_path
        4 + self.co_path.ssz_bytes_len()
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        // SSZ Container encoding order:
        // 1. Offset for variable field: co_path
        // Only the offset itself in fixed part
        let offset: u32 = 4;
        buf.extend_from_slice(&offset.to_le_bytes());

        // 2. Variable data: co_path
        self.co_path.ssz_append(buf);
    }
}

impl<TH: TweakableHash> Decode for HashTreeOpening<TH> {
    fn is_ssz_fixed_len() -> bool {
        false
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        // Minimum size: offset (4 bytes)
        const FIXED_SIZE: usize = 4;
        if bytes.len() < FIXED_SIZE {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: FIXED_SIZE,
            });
        }

        // 1. Read offset for variable field
        let offset = u32::from_le_bytes(bytes[0..4].try_into().map_err(|_| {
            DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: 4,
            }
        })?) as usize;

        // 2. Validate offset points to end of fixed part
        if offset != FIXED_SIZE {
            return Err(DecodeError::InvalidByteLength {
                len: offset,
                expected: FIXED_SIZE,
            });
        }

        // 3. Decode variable field: co_path
        let co_path = Vec::<TH::Domain>::from_ssz_bytes(&bytes[offset..])?;

        Ok(Self { co_path })
    }
}

impl<TH> HashSubTree<TH>
where
    TH: TweakableHash,
{
    /// Function to compute a (sub-tree of a) hash-tree, which contains the top layers
    /// of a hash tree. The function takes the nodes in layer `lowest_layer` as input.
    /// They correspond to the (hashes of) the leafs if `lowest_layer = 0`.
    /// The full tree is assumed to have depth `depth`. Consequently, the full tree
    /// can have at most `1 << depth` many leafs and it has `depth + 1` layers.
    ///
    /// For the sub-tree that is generated, the number of `lowest_layer_nodes` cannot
    /// be more than `1 << (depth - lowest_layer)`.
    ///
    /// The lowest_layer nodes start at the given start index, namely, the nodes that
    /// exist in this layer are `start, start + 1, ... start + nodes.len() - 1`
    ///
    /// Caller must ensure that there is enough space for the nodes, i.e.,
    /// `start_index + lowest_layer_nodes.len() <= 1 << (depth - lowest_layer)`
    ///
    /// Important: if this is used for the full tree (lowest_layer = 0), the leafs are
    /// expected to already be hashes. This is in contrast to hash_tree_verify.
    pub fn new_subtree(
        lowest_layer: usize,
        depth: usize,
        start_index: usize,
        lowest_layer_nodes: Vec<TH::Domain>,
    ) -> Self {
        assert!(
            lowest_layer < depth,
            "Hash-Tree new: lowest_layer exceeds depth. Ensure that it is between 0 and depth - 1."
        );

        assert!(
            start_index + lowest_layer_nodes.len() <= 1 << (depth - lowest_layer),
            "Hash-Tree new: Not enough space for lowest layer nodes. Consider changing start_index or number of lowest layer nodes."
        );

        // we build the tree from the lowest layer to the root,
        // while building the tree, we ensure that the following two invariants hold via appropriate padding:
        // 1. the layer starts at an even index, i.e., a left child
        // 2. the layer ends at an odd index, i.e., a right child
        // In this way, we can ensure that we can always hash two siblings to get their parent.
        // The padding nodes are the deterministic placeholders for the padded positions.

        let mut layers = Vec::with_capacity(depth + 1 - lowest_layer);

        // start with the lowest layer, padded accordingly
        layers.push(HashTreeLayer::padded(
            lowest_layer as u8,
            lowest_layer_nodes,
            start_index,
        ));

        // now, build the tree layer by layer
        for level in lowest_layer..depth {
            // Previous layer (already padded so len is even and start_index is even)
            let prev = &layers[level - lowest_layer];

            // Parent layer starts at half the previous start index
            let parent_start = (prev.start_index >> 1) as usize;

            // Compute all parents in parallel, pairing children two-by-two
            //
            // We do exact chunks of two children, no remainder.
            let parents =
                TH::compute_tree_layer(level as u8 + 1, parent_start, &prev.nodes);

            // Add the new layer with padding so next iteration also has even start and length
            layers.push(HashTreeLayer::padded(level as u8 + 1, parents, parent_start));
        }

        Self {
            depth: depth as u64,
            lowest_layer: lowest_layer as u64,
            layers,
        }
    }

    /// Function to compute a top sub-tree of a tree of even depth.
    /// The top tree contains only the top layers, starting with layer
    /// depth / 2, and ending with the root of the full tree at layer depth.
    ///
    /// It takes as input the roots of all bottom trees that exist. Note that these are
    /// exactly the nodes in layer depth / 2. The `start_index` indicates which bottom tree
    /// is the first that is given. It must be in [0, 2^{depth/2}).
    pub fn new_top_tree(
        depth: usize,
        start_index: usize,
        roots_of_bottom_trees: Vec<TH::Domain>,
    ) -> Self {
        assert!(
            depth % 2 == 0,
            "Hash-Tree new top tree: Depth must be even."
        );

        // the top tree is just the sub-tree that starts at layer depth / 2, and contains
        // the roots of the bottom trees in the lowest layer.
        let lowest_layer = depth / 2;
        Self::new_subtree(lowest_layer, depth, start_index, roots_of_bottom_trees)
    }

    /// Function to compute a bottom sub-tree of a tree of even depth.
    /// This is a tree containing 2^{depth/2} leafs, which are at positions
    /// bottom_tree_index * 2^{depth/2}, ... (bottom_tree_index + 1) * 2^{depth/2} - 1
    pub fn new_bottom_tree(
        depth: usize,
        bottom_tree_index: usize,
        leafs: Vec<TH::Domain>,
    ) -> Self {
        assert!(
            depth > 2 && depth % 2 == 0,
            "Hash-Tree new bottom tree: Depth must be even and more than 2."
        );

        assert!(
            leafs.len() == 1 << (depth / 2),
            "Hash-Tree new bottom tree: Bottom trees must be full, not sparse."
        );

        // we first compute the bottom tree as if it was a sparse tree, i.e.,
        // as if we were to compute the full tree but only this bottom tree part was filled.
        let leafs_per_bottom_tree = 1 << (depth / 2);
        let lowest_layer = 0;
        let start_index = bottom_tree_index * leafs_per_bottom_tree;
        let mut bottom_tree = Self::new_subtree(lowest_layer, depth, start_index, leafs);

        // The layers above depth/2 mix in placeholder siblings of other bottom
        // trees, which do not exist in the combined tree. We drop them and keep
        // the bottom tree's root alone in its top layer so that the root()
        // function works.
        let bottom_tree_root = bottom_tree.layers[depth / 2].nodes[bottom_tree_index % 2];
        bottom_tree.layers.truncate(depth / 2);
        bottom_tree.layers.push(HashTreeLayer {
            start_index: bottom_tree_index as u64,
            nodes: vec![bottom_tree_root],
        });

        bottom_tree
    }

    /// Function to get a sub-tree root from a sub-tree.
    /// The tree must have at least one layer.
    #[must_use]
    pub fn root(&self) -> TH::Domain {
        self.layers
            .last()
            .expect("Hash-Tree must have at least one layer")
            .nodes[0]
    }

    /// Function to compute the Merkle authentication path
    /// from a sub-tree and the position of the node in the lowest layer.
    /// It is assumed that the tree is well-formed, i.e., each layer is half
    /// the size of the previous layer, and the final layer has size 1.
    #[must_use]
    pub fn path(&self, position: u32) -> HashTreeOpening<TH> {
        assert!(
            !self.layers.is_empty(),
            "Hash-Tree path: Need at least one layer"
        );
        assert!(
            (position as u64) >= self.layers[0].start_index,
            "Hash-Tree path: Invalid position, position before start index"
        );
        assert!(
            (position as u64) < self.layers[0].start_index + self.layers[0].nodes.len() as u64,
            "Hash-Tree path: Invalid position, position too large"
        );

        // in our co-path, we will have one node per layer
        // except the final layer (which is just the root)
        let mut co_path = Vec::with_capacity(self.depth as usize);
        let mut current_position = position;
        for l in 0..((self.depth - self.lowest_layer) as usize) {
            // if we are already at the root, we can stop (this is a special case for bottom trees)
            if self.layers[l].nodes.len() <= 1 {
                break;
            }
            // position of the sibling that we want to include
            let sibling_position = current_position ^ 0x01;
            let sibling_position_in_vec =
                (sibling_position as u64 - self.layers[l].start_index) as usize;
            let sibling = self.layers[l].nodes[sibling_position_in_vec];
            co_path.push(sibling);
            // new position in next layer
            current_position >>= 1;
        }

        HashTreeOpening { co_path }
    }

    /// Appends every node of the tree, layer by layer from the lowest, in
    /// index order, in canonical byte form. The layer boundaries are not
    /// written: they are recomputable shape arithmetic (see
    /// [`subtree_layer_shapes`]), which keeps the packed form free of framing.
    pub(crate) fn append_packed_nodes(&self, buf: &mut Vec<u8>) {
        for layer in &self.layers {
            for node in &layer.nodes {
                node.ssz_append(buf);
            }
        }
    }

    /// Total number of nodes held by this subtree, padding included.
    pub(crate) fn packed_node_count(&self) -> u64 {
        self.layers.iter().map(|l| l.nodes.len() as u64).sum()
    }

    /// Reconstructs a top tree from packed nodes, given the shape parameters
    /// it was built with.
    pub(crate) fn top_tree_from_packed(
        depth: usize,
        start_index: u64,
        count: u64,
        bytes: &[u8],
    ) -> Result<Self, Error> {
        let lowest_layer = (depth / 2) as u64;
        let shapes = subtree_layer_shapes(lowest_layer, depth as u64, start_index, count);
        let mut layers = Vec::with_capacity(shapes.len());
        let mut consumed = 0usize;
        let node_len = <TH::Domain as Decode>::ssz_fixed_len();
        for (layer_start, layer_len) in shapes {
            let mut nodes = Vec::with_capacity(layer_len as usize);
            for _ in 0..layer_len {
                let end = consumed + node_len;
                if end > bytes.len() {
                    return Err(Error::Deserialization(
                        "truncated packed tree nodes".into(),
                    ));
                }
                nodes.push(TH::Domain::from_ssz_bytes(&bytes[consumed..end])?);
                consumed = end;
            }
            layers.push(HashTreeLayer {
                start_index: layer_start,
                nodes,
            });
        }
        if consumed != bytes.len() {
            return Err(Error::Deserialization(
                "trailing bytes after packed tree nodes".into(),
            ));
        }
        Ok(Self {
            depth: depth as u64,
            lowest_layer,
            layers,
        })
    }

    /// Reconstructs a bottom tree from packed nodes.
    pub(crate) fn bottom_tree_from_packed(
        depth: usize,
        bottom_tree_index: u64,
        bytes: &[u8],
    ) -> Result<Self, Error> {
        let leafs_per_bottom_tree = 1u64 << (depth / 2);
        let node_len = <TH::Domain as Decode>::ssz_fixed_len();
        let mut layers = Vec::with_capacity(depth / 2 + 1);
        let mut consumed = 0usize;
        let mut layer_len = leafs_per_bottom_tree;
        for level in 0..(depth / 2) {
            let layer_start = (bottom_tree_index * leafs_per_bottom_tree) >> level;
            let mut nodes = Vec::with_capacity(layer_len as usize);
            for _ in 0..layer_len {
                let end = consumed + node_len;
                if end > bytes.len() {
                    return Err(Error::Deserialization(
                        "truncated packed tree nodes".into(),
                    ));
                }
                nodes.push(TH::Domain::from_ssz_bytes(&bytes[consumed..end])?);
                consumed = end;
            }
            layers.push(HashTreeLayer {
                start_index: layer_start,
                nodes,
            });
            layer_len /= 2;
        }
        // the root layer holds a single node
        if consumed + node_len != bytes.len() {
            return Err(Error::Deserialization(
                "packed bottom tree has the wrong size".into(),
            ));
        }
        let root = TH::Domain::from_ssz_bytes(&bytes[consumed..])?;
        layers.push(HashTreeLayer {
            start_index: bottom_tree_index,
            nodes: vec![root],
        });
        Ok(Self {
            depth: depth as u64,
            lowest_layer: 0,
            layers,
        })
    }

    /// Number of nodes a packed bottom tree of this depth holds.
    pub(crate) fn bottom_tree_node_count(depth: usize) -> u64 {
        // W + W/2 + ... + 2, plus the root layer
        2 * (1u64 << (depth / 2)) - 1
    }

    /// Number of nodes a packed top tree with `count` bottom roots holds.
    pub(crate) fn top_tree_node_count(depth: usize, start_index: u64, count: u64) -> u64 {
        subtree_layer_shapes((depth / 2) as u64, depth as u64, start_index, count)
            .iter()
            .map(|(_, len)| len)
            .sum()
    }
}

/// Function to compute a Merkle authentication path from a tree that is
/// split into a top tree and bottom trees.
#[must_use]
pub fn combined_path<TH: TweakableHash>(
    top_tree: &HashSubTree<TH>,
    bottom_tree: &HashSubTree<TH>,
    position: u32,
) -> HashTreeOpening<TH> {
    assert!(
        bottom_tree.depth == top_tree.depth,
        "Hash-Tree combined path: Bottom tree and top tree must have the same depth."
    );

    assert!(
        bottom_tree.depth % 2 == 0,
        "Hash-Tree combined path: Tree depth must be even."
    );
    let depth = bottom_tree.depth;
    assert!(
        bottom_tree.layers[0].start_index % (1 << (depth / 2)) == 0,
        "Hash-Tree combined path: Bottom tree start index must be multiple of 1 << depth/2."
    );
    let bottom_tree_index = bottom_tree.layers[0].start_index / (1 << (depth / 2));

    // Note: other asserts are in path.

    // First, we compute the path within the bottom tree. It ends at the
    // bottom tree's root.
    let bottom_opening = bottom_tree.path(position);

    // Now, we compute the path for the top tree. Intuitively, this authenticates
    // the root of the bottom tree.
    let top_opening = top_tree.path(bottom_tree_index as u32);

    // Finally, we combine them.
    let co_path = [bottom_opening.co_path, top_opening.co_path].concat();

    HashTreeOpening { co_path }
}

/// Function to verify a Merkle authentication path
/// with respect to a root, a position, and a leaf.
///
/// Note: this function expects the leaf to be a list of hashes,
/// whereas `new_subtree` expects each leaf to be a single hash,
/// which should be the hash of this list of hashes.
pub fn hash_tree_verify<TH: TweakableHash>(
    root: &TH::Domain,
    position: u32,
    leaf: &[TH::Domain],
    opening: &HashTreeOpening<TH>,
) -> bool {
    // given the length of the path, we know how
    // large the tree was. So we can check if the
    // position makes sense.
    let depth = opening.co_path.len();
    let num_leafs: u64 = 1 << depth;

    assert!(
        depth <= 32,
        "Hash-Tree verify: Tree depth must be at most 32"
    );

    assert!(
        (position as u64) < num_leafs,
        "Hash-Tree verify: Position and Path Length not compatible"
    );

    // first hash the leaf to get the node in the bottom layer
    let tweak = TH::tree_tweak(0, position);
    let mut current_node = TH::apply(&tweak, leaf);

    // now reconstruct the root using the co-path
    let mut current_position = position;
    for l in 0..depth {
        // Need to distinguish two cases, depending on
        // if current is a left child or a right child
        let children = if current_position % 2 == 0 {
            // left child, so co-path contains the right sibling
            [current_node, opening.co_path[l]]
        } else {
            // right child, so co-path contains the left sibling
            [opening.co_path[l], current_node]
        };

        // determine new position, which is position of the parent
        current_position >>= 1;

        // now hash to get the parent
        let tweak = TH::tree_tweak((l + 1) as u8, current_position);
        current_node = TH::apply(&tweak, &children);
    }

    // Finally, check that recomputed root matches given root
    current_node == *root
}
