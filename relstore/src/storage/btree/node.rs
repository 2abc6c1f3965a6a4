//! B-tree node types and their block layouts.
//!
//! Every node occupies exactly one block and is stored as a sequence of
//! records:
//! - Stat node (block 0): `root_block_id`, `height`
//! - Interior node: `first`, then one `(boundary_key, child_pointer)` pair
//!   per boundary
//! - Leaf node: one `(value, key)` pair per entry in ascending key order,
//!   then a trailing `next_leaf` record (0 if this is the rightmost leaf)
//!
//! Interior and leaf blocks share the same record-count parity, so a node's
//! kind is never read from the block: callers pick it from the tree height.

use crate::storage::block::{BLOCK_SIZE, Block, BlockError, HEADER_SIZE, SLOT_SIZE};
use crate::storage::btree::codec::{
    BLOCK_ID_SIZE, EncodingError, LeafCodec, marshal_block_id, marshal_key, unmarshal_block_id,
    unmarshal_key,
};
use crate::storage::io::{BlockStore, StorageError};
use crate::types::{BlockId, DataType, KeyValue};

/// Block id of the stat node in every tree.
pub const STAT_BLOCK_ID: BlockId = 0;

/// `next_leaf` value of the rightmost leaf.
pub const NO_NEXT_LEAF: BlockId = 0;

/// Bytes a node's entries may use, slots included, once its `first` or
/// `next_leaf` record is in place.
const NODE_CAPACITY: usize = BLOCK_SIZE - HEADER_SIZE - SLOT_SIZE - BLOCK_ID_SIZE;

/// Largest combined key and value size of a single entry.
///
/// Any entry or boundary pair takes at most half of `NODE_CAPACITY`, so an
/// overfull node always has a split point where both halves fit.
pub const MAX_ENTRY_SIZE: usize = NODE_CAPACITY / 2 - 2 * SLOT_SIZE - BLOCK_ID_SIZE;

/// Result of an insert that split a node.
///
/// The caller one level up inserts `(boundary, sibling)` into its own node,
/// or grows the tree when the split node was the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub sibling: BlockId,
    pub boundary: KeyValue,
}

/// Outcome of a leaf insert attempt.
#[derive(Debug)]
pub enum LeafInsert<V> {
    /// The entry fit and the leaf was saved.
    Saved,
    /// The leaf is full; the entry is handed back for `LeafNode::split`.
    NeedsSplit { key: KeyValue, value: V },
}

/// A loaded tree node.
#[derive(Debug, Clone)]
pub enum Node<V> {
    Interior(InteriorNode),
    Leaf(LeafNode<V>),
}

impl<V> Node<V> {
    #[must_use]
    pub const fn id(&self) -> BlockId {
        match self {
            Self::Interior(node) => node.id(),
            Self::Leaf(node) => node.id(),
        }
    }
}

/// Pack records into a fresh block, or `None` if they do not all fit.
fn pack(block_id: BlockId, records: &[Vec<u8>]) -> Option<Block> {
    let mut block = Block::new(block_id);
    for record in records {
        block.add(record).ok()?;
    }
    Some(block)
}

/// Where to cut entries of the given stored sizes into `..at` and `at..` so
/// that both parts fit a node, with the byte counts as even as possible.
fn leaf_split_point(sizes: &[usize]) -> Option<usize> {
    let total: usize = sizes.iter().sum();
    let mut left = 0;
    let mut best: Option<(usize, usize)> = None;
    for (i, size) in sizes.iter().enumerate().take(sizes.len().saturating_sub(1)) {
        left += size;
        let right = total - left;
        if left <= NODE_CAPACITY && right <= NODE_CAPACITY {
            let gap = left.abs_diff(right);
            if best.is_none_or(|(_, best_gap)| gap < best_gap) {
                best = Some((i + 1, gap));
            }
        }
    }
    best.map(|(at, _)| at)
}

/// Which boundary pair to promote so that the pairs before it and the pairs
/// after it both fit a node, with the byte counts as even as possible.
fn interior_split_point(sizes: &[usize]) -> Option<usize> {
    let total: usize = sizes.iter().sum();
    let mut left = 0;
    let mut best: Option<(usize, usize)> = None;
    for (i, size) in sizes.iter().enumerate() {
        let right = total - left - size;
        if left <= NODE_CAPACITY && right <= NODE_CAPACITY {
            let gap = left.abs_diff(right);
            if best.is_none_or(|(_, best_gap)| gap < best_gap) {
                best = Some((i, gap));
            }
        }
        left += size;
    }
    best.map(|(at, _)| at)
}

/// Read every live record of a block, in record-id order.
fn unpack(block: &Block) -> Result<Vec<&[u8]>, NodeError> {
    block
        .record_ids()
        .into_iter()
        .map(|id| block.get(id).map_err(NodeError::from))
        .collect()
}

// ============================================================================
// Stat node
// ============================================================================

/// Tree-wide metadata: where the root lives and how tall the tree is.
///
/// The stat node never persists itself; callers `save` after every change.
#[derive(Debug, Clone)]
pub struct StatNode {
    block: Block,
    root_id: BlockId,
    height: u32,
}

impl StatNode {
    /// Initialize the stat node of a new tree in `block`, which must be the
    /// tree's first block.
    pub fn create<S: BlockStore>(
        store: &mut S,
        block: Block,
        root_id: BlockId,
    ) -> Result<Self, NodeError> {
        if block.id() != STAT_BLOCK_ID {
            return Err(NodeError::Structural(format!(
                "stat node must live in block {STAT_BLOCK_ID}, got block {}",
                block.id()
            )));
        }
        let mut stat = Self {
            block,
            root_id,
            height: 1,
        };
        stat.save(store)?;
        Ok(stat)
    }

    /// Load the stat node of an existing tree.
    pub fn load<S: BlockStore>(store: &mut S) -> Result<Self, NodeError> {
        let block = store.read_block(STAT_BLOCK_ID)?;
        let (root_id, height) = {
            let records = unpack(&block)?;
            let [root, height] = records.as_slice() else {
                return Err(NodeError::Structural(format!(
                    "stat block holds {} records, expected 2",
                    records.len()
                )));
            };
            (unmarshal_block_id(root)?, unmarshal_block_id(height)?)
        };
        if height == 0 {
            return Err(NodeError::Structural("stat block records height 0".into()));
        }

        Ok(Self {
            root_id,
            height,
            block,
        })
    }

    /// Persist root id and height. The first save appends both records,
    /// later saves overwrite them in place.
    pub fn save<S: BlockStore>(&mut self, store: &mut S) -> Result<(), NodeError> {
        let root = marshal_block_id(self.root_id);
        let height = marshal_block_id(self.height);

        if self.block.record_count() == 0 {
            self.block.add(&root)?;
            self.block.add(&height)?;
        } else {
            self.block.put(1, &root)?;
            self.block.put(2, &height)?;
        }
        store.write_block(&self.block)?;
        Ok(())
    }

    #[must_use]
    pub const fn root_id(&self) -> BlockId {
        self.root_id
    }

    pub const fn set_root_id(&mut self, root_id: BlockId) {
        self.root_id = root_id;
    }

    /// Tree height; 1 means the root is a leaf.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn set_height(&mut self, height: u32) {
        self.height = height;
    }
}

// ============================================================================
// Interior node
// ============================================================================

/// An interior node.
///
/// `first` leads to keys below `boundaries[0]`; `pointers[i]` leads to keys
/// `k` with `boundaries[i] <= k < boundaries[i + 1]`.
#[derive(Debug, Clone)]
pub struct InteriorNode {
    id: BlockId,
    first: BlockId,
    boundaries: Vec<KeyValue>,
    pointers: Vec<BlockId>,
}

impl InteriorNode {
    /// Allocate a new interior node whose only child is `first`.
    ///
    /// The node is not saved until its first `insert` or `save`.
    pub fn create<S: BlockStore>(store: &mut S, first: BlockId) -> Result<Self, NodeError> {
        let block = store.allocate_block()?;
        Ok(Self {
            id: block.id(),
            first,
            boundaries: Vec::new(),
            pointers: Vec::new(),
        })
    }

    /// Load an interior node.
    pub fn load<S: BlockStore>(
        store: &mut S,
        block_id: BlockId,
        profile: &[DataType],
    ) -> Result<Self, NodeError> {
        let block = store.read_block(block_id)?;
        let records = unpack(&block)?;

        let Some((first, pairs)) = records.split_first() else {
            return Err(NodeError::Structural(format!(
                "interior node {block_id} is empty"
            )));
        };
        if pairs.len() % 2 != 0 {
            return Err(NodeError::Structural(format!(
                "interior node {block_id} has an unpaired boundary"
            )));
        }

        let mut node = Self {
            id: block_id,
            first: unmarshal_block_id(first)?,
            boundaries: Vec::with_capacity(pairs.len() / 2),
            pointers: Vec::with_capacity(pairs.len() / 2),
        };
        for pair in pairs.chunks_exact(2) {
            node.boundaries.push(unmarshal_key(pair[0], profile)?);
            node.pointers.push(unmarshal_block_id(pair[1])?);
        }
        Ok(node)
    }

    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub const fn first(&self) -> BlockId {
        self.first
    }

    #[must_use]
    pub fn boundaries(&self) -> &[KeyValue] {
        &self.boundaries
    }

    #[must_use]
    pub fn pointers(&self) -> &[BlockId] {
        &self.pointers
    }

    /// Child whose subtree would contain `key`.
    ///
    /// With no key this is the leftmost child. Keys equal to a boundary go to
    /// the right of it.
    #[must_use]
    pub fn find(&self, key: Option<&KeyValue>) -> BlockId {
        let Some(key) = key else {
            return self.first;
        };
        match self.boundaries.partition_point(|b| b <= key) {
            0 => self.first,
            i => self.pointers[i - 1],
        }
    }

    /// Insert a boundary and the child to its right, saving the node.
    ///
    /// If the node no longer fits its block it is split and the promoted
    /// boundary is returned with the new sibling's id. On error the node is
    /// left as it was.
    pub fn insert<S: BlockStore>(
        &mut self,
        store: &mut S,
        profile: &[DataType],
        boundary: KeyValue,
        pointer: BlockId,
    ) -> Result<Option<Split>, NodeError> {
        let at = self.boundaries.partition_point(|b| b < &boundary);
        if self.boundaries.get(at) == Some(&boundary) {
            return Err(NodeError::Structural(format!(
                "interior node {} already has boundary {boundary}",
                self.id
            )));
        }
        let mut grown = self.clone();
        grown.boundaries.insert(at, boundary);
        grown.pointers.insert(at, pointer);

        if let Some(block) = pack(grown.id, &grown.records(profile)?) {
            store.write_block(&block)?;
            *self = grown;
            return Ok(None);
        }
        self.split(store, profile, grown).map(Some)
    }

    /// Replace this node with the lower part of `grown` and move the upper
    /// part into a new sibling, promoting the boundary between them.
    ///
    /// The promoted boundary is picked by stored size, not by count.
    fn split<S: BlockStore>(
        &mut self,
        store: &mut S,
        profile: &[DataType],
        grown: Self,
    ) -> Result<Split, NodeError> {
        let sizes = grown
            .boundaries
            .iter()
            .map(|b| -> Result<usize, EncodingError> {
                Ok(marshal_key(b, profile)?.len() + BLOCK_ID_SIZE + 2 * SLOT_SIZE)
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;
        let mid = interior_split_point(&sizes).ok_or(NodeError::Overfull { block_id: self.id })?;

        let Self {
            id,
            first,
            mut boundaries,
            mut pointers,
        } = grown;
        let mut upper_boundaries = boundaries.split_off(mid);
        let mut upper_pointers = pointers.split_off(mid);
        let promoted = upper_boundaries.remove(0);
        let sibling_first = upper_pointers.remove(0);

        let mut sibling = Self::create(store, sibling_first)?;
        sibling.boundaries = upper_boundaries;
        sibling.pointers = upper_pointers;
        let lower = Self {
            id,
            first,
            boundaries,
            pointers,
        };

        sibling.save(store, profile)?;
        lower.save(store, profile)?;
        *self = lower;

        tracing::debug!(
            node = self.id,
            sibling = sibling.id,
            boundary = %promoted,
            "Split interior node"
        );
        Ok(Split {
            sibling: sibling.id,
            boundary: promoted,
        })
    }

    /// Rewrite the node's block from scratch.
    pub fn save<S: BlockStore>(
        &self,
        store: &mut S,
        profile: &[DataType],
    ) -> Result<(), NodeError> {
        let block = pack(self.id, &self.records(profile)?)
            .ok_or(NodeError::Overfull { block_id: self.id })?;
        store.write_block(&block)?;
        Ok(())
    }

    fn records(&self, profile: &[DataType]) -> Result<Vec<Vec<u8>>, EncodingError> {
        let mut records = Vec::with_capacity(1 + 2 * self.boundaries.len());
        records.push(marshal_block_id(self.first).to_vec());
        for (boundary, pointer) in self.boundaries.iter().zip(&self.pointers) {
            records.push(marshal_key(boundary, profile)?);
            records.push(marshal_block_id(*pointer).to_vec());
        }
        Ok(records)
    }
}

// ============================================================================
// Leaf node
// ============================================================================

/// A key and its value in a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry<V> {
    pub key: KeyValue,
    pub value: V,
}

/// A leaf node: sorted unique entries plus the link to the next leaf.
#[derive(Debug, Clone)]
pub struct LeafNode<V> {
    id: BlockId,
    entries: Vec<LeafEntry<V>>,
    next_leaf: BlockId,
}

impl<V> LeafNode<V> {
    /// Allocate a new, empty leaf. It is not saved until `insert`, `split`
    /// or `save`.
    pub fn create<S: BlockStore>(store: &mut S) -> Result<Self, NodeError> {
        let block = store.allocate_block()?;
        Ok(Self {
            id: block.id(),
            entries: Vec::new(),
            next_leaf: NO_NEXT_LEAF,
        })
    }

    /// Load a leaf node.
    pub fn load<S, C>(
        store: &mut S,
        block_id: BlockId,
        profile: &[DataType],
        codec: &C,
    ) -> Result<Self, NodeError>
    where
        S: BlockStore,
        C: LeafCodec<Value = V>,
    {
        let block = store.read_block(block_id)?;
        let records = unpack(&block)?;

        let Some((next_leaf, pairs)) = records.split_last() else {
            return Err(NodeError::Structural(format!(
                "leaf node {block_id} has no next-leaf record"
            )));
        };
        if pairs.len() % 2 != 0 {
            return Err(NodeError::Structural(format!(
                "leaf node {block_id} has an unpaired entry"
            )));
        }

        let entries = pairs
            .chunks_exact(2)
            .map(|pair| -> Result<LeafEntry<V>, EncodingError> {
                Ok(LeafEntry {
                    value: codec.unmarshal_value(pair[0])?,
                    key: unmarshal_key(pair[1], profile)?,
                })
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;

        Ok(Self {
            id: block_id,
            entries,
            next_leaf: unmarshal_block_id(next_leaf)?,
        })
    }

    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub const fn next_leaf(&self) -> BlockId {
        self.next_leaf
    }

    /// Entries in ascending key order.
    #[must_use]
    pub fn entries(&self) -> &[LeafEntry<V>] {
        &self.entries
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len() is not const-stable
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::is_empty() is not const-stable
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_index(&self, key: &KeyValue) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.cmp(key))
    }

    /// Get the value stored under `key`.
    pub fn find_eq(&self, key: &KeyValue) -> Result<&V, NodeError> {
        self.find_index(key)
            .map(|i| &self.entries[i].value)
            .map_err(|_| NodeError::KeyNotFound(key.clone()))
    }

    /// Insert a new entry and save the leaf.
    ///
    /// If the leaf would overflow, it is left unchanged and the entry is
    /// handed back in `LeafInsert::NeedsSplit`.
    pub fn insert<S, C>(
        &mut self,
        store: &mut S,
        profile: &[DataType],
        codec: &C,
        key: KeyValue,
        value: V,
    ) -> Result<LeafInsert<V>, NodeError>
    where
        S: BlockStore,
        C: LeafCodec<Value = V>,
    {
        let Err(at) = self.find_index(&key) else {
            return Err(NodeError::DuplicateKey(key));
        };

        let size = marshal_key(&key, profile)?.len() + codec.marshal_value(&value)?.len();
        if size > MAX_ENTRY_SIZE {
            return Err(NodeError::Encoding(EncodingError::RecordTooLarge {
                size,
                max: MAX_ENTRY_SIZE,
            }));
        }

        self.entries.insert(at, LeafEntry { key, value });
        if let Some(block) = pack(self.id, &self.records(profile, codec)?) {
            store.write_block(&block)?;
            return Ok(LeafInsert::Saved);
        }

        let LeafEntry { key, value } = self.entries.remove(at);
        Ok(LeafInsert::NeedsSplit { key, value })
    }

    /// Remove the entry for `key`, returning its value. The leaf is not saved.
    pub fn remove(&mut self, key: &KeyValue) -> Result<V, NodeError> {
        self.find_index(key)
            .map(|i| self.entries.remove(i).value)
            .map_err(|_| NodeError::KeyNotFound(key.clone()))
    }

    /// Rewrite the leaf's block from scratch.
    pub fn save<S, C>(&self, store: &mut S, profile: &[DataType], codec: &C) -> Result<(), NodeError>
    where
        S: BlockStore,
        C: LeafCodec<Value = V>,
    {
        let block = pack(self.id, &self.records(profile, codec)?)
            .ok_or(NodeError::Overfull { block_id: self.id })?;
        store.write_block(&block)?;
        Ok(())
    }

    fn records<C: LeafCodec<Value = V>>(
        &self,
        profile: &[DataType],
        codec: &C,
    ) -> Result<Vec<Vec<u8>>, EncodingError> {
        let mut records = Vec::with_capacity(2 * self.entries.len() + 1);
        for entry in &self.entries {
            records.push(codec.marshal_value(&entry.value)?);
            records.push(marshal_key(&entry.key, profile)?);
        }
        records.push(marshal_block_id(self.next_leaf).to_vec());
        Ok(records)
    }
}

impl<V: Clone> LeafNode<V> {
    /// Split this leaf while inserting `(key, value)`.
    ///
    /// The entries plus the new one are cut in key order where both halves
    /// fit and their stored sizes are closest. The lower half stays, the
    /// upper half moves to a new sibling linked in right after this leaf,
    /// and both are saved. The promoted boundary is the first key that
    /// moved. On error the leaf is left as it was.
    pub fn split<S, C>(
        &mut self,
        store: &mut S,
        profile: &[DataType],
        codec: &C,
        key: KeyValue,
        value: V,
    ) -> Result<Split, NodeError>
    where
        S: BlockStore,
        C: LeafCodec<Value = V>,
    {
        let Err(at) = self.find_index(&key) else {
            return Err(NodeError::DuplicateKey(key));
        };
        let mut entries = self.entries.clone();
        entries.insert(at, LeafEntry { key, value });

        let sizes = entries
            .iter()
            .map(|e| -> Result<usize, EncodingError> {
                Ok(codec.marshal_value(&e.value)?.len()
                    + marshal_key(&e.key, profile)?.len()
                    + 2 * SLOT_SIZE)
            })
            .collect::<Result<Vec<_>, EncodingError>>()?;
        let mid = leaf_split_point(&sizes).ok_or(NodeError::Overfull { block_id: self.id })?;

        let upper = entries.split_off(mid);
        let boundary = upper
            .first()
            .map(|e| e.key.clone())
            .ok_or_else(|| NodeError::Structural(format!("split of leaf {} moved nothing", self.id)))?;

        let sibling = Self {
            id: store.allocate_block()?.id(),
            entries: upper,
            next_leaf: self.next_leaf,
        };
        let lower = Self {
            id: self.id,
            entries,
            next_leaf: sibling.id,
        };

        sibling.save(store, profile, codec)?;
        lower.save(store, profile, codec)?;
        *self = lower;

        tracing::debug!(
            leaf = self.id,
            sibling = sibling.id,
            boundary = %boundary,
            "Split leaf node"
        );
        Ok(Split {
            sibling: sibling.id,
            boundary,
        })
    }
}

/// Errors that can occur when working with B-tree nodes.
#[derive(Debug)]
pub enum NodeError {
    /// Block store error.
    Storage(StorageError),
    /// A key or value could not be marshaled.
    Encoding(EncodingError),
    /// Malformed node or stat layout.
    Structural(String),
    /// The node's records no longer fit its block.
    Overfull { block_id: BlockId },
    /// Key already present in a leaf.
    DuplicateKey(KeyValue),
    /// Key absent from a leaf.
    KeyNotFound(KeyValue),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Encoding(e) => write!(f, "encoding error: {e}"),
            Self::Structural(msg) => write!(f, "structural error: {msg}"),
            Self::Overfull { block_id } => {
                write!(f, "node in block {block_id} exceeds block capacity")
            }
            Self::DuplicateKey(key) => write!(f, "duplicate key {key}"),
            Self::KeyNotFound(key) => write!(f, "key {key} not found"),
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for NodeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<BlockError> for NodeError {
    fn from(e: BlockError) -> Self {
        Self::Storage(StorageError::Block(e))
    }
}

impl From<EncodingError> for NodeError {
    fn from(e: EncodingError) -> Self {
        Self::Encoding(e)
    }
}
