//! The B-tree engine.
//!
//! A tree lives in its own block store: the stat node in block 0, the first
//! root leaf in block 1, and every later node in whatever block it was
//! allocated. The open tree keeps the stat node and the root in memory;
//! every other node is loaded per operation and dropped when it returns.
//!
//! Nodes are saved eagerly, so closing a tree persists nothing further.
//! Deletes never merge or rebalance, which can leave leaves underfull.

use crate::storage::btree::codec::{EncodingError, LeafCodec, LocatorCodec, RowCodec};
use crate::storage::btree::node::{
    InteriorNode, LeafEntry, LeafInsert, LeafNode, NO_NEXT_LEAF, Node, NodeError, Split, StatNode,
};
use crate::storage::io::{BlockStore, StorageError};
use crate::types::{BlockId, DataType, KeyProfile, KeyValue};

/// A tree whose leaves point at rows in a heap.
pub type IndexTree<S> = BTree<S, LocatorCodec>;

/// A tree whose leaves hold the rows themselves.
pub type ClusteredTree<S> = BTree<S, RowCodec>;

/// In-memory state of an open tree.
struct OpenTree<V> {
    stat: StatNode,
    root: Node<V>,
}

/// A disk-resident B-tree with unique keys.
pub struct BTree<S, C: LeafCodec> {
    store: S,
    profile: KeyProfile,
    codec: C,
    state: Option<OpenTree<C::Value>>,
}

impl<S: BlockStore, C: LeafCodec> BTree<S, C> {
    /// Create a closed handle for the tree stored in `store`.
    ///
    /// `profile` lists the key column types in key order and fixes how keys
    /// are laid out on disk.
    #[must_use]
    pub const fn new(store: S, profile: KeyProfile, codec: C) -> Self {
        Self {
            store,
            profile,
            codec,
            state: None,
        }
    }

    #[must_use]
    pub fn profile(&self) -> &[DataType] {
        &self.profile
    }

    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// The underlying block store, for inspection.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Whether the tree's block store exists, open or not.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.store.exists()
    }

    // ========== Lifecycle ==========

    /// Create an empty tree (stat node plus an empty root leaf) and open it.
    ///
    /// If any step fails, the block store is destroyed again.
    pub fn create(&mut self) -> Result<(), BTreeError> {
        self.store.create()?;

        match self.build_empty() {
            Ok(state) => {
                self.state = Some(state);
                tracing::debug!("Created empty B-tree");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create B-tree, dropping it");
                if let Err(drop_err) = self.store.destroy() {
                    tracing::error!(error = %drop_err, "Failed to drop partial B-tree");
                }
                Err(e.into())
            }
        }
    }

    fn build_empty(&mut self) -> Result<OpenTree<C::Value>, NodeError> {
        let stat_block = self.store.allocate_block()?;
        let root = LeafNode::create(&mut self.store)?;
        root.save(&mut self.store, &self.profile, &self.codec)?;
        let stat = StatNode::create(&mut self.store, stat_block, root.id())?;
        Ok(OpenTree {
            stat,
            root: Node::Leaf(root),
        })
    }

    /// Open an existing tree. Opening an open tree is a no-op.
    pub fn open(&mut self) -> Result<(), BTreeError> {
        if self.state.is_some() {
            return Ok(());
        }
        self.store.open()?;

        let mut io = NodeIo {
            store: &mut self.store,
            profile: &self.profile,
            codec: &self.codec,
        };
        let stat = StatNode::load(io.store)?;
        let root = io.load(stat.root_id(), stat.height())?;

        tracing::debug!(
            root = stat.root_id(),
            height = stat.height(),
            "Opened B-tree"
        );
        self.state = Some(OpenTree { stat, root });
        Ok(())
    }

    /// Release the in-memory root and stat node and close the store.
    pub fn close(&mut self) -> Result<(), BTreeError> {
        self.state = None;
        self.store.close()?;
        Ok(())
    }

    /// Discard the tree and its block store.
    pub fn drop(&mut self) -> Result<(), BTreeError> {
        self.state = None;
        self.store.destroy()?;
        Ok(())
    }

    // ========== Queries ==========

    /// Values stored under `key`: one value, or none on a miss.
    pub fn lookup(&mut self, key: &KeyValue) -> Result<Vec<C::Value>, BTreeError> {
        let leaf = self.find_leaf(Some(key))?;
        Ok(leaf.find_eq(key).ok().cloned().into_iter().collect())
    }

    /// Entries with `min <= key <= max`, in ascending key order.
    ///
    /// A missing bound leaves that side of the range open.
    pub fn range(
        &mut self,
        min: Option<&KeyValue>,
        max: Option<&KeyValue>,
    ) -> Result<Vec<LeafEntry<C::Value>>, BTreeError> {
        let mut results = Vec::new();
        let mut leaf = self.find_leaf(min)?;

        loop {
            for entry in leaf.entries() {
                if min.is_some_and(|min| &entry.key < min) {
                    continue;
                }
                if max.is_some_and(|max| &entry.key > max) {
                    return Ok(results);
                }
                results.push(entry.clone());
            }

            if leaf.next_leaf() == NO_NEXT_LEAF {
                return Ok(results);
            }
            leaf = LeafNode::load(&mut self.store, leaf.next_leaf(), &self.profile, &self.codec)?;
        }
    }

    // ========== Mutations ==========

    /// Insert a new entry. Fails with `DuplicateKey` if `key` is present.
    pub fn insert(&mut self, key: KeyValue, value: C::Value) -> Result<(), BTreeError> {
        let state = self.state.as_mut().ok_or(BTreeError::NotOpen)?;
        let mut io = NodeIo {
            store: &mut self.store,
            profile: &self.profile,
            codec: &self.codec,
        };

        let height = state.stat.height();
        let Some(split) = io.insert(&mut state.root, height, key, value)? else {
            return Ok(());
        };

        // The root split: grow the tree by one level
        let old_root = state.root.id();
        let mut new_root = InteriorNode::create(io.store, old_root)?;
        if new_root
            .insert(io.store, io.profile, split.boundary, split.sibling)?
            .is_some()
        {
            return Err(BTreeError::Structural(format!(
                "new root {} overflowed on its first boundary",
                new_root.id()
            )));
        }

        state.stat.set_root_id(new_root.id());
        state.stat.set_height(height + 1);
        state.stat.save(io.store)?;

        tracing::debug!(
            old_root,
            new_root = new_root.id(),
            height = height + 1,
            "Grew B-tree"
        );
        state.root = Node::Interior(new_root);
        Ok(())
    }

    /// Remove the entry for `key`, returning its value.
    ///
    /// Fails with `KeyNotFound` if `key` is absent. Leaves are never merged.
    pub fn delete(&mut self, key: &KeyValue) -> Result<C::Value, BTreeError> {
        let mut leaf = self.find_leaf(Some(key))?;
        let value = leaf.remove(key)?;
        leaf.save(&mut self.store, &self.profile, &self.codec)?;

        if let Some(state) = self.state.as_mut()
            && matches!(state.root, Node::Leaf(_))
        {
            state.root = Node::Leaf(leaf);
        }
        Ok(value)
    }

    // ========== Introspection ==========

    /// Tree height; 1 means the root is a leaf.
    pub fn height(&self) -> Result<u32, BTreeError> {
        Ok(self.open_state()?.stat.height())
    }

    pub fn root_id(&self) -> Result<BlockId, BTreeError> {
        Ok(self.open_state()?.stat.root_id())
    }

    /// Number of entries, counted along the leaf chain.
    pub fn count(&mut self) -> Result<usize, BTreeError> {
        let mut count = 0;
        self.walk_leaves(|leaf| count += leaf.len())?;
        Ok(count)
    }

    /// Block ids of all leaves, in chain order.
    pub fn leaf_chain(&mut self) -> Result<Vec<BlockId>, BTreeError> {
        let mut chain = Vec::new();
        self.walk_leaves(|leaf| chain.push(leaf.id()))?;
        Ok(chain)
    }

    fn walk_leaves(
        &mut self,
        mut visit: impl FnMut(&LeafNode<C::Value>),
    ) -> Result<(), BTreeError> {
        let mut leaf = self.find_leaf(None)?;
        loop {
            visit(&leaf);
            if leaf.next_leaf() == NO_NEXT_LEAF {
                return Ok(());
            }
            leaf = LeafNode::load(&mut self.store, leaf.next_leaf(), &self.profile, &self.codec)?;
        }
    }

    fn open_state(&self) -> Result<&OpenTree<C::Value>, BTreeError> {
        self.state.as_ref().ok_or(BTreeError::NotOpen)
    }

    /// Descend to the leaf that would hold `key`, or the leftmost leaf.
    fn find_leaf(&mut self, key: Option<&KeyValue>) -> Result<LeafNode<C::Value>, BTreeError> {
        let state = self.state.as_ref().ok_or(BTreeError::NotOpen)?;
        let mut block_id = match &state.root {
            Node::Leaf(leaf) => return Ok(leaf.clone()),
            Node::Interior(node) => node.find(key),
        };

        let mut height = state.stat.height() - 1;
        while height > 1 {
            block_id = InteriorNode::load(&mut self.store, block_id, &self.profile)?.find(key);
            height -= 1;
        }
        Ok(LeafNode::load(
            &mut self.store,
            block_id,
            &self.profile,
            &self.codec,
        )?)
    }
}

/// Borrowed access to the block store and layouts during one operation.
struct NodeIo<'a, S, C> {
    store: &'a mut S,
    profile: &'a [DataType],
    codec: &'a C,
}

impl<S: BlockStore, C: LeafCodec> NodeIo<'_, S, C> {
    /// Load a node; its kind follows from its height.
    fn load(&mut self, block_id: BlockId, height: u32) -> Result<Node<C::Value>, NodeError> {
        if height == 1 {
            LeafNode::load(self.store, block_id, self.profile, self.codec).map(Node::Leaf)
        } else {
            InteriorNode::load(self.store, block_id, self.profile).map(Node::Interior)
        }
    }

    /// Insert into the subtree rooted at `node`, which sits at `height`.
    ///
    /// Returns the split of `node` itself, if there was one.
    fn insert(
        &mut self,
        node: &mut Node<C::Value>,
        height: u32,
        key: KeyValue,
        value: C::Value,
    ) -> Result<Option<Split>, NodeError> {
        match node {
            Node::Leaf(leaf) => {
                match leaf.insert(self.store, self.profile, self.codec, key, value)? {
                    LeafInsert::Saved => Ok(None),
                    LeafInsert::NeedsSplit { key, value } => leaf
                        .split(self.store, self.profile, self.codec, key, value)
                        .map(Some),
                }
            }
            Node::Interior(interior) => {
                let mut child = self.load(interior.find(Some(&key)), height - 1)?;
                match self.insert(&mut child, height - 1, key, value)? {
                    None => Ok(None),
                    Some(split) => {
                        interior.insert(self.store, self.profile, split.boundary, split.sibling)
                    }
                }
            }
        }
    }
}

/// Errors that can occur during B-tree operations.
#[derive(Debug)]
pub enum BTreeError {
    /// Block store error.
    Storage(StorageError),
    /// A key or value could not be marshaled.
    Encoding(EncodingError),
    /// Unique key violation on insert.
    DuplicateKey(KeyValue),
    /// Delete of a key that is not in the tree.
    KeyNotFound(KeyValue),
    /// Malformed tree structure; the tree should be considered corrupt.
    Structural(String),
    /// The tree has not been opened (or was closed).
    NotOpen,
}

impl std::fmt::Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Encoding(e) => write!(f, "encoding error: {e}"),
            Self::DuplicateKey(key) => write!(f, "duplicate key {key}"),
            Self::KeyNotFound(key) => write!(f, "key {key} not found"),
            Self::Structural(msg) => write!(f, "structural error: {msg}"),
            Self::NotOpen => write!(f, "B-tree is not open"),
        }
    }
}

impl std::error::Error for BTreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for BTreeError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<EncodingError> for BTreeError {
    fn from(e: EncodingError) -> Self {
        Self::Encoding(e)
    }
}

impl From<NodeError> for BTreeError {
    fn from(e: NodeError) -> Self {
        match e {
            NodeError::Storage(e) => Self::Storage(e),
            NodeError::Encoding(e) => Self::Encoding(e),
            NodeError::Structural(msg) => Self::Structural(msg),
            e @ NodeError::Overfull { .. } => Self::Structural(e.to_string()),
            NodeError::DuplicateKey(key) => Self::DuplicateKey(key),
            NodeError::KeyNotFound(key) => Self::KeyNotFound(key),
        }
    }
}
