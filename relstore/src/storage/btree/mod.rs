//! Disk-resident B-tree with unique keys.
//!
//! The tree is used two ways:
//! - as a secondary index, with leaves mapping keys to row locations in a
//!   heap (`IndexTree`)
//! - as a clustered table, with leaves holding the non-key columns of each
//!   row (`ClusteredTree`)
//!
//! # Usage
//!
//! ```
//! use relstore::storage::btree::{BTree, LocatorCodec};
//! use relstore::storage::memory::MemoryBlockStore;
//! use relstore::types::{DataType, KeyValue, RecordLocation, Value};
//!
//! let mut tree = BTree::new(MemoryBlockStore::new(), vec![DataType::Int], LocatorCodec);
//! tree.create().unwrap();
//!
//! let key = KeyValue::new(vec![Value::Int(12)]);
//! tree.insert(key.clone(), RecordLocation::new(3, 1)).unwrap();
//!
//! assert_eq!(tree.lookup(&key).unwrap(), vec![RecordLocation::new(3, 1)]);
//! assert!(tree.lookup(&KeyValue::new(vec![Value::Int(6)])).unwrap().is_empty());
//! ```

mod codec;
mod node;
mod tree;

pub use codec::{
    BLOCK_ID_SIZE, EncodingError, LOCATOR_SIZE, LeafCodec, LocatorCodec, RowCodec,
    marshal_block_id, marshal_key, marshal_locator, marshal_row, unmarshal_block_id,
    unmarshal_key, unmarshal_locator, unmarshal_row,
};
pub use node::{
    InteriorNode, LeafEntry, LeafInsert, LeafNode, MAX_ENTRY_SIZE, NO_NEXT_LEAF, Node, NodeError,
    STAT_BLOCK_ID, Split, StatNode,
};
pub use tree::{BTree, BTreeError, ClusteredTree, IndexTree};
