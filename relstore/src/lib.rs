// Layers, bottom up:
//  - Blocks: fixed-size slotted pages in a block store (file or memory)
//  - B-tree engine: stat/interior/leaf nodes, one node per block
//  - Relations: heap tables, clustered tables and unique indexes
//  - Catalog: maps relation names to block files in a data directory
//
// Everything is single-threaded and synchronous. Callers serialize access.

pub mod catalog;
pub mod config;
pub mod relation;
pub mod storage;
pub mod types;

#[cfg(test)]
mod e2e_tests;

pub use catalog::Catalog;
pub use config::{ConfigError, StoreConfig};
pub use relation::{BTreeIndex, BTreeTable, HeapTable, Relation, RelationError};
