//! Block storage and the B-tree engine.
//!
//! Every tree and every heap table owns one block store: a dense array of
//! 4KB blocks, each holding variable-length records.
//!
//! - `block`: the slotted block layout
//! - `io`: the `BlockStore` trait and its error type
//! - `file`: a `BlockStore` backed by one file, with CRC32 block checksums
//! - `memory`: an in-memory `BlockStore` with fault injection for tests
//! - `btree`: the B-tree engine built on top of any `BlockStore`

pub mod block;
pub mod btree;
pub mod file;
pub mod io;
pub mod memory;

pub use block::{BLOCK_SIZE, Block, BlockError, MAX_RECORD_SIZE};
pub use file::BlockFile;
pub use io::{BlockStore, StorageError};
pub use memory::{FaultConfig, MemoryBlockStore, MemoryStoreStats};
