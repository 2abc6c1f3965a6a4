//! Block store abstraction.
//!
//! This module provides a `BlockStore` trait over block-based storage,
//! allowing the B-tree and the heap tables to run against real files in
//! production and in-memory storage in tests.
//!
//! # Design
//!
//! The trait covers the lifecycle of one store (create, open, close, destroy)
//! and whole-block I/O. Record-level operations live on `Block` itself: a
//! caller reads a block, edits records in memory, and writes it back.

use std::path::PathBuf;

use crate::storage::block::{Block, BlockError};
use crate::types::BlockId;

/// Errors that can occur during block store operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error.
    Io(std::io::Error),
    /// The store has not been opened (or was closed).
    NotOpen,
    /// The store already exists and cannot be created again.
    AlreadyExists(PathBuf),
    /// The store does not exist.
    NotFound(PathBuf),
    /// Block ID out of bounds.
    BlockOutOfBounds { block_id: BlockId, block_count: u32 },
    /// Stored checksum does not match the block contents.
    Corruption {
        block_id: BlockId,
        expected: u32,
        actual: u32,
    },
    /// Record-level error inside a block.
    Block(BlockError),
    /// Injected fault for testing.
    InjectedFault(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::NotOpen => write!(f, "block store is not open"),
            Self::AlreadyExists(p) => write!(f, "block store already exists: {}", p.display()),
            Self::NotFound(p) => write!(f, "block store not found: {}", p.display()),
            Self::BlockOutOfBounds {
                block_id,
                block_count,
            } => write!(
                f,
                "block {block_id} out of bounds (block count: {block_count})"
            ),
            Self::Corruption {
                block_id,
                expected,
                actual,
            } => write!(
                f,
                "checksum mismatch in block {block_id}: expected {expected:#010x}, got {actual:#010x}"
            ),
            Self::Block(e) => write!(f, "block error: {e}"),
            Self::InjectedFault(msg) => write!(f, "injected fault: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Block(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<BlockError> for StorageError {
    fn from(e: BlockError) -> Self {
        Self::Block(e)
    }
}

/// Abstraction over a store of fixed-size blocks.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `allocate_block` issues ids densely, starting at 0
/// - `read_block` returns the last written content for a block
/// - every operation except `create`, `open` and `destroy` fails with
///   `StorageError::NotOpen` while the store is closed
pub trait BlockStore {
    // ========== Lifecycle ==========

    /// Create a new, empty store and leave it open.
    fn create(&mut self) -> Result<(), StorageError>;

    /// Open an existing store. Opening an open store is a no-op.
    fn open(&mut self) -> Result<(), StorageError>;

    /// Close the store. Closing a closed store is a no-op.
    fn close(&mut self) -> Result<(), StorageError>;

    /// Close the store and discard all of its contents.
    fn destroy(&mut self) -> Result<(), StorageError>;

    /// Whether the store currently exists, open or not.
    fn exists(&self) -> bool;

    fn is_open(&self) -> bool;

    // ========== Block Operations ==========

    /// Allocate a new empty block at the end of the store.
    ///
    /// The empty block is written immediately, so it can be read back before
    /// the caller writes it again.
    fn allocate_block(&mut self) -> Result<Block, StorageError>;

    /// Read a block.
    fn read_block(&mut self, block_id: BlockId) -> Result<Block, StorageError>;

    /// Write a block back to the store.
    fn write_block(&mut self, block: &Block) -> Result<(), StorageError>;

    /// Number of blocks in the store.
    fn block_count(&self) -> Result<u32, StorageError>;

    /// Ids of every block in the store, ascending.
    fn block_ids(&self) -> Result<Vec<BlockId>, StorageError> {
        Ok((0..self.block_count()?).collect())
    }

    /// Sync all pending writes to durable storage.
    fn sync(&mut self) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let e = StorageError::BlockOutOfBounds {
            block_id: 10,
            block_count: 5,
        };
        assert!(e.to_string().contains("block 10"));
        assert!(e.to_string().contains("block count: 5"));

        let e = StorageError::InjectedFault("test fault".to_string());
        assert!(e.to_string().contains("test fault"));

        let e = StorageError::from(BlockError::RecordNotFound(4));
        assert!(e.to_string().contains("record 4"));
    }
}
