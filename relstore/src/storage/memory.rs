//! In-memory block store for tests and throwaway trees.
//!
//! This module provides an in-memory implementation of the `BlockStore`
//! trait with support for write fault injection:
//! - a seeded random write error rate
//! - a deterministic "fail after N more writes" switch
//!
//! # Thread Safety
//!
//! This implementation is not thread-safe. Trees are single-writer, so
//! everything runs on one thread.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::storage::block::Block;
use crate::storage::io::{BlockStore, StorageError};
use crate::types::BlockId;

/// Configuration for fault injection.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Probability of a write error (0.0 - 1.0).
    pub write_error_rate: f64,
    /// Fail every write once this many more writes have succeeded.
    pub fail_after_writes: Option<u64>,
}

impl FaultConfig {
    /// Create a fault config with no faults.
    #[must_use]
    pub fn no_faults() -> Self {
        Self::default()
    }

    /// Create a fault config that starts failing after `writes` writes.
    #[must_use]
    pub const fn fail_after(writes: u64) -> Self {
        Self {
            write_error_rate: 0.0,
            fail_after_writes: Some(writes),
        }
    }
}

/// Statistics about in-memory store operations.
#[derive(Debug, Default, Clone)]
pub struct MemoryStoreStats {
    /// Number of block reads.
    pub reads: u64,
    /// Number of block writes.
    pub writes: u64,
    /// Number of injected write errors.
    pub injected_write_errors: u64,
}

/// In-memory block store.
pub struct MemoryBlockStore {
    /// Block contents; `None` while the store does not exist.
    blocks: Option<HashMap<BlockId, Block>>,
    block_count: u32,
    open: bool,

    fault_config: FaultConfig,
    rng: StdRng,
    stats: MemoryStoreStats,
}

impl MemoryBlockStore {
    /// Create a handle for a store that does not exist yet.
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(0, FaultConfig::no_faults())
    }

    /// Create a handle with fault injection. The seed makes random faults
    /// reproducible.
    #[must_use]
    pub fn with_faults(seed: u64, fault_config: FaultConfig) -> Self {
        Self {
            blocks: None,
            block_count: 0,
            open: false,
            fault_config,
            rng: StdRng::seed_from_u64(seed),
            stats: MemoryStoreStats::default(),
        }
    }

    /// Get the current statistics.
    #[must_use]
    pub const fn stats(&self) -> &MemoryStoreStats {
        &self.stats
    }

    /// Update the fault configuration.
    pub fn set_fault_config(&mut self, config: FaultConfig) {
        self.fault_config = config;
    }

    fn should_fail_write(&mut self) -> bool {
        if let Some(remaining) = self.fault_config.fail_after_writes.as_mut() {
            if *remaining == 0 {
                return true;
            }
            *remaining -= 1;
        }
        let rate = self.fault_config.write_error_rate;
        rate > 0.0 && self.rng.random::<f64>() < rate
    }

    fn blocks_mut(&mut self) -> Result<&mut HashMap<BlockId, Block>, StorageError> {
        if !self.open {
            return Err(StorageError::NotOpen);
        }
        self.blocks.as_mut().ok_or(StorageError::NotOpen)
    }
}

impl Default for MemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for MemoryBlockStore {
    fn create(&mut self) -> Result<(), StorageError> {
        if self.blocks.is_some() {
            return Err(StorageError::AlreadyExists("<memory>".into()));
        }
        self.blocks = Some(HashMap::new());
        self.block_count = 0;
        self.open = true;
        Ok(())
    }

    fn open(&mut self) -> Result<(), StorageError> {
        if self.blocks.is_none() {
            return Err(StorageError::NotFound("<memory>".into()));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.open = false;
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), StorageError> {
        self.blocks = None;
        self.block_count = 0;
        self.open = false;
        Ok(())
    }

    fn exists(&self) -> bool {
        self.blocks.is_some()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn allocate_block(&mut self) -> Result<Block, StorageError> {
        self.blocks_mut()?;
        let block = Block::new(self.block_count);
        self.block_count += 1;

        if let Err(e) = self.write_block(&block) {
            self.block_count -= 1;
            return Err(e);
        }
        Ok(block)
    }

    fn read_block(&mut self, block_id: BlockId) -> Result<Block, StorageError> {
        let block_count = self.block_count;
        let block = self
            .blocks_mut()?
            .get(&block_id)
            .cloned()
            .ok_or(StorageError::BlockOutOfBounds {
                block_id,
                block_count,
            })?;
        self.stats.reads += 1;
        Ok(block)
    }

    fn write_block(&mut self, block: &Block) -> Result<(), StorageError> {
        let block_count = self.block_count;
        self.blocks_mut()?;
        if block.id() >= block_count {
            return Err(StorageError::BlockOutOfBounds {
                block_id: block.id(),
                block_count,
            });
        }

        if self.should_fail_write() {
            self.stats.injected_write_errors += 1;
            return Err(StorageError::InjectedFault(format!(
                "write of block {} failed",
                block.id()
            )));
        }

        self.blocks_mut()?.insert(block.id(), block.clone());
        self.stats.writes += 1;
        Ok(())
    }

    fn block_count(&self) -> Result<u32, StorageError> {
        if !self.open {
            return Err(StorageError::NotOpen);
        }
        Ok(self.block_count)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.blocks_mut()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut store = MemoryBlockStore::new();
        assert!(!store.exists());
        assert!(matches!(store.open(), Err(StorageError::NotFound(_))));

        store.create().expect("create");
        assert!(store.exists());
        assert!(store.is_open());

        let mut block = store.allocate_block().expect("allocate");
        block.add(b"kept").expect("add");
        store.write_block(&block).expect("write");

        store.close().expect("close");
        assert!(matches!(store.read_block(0), Err(StorageError::NotOpen)));

        store.open().expect("reopen");
        assert_eq!(store.read_block(0).expect("read").get(1).expect("record"), b"kept");

        store.destroy().expect("destroy");
        assert!(!store.exists());
    }

    #[test]
    fn test_fail_after_writes() {
        let mut store = MemoryBlockStore::with_faults(1, FaultConfig::fail_after(2));
        store.create().expect("create");

        store.allocate_block().expect("first write");
        store.allocate_block().expect("second write");
        let result = store.allocate_block();
        assert!(matches!(result, Err(StorageError::InjectedFault(_))));

        // The failed allocation does not leave a hole
        assert_eq!(store.block_count().expect("count"), 2);
        assert_eq!(store.stats().injected_write_errors, 1);
    }

    #[test]
    fn test_random_faults_are_deterministic() {
        let config = FaultConfig {
            write_error_rate: 0.5,
            fail_after_writes: None,
        };

        let run = |seed: u64| {
            let mut store = MemoryBlockStore::with_faults(seed, config.clone());
            store.create().expect("create");
            let block = Block::new(0);
            store.set_fault_config(FaultConfig::no_faults());
            store.allocate_block().expect("allocate");
            store.set_fault_config(config.clone());
            (0..50)
                .map(|_| store.write_block(&block).is_ok())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(7), run(7));
        assert!(run(7).iter().any(|ok| !ok));
    }
}
