//! File-backed block store.
//!
//! Each store is a single file holding a dense array of `BLOCK_SIZE` blocks;
//! block `n` lives at byte offset `n * BLOCK_SIZE`. The block count is derived
//! from the file length, so the file carries no separate header.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::block::{BLOCK_SIZE, Block};
use crate::storage::io::{BlockStore, StorageError};
use crate::types::BlockId;

/// Block size as u64 for offset calculations.
const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

/// A block store backed by one file.
///
/// A `BlockFile` starts closed; `create` or `open` attaches it to the file.
#[derive(Debug)]
pub struct BlockFile {
    path: PathBuf,
    file: Option<File>,
    block_count: u32,
}

impl BlockFile {
    /// Create a closed handle for the store at `path`.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            file: None,
            block_count: 0,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_mut(&mut self) -> Result<&mut File, StorageError> {
        self.file.as_mut().ok_or(StorageError::NotOpen)
    }

    fn check_bounds(&self, block_id: BlockId) -> Result<(), StorageError> {
        if block_id >= self.block_count {
            return Err(StorageError::BlockOutOfBounds {
                block_id,
                block_count: self.block_count,
            });
        }
        Ok(())
    }
}

impl BlockStore for BlockFile {
    fn create(&mut self) -> Result<(), StorageError> {
        if self.path.exists() {
            return Err(StorageError::AlreadyExists(self.path.clone()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&self.path)?;

        self.file = Some(file);
        self.block_count = 0;
        tracing::debug!("Created block file {}", self.path.display());
        Ok(())
    }

    fn open(&mut self) -> Result<(), StorageError> {
        if self.file.is_some() {
            return Ok(());
        }
        if !self.path.exists() {
            return Err(StorageError::NotFound(self.path.clone()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;

        let len = file.metadata()?.len();
        if len % BLOCK_SIZE_U64 != 0 {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "{} is {len} bytes, not a whole number of blocks",
                    self.path.display()
                ),
            )));
        }
        let block_count = u32::try_from(len / BLOCK_SIZE_U64).map_err(|_| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "block file too large",
            ))
        })?;

        self.file = Some(file);
        self.block_count = block_count;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), StorageError> {
        self.file = None;
        self.block_count = 0;
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            tracing::debug!("Removed block file {}", self.path.display());
        }
        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn allocate_block(&mut self) -> Result<Block, StorageError> {
        self.file_mut()?;
        let block = Block::new(self.block_count);
        self.block_count += 1;

        if let Err(e) = self.write_block(&block) {
            self.block_count -= 1;
            return Err(e);
        }
        Ok(block)
    }

    fn read_block(&mut self, block_id: BlockId) -> Result<Block, StorageError> {
        self.file_mut()?;
        self.check_bounds(block_id)?;

        let offset = u64::from(block_id) * BLOCK_SIZE_U64;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = [0u8; BLOCK_SIZE];
        file.read_exact(&mut buf)?;

        let block = Block::from_bytes(block_id, &buf);
        let expected = block.stored_checksum();
        let actual = block.compute_checksum();
        if expected != actual {
            return Err(StorageError::Corruption {
                block_id,
                expected,
                actual,
            });
        }

        Ok(block)
    }

    fn write_block(&mut self, block: &Block) -> Result<(), StorageError> {
        self.file_mut()?;
        self.check_bounds(block.id())?;

        let mut stamped = block.clone();
        stamped.stamp_checksum();

        let offset = u64::from(block.id()) * BLOCK_SIZE_U64;
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(stamped.as_bytes())?;

        Ok(())
    }

    fn block_count(&self) -> Result<u32, StorageError> {
        if self.file.is_none() {
            return Err(StorageError::NotOpen);
        }
        Ok(self.block_count)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.file_mut()?.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_create_and_open() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");

        {
            let mut store = BlockFile::new(&path);
            assert!(!store.exists());
            store.create().expect("create store");
            assert!(store.is_open());
            assert_eq!(store.block_count().expect("count"), 0);
            store.close().expect("close");
            assert!(!store.is_open());
        }

        {
            let mut store = BlockFile::new(&path);
            store.open().expect("open store");
            assert_eq!(store.block_count().expect("count"), 0);
        }
    }

    #[test]
    fn test_create_already_exists() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");
        fs::write(&path, b"existing").expect("write file");

        let mut store = BlockFile::new(&path);
        let result = store.create();
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[test]
    fn test_open_missing() {
        let dir = tempdir().expect("create temp dir");
        let mut store = BlockFile::new(&dir.path().join("missing.db"));
        assert!(matches!(store.open(), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_closed_store_rejects_io() {
        let dir = tempdir().expect("create temp dir");
        let mut store = BlockFile::new(&dir.path().join("test.db"));
        assert!(matches!(store.read_block(0), Err(StorageError::NotOpen)));
        assert!(matches!(store.allocate_block(), Err(StorageError::NotOpen)));
    }

    #[test]
    fn test_allocate_write_read() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");
        let mut store = BlockFile::new(&path);
        store.create().expect("create store");

        let first = store.allocate_block().expect("allocate");
        let mut second = store.allocate_block().expect("allocate");
        assert_eq!(first.id(), 0);
        assert_eq!(second.id(), 1);

        second.add(b"hello world").expect("add record");
        store.write_block(&second).expect("write");

        let read = store.read_block(1).expect("read");
        assert_eq!(read.get(1).expect("record"), b"hello world");
        assert!(store.read_block(0).expect("read empty").record_ids().is_empty());
    }

    #[test]
    fn test_block_out_of_bounds() {
        let dir = tempdir().expect("create temp dir");
        let mut store = BlockFile::new(&dir.path().join("test.db"));
        store.create().expect("create store");

        let result = store.read_block(100);
        assert!(matches!(result, Err(StorageError::BlockOutOfBounds { .. })));
    }

    #[test]
    fn test_block_persistence() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");

        {
            let mut store = BlockFile::new(&path);
            store.create().expect("create store");
            store.allocate_block().expect("allocate");
            let mut block = store.allocate_block().expect("allocate");
            block.add(b"persisted").expect("add");
            store.write_block(&block).expect("write");
            store.close().expect("close");
        }

        {
            let mut store = BlockFile::new(&path);
            store.open().expect("open");
            assert_eq!(store.block_count().expect("count"), 2);
            let block = store.read_block(1).expect("read");
            assert_eq!(block.get(1).expect("record"), b"persisted");
        }
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");

        {
            let mut store = BlockFile::new(&path);
            store.create().expect("create store");
            let mut block = store.allocate_block().expect("allocate");
            block.add(b"important").expect("add");
            store.write_block(&block).expect("write");
            store.close().expect("close");
        }

        // Flip a bit in the record body at the end of block 0
        let mut bytes = fs::read(&path).expect("read file");
        bytes[BLOCK_SIZE - 1] ^= 0x40;
        fs::write(&path, &bytes).expect("write file");

        let mut store = BlockFile::new(&path);
        store.open().expect("open");
        let result = store.read_block(0);
        assert!(matches!(
            result,
            Err(StorageError::Corruption { block_id: 0, .. })
        ));
    }

    #[test]
    fn test_destroy_removes_file() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("test.db");
        let mut store = BlockFile::new(&path);
        store.create().expect("create store");
        store.allocate_block().expect("allocate");

        store.destroy().expect("destroy");
        assert!(!path.exists());
        assert!(!store.is_open());

        // A destroyed store can be created again
        store.create().expect("recreate");
        assert_eq!(store.block_count().expect("count"), 0);
    }
}
