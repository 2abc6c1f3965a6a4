//! Fixed-size blocks holding variable-length records.
//!
//! A block is the unit of I/O for every block store. Records are kept in a
//! slotted layout:
//!
//! - Header (8 bytes): `checksum` (u32), `record_count` (u16), `end_free` (u16)
//! - Slot array: one 4-byte entry per record id, `size` (u16) + `offset` (u16)
//! - Record bodies, growing from the end of the block toward the slot array
//!
//! Record ids start at 1. A deleted record keeps its slot with both fields
//! zeroed so that the ids of later records never change.

use crate::types::{BlockId, RecordId};

/// Block size in bytes (4KB).
pub const BLOCK_SIZE: usize = 4096;

/// Size of the block header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Size of one slot entry in bytes.
pub const SLOT_SIZE: usize = 4;

/// Largest record that fits into an otherwise empty block.
pub const MAX_RECORD_SIZE: usize = BLOCK_SIZE - HEADER_SIZE - SLOT_SIZE;

const CHECKSUM_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 4;
const END_FREE_OFFSET: usize = 6;

/// A block buffer with its id.
#[derive(Clone)]
pub struct Block {
    id: BlockId,
    data: Box<[u8; BLOCK_SIZE]>,
}

impl Block {
    /// Create a new empty block.
    #[must_use]
    pub fn new(id: BlockId) -> Self {
        let mut block = Self {
            id,
            data: Box::new([0u8; BLOCK_SIZE]),
        };
        block.clear();
        block
    }

    /// Create a block from raw bytes read from storage.
    #[must_use]
    pub fn from_bytes(id: BlockId, bytes: &[u8; BLOCK_SIZE]) -> Self {
        Self {
            id,
            data: Box::new(*bytes),
        }
    }

    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    /// Get the raw block data.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.data
    }

    /// Number of slots issued so far, including deleted ones.
    #[must_use]
    pub fn slot_count(&self) -> u16 {
        self.read_u16(COUNT_OFFSET)
    }

    /// Number of live records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.record_ids().len()
    }

    /// Bytes still available for record bodies and their slots.
    #[must_use]
    pub fn free_space(&self) -> usize {
        let slots_end = HEADER_SIZE + usize::from(self.slot_count()) * SLOT_SIZE;
        self.end_free().saturating_sub(slots_end)
    }

    /// Remove every record.
    pub fn clear(&mut self) {
        self.write_u16(COUNT_OFFSET, 0);
        self.set_end_free(BLOCK_SIZE);
    }

    /// Append a record, returning its id.
    pub fn add(&mut self, record: &[u8]) -> Result<RecordId, BlockError> {
        let needed = record.len() + SLOT_SIZE;
        let available = self.free_space();
        if needed > available {
            return Err(BlockError::NoRoom { needed, available });
        }

        let id = self.slot_count() + 1;
        self.write_u16(COUNT_OFFSET, id);

        let offset = self.end_free() - record.len();
        self.data[offset..offset + record.len()].copy_from_slice(record);
        self.set_end_free(offset);
        self.write_slot(id, record.len(), offset);

        Ok(id)
    }

    /// Get a record's bytes.
    pub fn get(&self, id: RecordId) -> Result<&[u8], BlockError> {
        let (size, offset) = self.live_slot(id)?;
        Ok(&self.data[offset..offset + size])
    }

    /// Replace a record's bytes, keeping its id.
    pub fn put(&mut self, id: RecordId, record: &[u8]) -> Result<(), BlockError> {
        let (size, offset) = self.live_slot(id)?;
        let new_size = record.len();

        if new_size > size {
            let extra = new_size - size;
            let available = self.free_space();
            if extra > available {
                return Err(BlockError::NoRoom {
                    needed: extra,
                    available,
                });
            }
            self.slide(offset, offset - extra);
            let offset = offset - extra;
            self.data[offset..offset + new_size].copy_from_slice(record);
            self.write_slot(id, new_size, offset);
        } else {
            self.data[offset..offset + new_size].copy_from_slice(record);
            self.slide(offset + new_size, offset + size);
            let (_, moved) = self.read_slot(id);
            self.write_slot(id, new_size, moved);
        }

        Ok(())
    }

    /// Delete a record. Its id is never reissued within this block.
    pub fn delete(&mut self, id: RecordId) -> Result<(), BlockError> {
        let (size, offset) = self.live_slot(id)?;
        self.write_slot(id, 0, 0);
        self.slide(offset, offset + size);
        Ok(())
    }

    /// Ids of the live records, ascending.
    #[must_use]
    pub fn record_ids(&self) -> Vec<RecordId> {
        (1..=self.slot_count())
            .filter(|&id| self.read_slot(id).1 != 0)
            .collect()
    }

    /// Compute the CRC32 checksum of the block, excluding the checksum field.
    #[must_use]
    pub fn compute_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.data[CHECKSUM_OFFSET + 4..]);
        hasher.finalize()
    }

    /// Stored checksum, as written by the last `stamp_checksum`.
    #[must_use]
    pub fn stored_checksum(&self) -> u32 {
        u32::from_le_bytes([
            self.data[CHECKSUM_OFFSET],
            self.data[CHECKSUM_OFFSET + 1],
            self.data[CHECKSUM_OFFSET + 2],
            self.data[CHECKSUM_OFFSET + 3],
        ])
    }

    /// Write the current checksum into the header.
    pub fn stamp_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.data[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Move the bodies stored in `[end_free, start)` so they end at `end`,
    /// fixing up every slot that points into the moved region.
    fn slide(&mut self, start: usize, end: usize) {
        if start == end {
            return;
        }
        let end_free = self.end_free();
        let len = start - end_free;
        let target = end_free + end - start;
        self.data.copy_within(end_free..start, target);

        for id in self.record_ids() {
            let (size, offset) = self.read_slot(id);
            if offset <= start {
                self.write_slot(id, size, offset + end - start);
            }
        }
        self.set_end_free(target);
        debug_assert_eq!(target + len, end);
    }

    fn live_slot(&self, id: RecordId) -> Result<(usize, usize), BlockError> {
        if id == 0 || id > self.slot_count() {
            return Err(BlockError::RecordNotFound(id));
        }
        let (size, offset) = self.read_slot(id);
        if offset == 0 {
            return Err(BlockError::RecordNotFound(id));
        }
        Ok((size, offset))
    }

    fn slot_offset(id: RecordId) -> usize {
        HEADER_SIZE + (usize::from(id) - 1) * SLOT_SIZE
    }

    fn read_slot(&self, id: RecordId) -> (usize, usize) {
        let at = Self::slot_offset(id);
        (
            usize::from(self.read_u16(at)),
            usize::from(self.read_u16(at + 2)),
        )
    }

    #[allow(clippy::cast_possible_truncation)] // sizes and offsets are < BLOCK_SIZE
    fn write_slot(&mut self, id: RecordId, size: usize, offset: usize) {
        let at = Self::slot_offset(id);
        self.write_u16(at, size as u16);
        self.write_u16(at + 2, offset as u16);
    }

    fn end_free(&self) -> usize {
        usize::from(self.read_u16(END_FREE_OFFSET))
    }

    #[allow(clippy::cast_possible_truncation)] // BLOCK_SIZE fits in u16
    fn set_end_free(&mut self, offset: usize) {
        self.write_u16(END_FREE_OFFSET, offset as u16);
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.data[offset], self.data[offset + 1]])
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("slot_count", &self.slot_count())
            .field("free_space", &self.free_space())
            .finish_non_exhaustive()
    }
}

/// Errors related to record operations inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    /// The record (plus its slot) does not fit into the remaining space.
    NoRoom { needed: usize, available: usize },
    /// No live record with this id.
    RecordNotFound(RecordId),
}

impl std::fmt::Display for BlockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRoom { needed, available } => {
                write!(
                    f,
                    "not enough room in block: need {needed} bytes, {available} available"
                )
            }
            Self::RecordNotFound(id) => write!(f, "record {id} not found in block"),
        }
    }
}

impl std::error::Error for BlockError {}
