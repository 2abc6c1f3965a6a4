//! Heap tables: unordered rows in a block store.
//!
//! Rows are marshaled with the row codec (every declared column, in
//! declaration order) and appended to the last block. When it is full, a new
//! block is allocated. A row's `RecordLocation` never changes while the row
//! exists.

use crate::relation::{Relation, RelationError, restrict_row, validate_row};
use crate::storage::block::BlockError;
use crate::storage::btree::{marshal_row, unmarshal_row};
use crate::storage::io::BlockStore;
use crate::types::{Column, Identifier, RecordLocation, ValueDict};

/// A table whose rows live in heap blocks.
pub struct HeapTable<S> {
    name: Identifier,
    columns: Vec<Column>,
    store: S,
}

impl<S: BlockStore> HeapTable<S> {
    /// Create a closed handle for the table stored in `store`.
    #[must_use]
    pub fn new(name: &str, columns: Vec<Column>, store: S) -> Self {
        Self {
            name: name.to_owned(),
            columns,
            store,
        }
    }

    /// Create the table's storage and open it.
    pub fn create(&mut self) -> Result<(), RelationError> {
        self.store.create()?;
        tracing::info!(table = %self.name, "Created heap table");
        Ok(())
    }

    /// Open the table, creating it first if it does not exist.
    pub fn create_if_not_exists(&mut self) -> Result<(), RelationError> {
        if self.store.exists() {
            self.open()
        } else {
            self.create()
        }
    }

    pub fn open(&mut self) -> Result<(), RelationError> {
        self.store.open()?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), RelationError> {
        self.store.close()?;
        Ok(())
    }

    /// Discard the table and all of its rows.
    pub fn drop(&mut self) -> Result<(), RelationError> {
        self.store.destroy()?;
        tracing::info!(table = %self.name, "Dropped heap table");
        Ok(())
    }

    /// Append a row, returning its location.
    ///
    /// The row must hold a value of the declared type for every column.
    pub fn insert(&mut self, row: &ValueDict) -> Result<RecordLocation, RelationError> {
        validate_row(&self.name, &self.columns, row)?;
        let record = marshal_row(row, &self.columns)?;

        let block_count = self.store.block_count()?;
        let mut block = if block_count == 0 {
            self.store.allocate_block()?
        } else {
            self.store.read_block(block_count - 1)?
        };

        let record_id = match block.add(&record) {
            Ok(id) => id,
            Err(BlockError::NoRoom { .. }) => {
                block = self.store.allocate_block()?;
                block.add(&record)?
            }
            Err(e) => return Err(e.into()),
        };
        self.store.write_block(&block)?;

        Ok(RecordLocation::new(block.id(), record_id))
    }

    /// Delete the row at `location`.
    pub fn del(&mut self, location: RecordLocation) -> Result<(), RelationError> {
        let mut block = self.store.read_block(location.block_id)?;
        block.delete(location.record_id)?;
        self.store.write_block(&block)?;
        Ok(())
    }

    /// The full row at `location`.
    pub fn get(&mut self, location: RecordLocation) -> Result<ValueDict, RelationError> {
        let block = self.store.read_block(location.block_id)?;
        Ok(unmarshal_row(block.get(location.record_id)?, &self.columns)?)
    }
}

impl<S: BlockStore> Relation for HeapTable<S> {
    type Handle = RecordLocation;

    fn table_name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn select(&mut self) -> Result<Vec<RecordLocation>, RelationError> {
        let mut handles = Vec::new();
        for block_id in self.store.block_ids()? {
            let block = self.store.read_block(block_id)?;
            handles.extend(
                block
                    .record_ids()
                    .into_iter()
                    .map(|record_id| RecordLocation::new(block_id, record_id)),
            );
        }
        Ok(handles)
    }

    fn project(
        &mut self,
        handle: &RecordLocation,
        columns: &[Identifier],
    ) -> Result<ValueDict, RelationError> {
        let row = self.get(*handle)?;
        restrict_row(&self.name, row, columns)
    }
}
