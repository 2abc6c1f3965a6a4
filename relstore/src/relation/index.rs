//! Unique secondary indexes.
//!
//! A `BTreeIndex` maps the values of its key columns to the location of the
//! row in its relation's heap. The index is kept in its own block store,
//! separate from the relation it indexes.

use crate::relation::{Relation, RelationError, key_from_row};
use crate::storage::btree::{BTree, IndexTree, LocatorCodec};
use crate::storage::io::BlockStore;
use crate::types::{Identifier, KeyValue, RecordLocation, ValueDict};

/// A unique B-tree index over a relation addressed by `RecordLocation`.
pub struct BTreeIndex<S: BlockStore> {
    name: Identifier,
    table_name: Identifier,
    key_columns: Vec<Identifier>,
    tree: IndexTree<S>,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Create a closed handle for an index named `name` over `key_columns`
    /// of `relation`.
    ///
    /// # Errors
    ///
    /// Returns an error if `unique` is false or a key column is unknown.
    pub fn new<R>(
        relation: &R,
        name: &str,
        key_columns: &[&str],
        unique: bool,
        store: S,
    ) -> Result<Self, RelationError>
    where
        R: Relation<Handle = RecordLocation>,
    {
        if !unique {
            return Err(RelationError::NonUniqueIndex(name.to_owned()));
        }
        let key_columns: Vec<Identifier> = key_columns.iter().map(|&c| c.to_owned()).collect();
        let profile = relation.column_types(&key_columns)?;

        Ok(Self {
            name: name.to_owned(),
            table_name: relation.table_name().to_owned(),
            key_columns,
            tree: BTree::new(store, profile, LocatorCodec),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn key_columns(&self) -> &[Identifier] {
        &self.key_columns
    }

    /// The underlying tree, for inspection.
    #[must_use]
    pub const fn tree(&self) -> &IndexTree<S> {
        &self.tree
    }

    // ========== Lifecycle ==========

    /// Build the index over every row currently in `relation`.
    ///
    /// This is all-or-nothing: if any row fails to load (for example a
    /// duplicate key), the partially built index is dropped and the error is
    /// returned.
    pub fn create<R>(&mut self, relation: &mut R) -> Result<(), RelationError>
    where
        R: Relation<Handle = RecordLocation>,
    {
        self.tree.create()?;

        match self.bulk_load(relation) {
            Ok(rows) => {
                tracing::info!(
                    index = %self.name,
                    table = %self.table_name,
                    rows,
                    "Created index"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    index = %self.name,
                    error = %e,
                    "Failed to build index, dropping it"
                );
                if let Err(drop_err) = self.tree.drop() {
                    tracing::error!(index = %self.name, error = %drop_err, "Failed to drop index");
                }
                Err(e)
            }
        }
    }

    fn bulk_load<R>(&mut self, relation: &mut R) -> Result<usize, RelationError>
    where
        R: Relation<Handle = RecordLocation>,
    {
        let handles = relation.select()?;
        for handle in &handles {
            self.insert(relation, *handle)?;
        }
        Ok(handles.len())
    }

    /// Open the index. Opening an open index is a no-op.
    pub fn open(&mut self) -> Result<(), RelationError> {
        self.tree.open()?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), RelationError> {
        self.tree.close()?;
        Ok(())
    }

    /// Discard the index. The relation is not touched.
    pub fn drop(&mut self) -> Result<(), RelationError> {
        self.tree.drop()?;
        tracing::info!(index = %self.name, "Dropped index");
        Ok(())
    }

    // ========== Queries ==========

    /// Locations of rows whose key columns equal `key`.
    pub fn lookup(&mut self, key: &ValueDict) -> Result<Vec<RecordLocation>, RelationError> {
        let key = self.key_of(key)?;
        Ok(self.tree.lookup(&key)?)
    }

    /// Locations of rows with `min <= key <= max`, in key order.
    pub fn range(
        &mut self,
        min: Option<&ValueDict>,
        max: Option<&ValueDict>,
    ) -> Result<Vec<RecordLocation>, RelationError> {
        let min = min.map(|dict| self.key_of(dict)).transpose()?;
        let max = max.map(|dict| self.key_of(dict)).transpose()?;
        let entries = self.tree.range(min.as_ref(), max.as_ref())?;
        Ok(entries.into_iter().map(|e| e.value).collect())
    }

    // ========== Mutations ==========

    /// Index the row at `handle`, which must already be in `relation`.
    pub fn insert<R>(&mut self, relation: &mut R, handle: RecordLocation) -> Result<(), RelationError>
    where
        R: Relation<Handle = RecordLocation>,
    {
        let row = relation.project(&handle, &self.key_columns)?;
        let key = self.key_of(&row)?;
        self.tree.insert(key, handle)?;
        Ok(())
    }

    /// Remove the row at `handle` from the index.
    pub fn del<R>(&mut self, relation: &mut R, handle: RecordLocation) -> Result<(), RelationError>
    where
        R: Relation<Handle = RecordLocation>,
    {
        let row = relation.project(&handle, &self.key_columns)?;
        let key = self.key_of(&row)?;
        self.tree.delete(&key)?;
        Ok(())
    }

    fn key_of(&self, dict: &ValueDict) -> Result<KeyValue, RelationError> {
        key_from_row(&self.table_name, &self.key_columns, dict)
    }
}
