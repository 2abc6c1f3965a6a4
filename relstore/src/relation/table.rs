//! Primary-key organized tables.
//!
//! A `BTreeTable` keeps its rows in a clustered B-tree: the primary key
//! columns form the tree key, and the remaining columns are stored in the
//! leaf next to it. There is no separate heap, so a row is addressed by its
//! key.

use crate::relation::{Relation, RelationError, key_from_row, restrict_row, validate_row};
use crate::storage::btree::{BTree, BTreeError, ClusteredTree, RowCodec};
use crate::storage::io::BlockStore;
use crate::types::{Column, Identifier, KeyValue, ValueDict};

/// A table stored in a clustered B-tree keyed by its primary key.
pub struct BTreeTable<S: BlockStore> {
    name: Identifier,
    columns: Vec<Column>,
    key_columns: Vec<Identifier>,
    tree: ClusteredTree<S>,
}

impl<S: BlockStore> BTreeTable<S> {
    /// Create a closed handle for a table with the given columns and
    /// primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if a primary key column is not a declared column.
    pub fn new(
        name: &str,
        columns: Vec<Column>,
        key_columns: &[&str],
        store: S,
    ) -> Result<Self, RelationError> {
        let mut profile = Vec::with_capacity(key_columns.len());
        for &key_column in key_columns {
            let column = columns.iter().find(|c| c.name == key_column).ok_or_else(|| {
                RelationError::UnknownColumn {
                    table: name.to_owned(),
                    column: key_column.to_owned(),
                }
            })?;
            profile.push(column.data_type);
        }

        let non_key: Vec<Column> = columns
            .iter()
            .filter(|c| !key_columns.contains(&c.name.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            name: name.to_owned(),
            key_columns: key_columns.iter().map(|&c| c.to_owned()).collect(),
            columns,
            tree: BTree::new(store, profile, RowCodec::new(non_key)),
        })
    }

    #[must_use]
    pub fn key_columns(&self) -> &[Identifier] {
        &self.key_columns
    }

    /// The underlying tree, for inspection.
    #[must_use]
    pub const fn tree(&self) -> &ClusteredTree<S> {
        &self.tree
    }

    // ========== Lifecycle ==========

    /// Create an empty table and open it.
    pub fn create(&mut self) -> Result<(), RelationError> {
        self.tree.create()?;
        tracing::info!(table = %self.name, "Created clustered table");
        Ok(())
    }

    /// Open the table, creating it first if it does not exist.
    pub fn create_if_not_exists(&mut self) -> Result<(), RelationError> {
        if self.tree.exists() {
            self.open()
        } else {
            self.create()
        }
    }

    pub fn open(&mut self) -> Result<(), RelationError> {
        self.tree.open()?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), RelationError> {
        self.tree.close()?;
        Ok(())
    }

    /// Discard the table and all of its rows.
    pub fn drop(&mut self) -> Result<(), RelationError> {
        self.tree.drop()?;
        tracing::info!(table = %self.name, "Dropped clustered table");
        Ok(())
    }

    // ========== Mutations ==========

    /// Insert a row, returning its primary key.
    ///
    /// Fails with a duplicate key error if a row with the same key exists.
    pub fn insert(&mut self, row: &ValueDict) -> Result<KeyValue, RelationError> {
        validate_row(&self.name, &self.columns, row)?;
        let key = key_from_row(&self.name, &self.key_columns, row)?;
        let value = self.non_key_values(row);
        self.tree.insert(key.clone(), value)?;
        Ok(key)
    }

    /// Replace some columns of the row with `key`, returning its (possibly
    /// changed) key.
    ///
    /// The row is deleted and reinserted. If the reinsert fails, the old row
    /// is put back before the error is returned.
    pub fn update(
        &mut self,
        key: &KeyValue,
        new_values: &ValueDict,
    ) -> Result<KeyValue, RelationError> {
        let old_row = self.row(key)?;
        let mut row = old_row.clone();
        row.extend(new_values.iter().map(|(k, v)| (k.clone(), v.clone())));
        validate_row(&self.name, &self.columns, &row)?;

        self.tree.delete(key)?;
        match self.insert(&row) {
            Ok(new_key) => Ok(new_key),
            Err(e) => {
                self.insert(&old_row)?;
                Err(e)
            }
        }
    }

    /// Delete the row with `key`.
    pub fn del(&mut self, key: &KeyValue) -> Result<(), RelationError> {
        self.tree.delete(key)?;
        Ok(())
    }

    // ========== Queries ==========

    /// Keys of the rows matching every column value in `filter`, in key
    /// order. With no filter every row matches.
    ///
    /// A filter that fixes every primary key column reads at most one leaf;
    /// otherwise the whole leaf chain is scanned.
    pub fn select_where(
        &mut self,
        filter: Option<&ValueDict>,
    ) -> Result<Vec<KeyValue>, RelationError> {
        let exact = filter.and_then(|f| key_from_row(&self.name, &self.key_columns, f).ok());
        let entries = self.tree.range(exact.as_ref(), exact.as_ref())?;

        let mut keys = Vec::new();
        for entry in entries {
            let row = self.full_row(&entry.key, &entry.value);
            let matches = filter.is_none_or(|f| f.iter().all(|(k, v)| row.get(k) == Some(v)));
            if matches {
                keys.push(entry.key);
            }
        }
        Ok(keys)
    }

    /// The full row with `key`, read from the one leaf that can hold it.
    pub fn row(&mut self, key: &KeyValue) -> Result<ValueDict, RelationError> {
        let value = self
            .tree
            .lookup(key)?
            .into_iter()
            .next()
            .ok_or_else(|| BTreeError::KeyNotFound(key.clone()))?;
        Ok(self.full_row(key, &value))
    }

    fn full_row(&self, key: &KeyValue, value: &ValueDict) -> ValueDict {
        let mut row = value.clone();
        row.extend(
            self.key_columns
                .iter()
                .cloned()
                .zip(key.values().iter().cloned()),
        );
        row
    }

    fn non_key_values(&self, row: &ValueDict) -> ValueDict {
        row.iter()
            .filter(|(name, _)| !self.key_columns.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl<S: BlockStore> Relation for BTreeTable<S> {
    type Handle = KeyValue;

    fn table_name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn select(&mut self) -> Result<Vec<KeyValue>, RelationError> {
        self.select_where(None)
    }

    fn project(
        &mut self,
        handle: &KeyValue,
        columns: &[Identifier],
    ) -> Result<ValueDict, RelationError> {
        let row = self.row(handle)?;
        restrict_row(&self.name, row, columns)
    }
}
