//! Names and places the block files of tables and indexes.
//!
//! A `Catalog` owns one data directory. Every relation gets its own block
//! file inside it:
//!
//! - tables: `{data_directory}/{table}.db`
//! - indexes: `{data_directory}/{table}-{index}.db`
//!
//! The catalog only builds closed handles. Creating, opening and dropping
//! them is up to the caller.

use std::path::{Path, PathBuf};

use crate::relation::{BTreeIndex, BTreeTable, HeapTable, Relation, RelationError};
use crate::storage::file::BlockFile;
use crate::storage::io::StorageError;
use crate::types::{Column, RecordLocation};

/// Maximum length of a table or index name.
const MAX_NAME_LENGTH: usize = 128;

/// The data directory holding every relation's block file.
#[derive(Debug, Clone)]
pub struct Catalog {
    data_directory: PathBuf,
}

impl Catalog {
    #[must_use]
    pub const fn new(data_directory: PathBuf) -> Self {
        Self { data_directory }
    }

    #[must_use]
    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_directory(&self) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.data_directory)?;
        Ok(())
    }

    // ========== Paths ==========

    /// Path of the block file for `table`.
    #[must_use]
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_directory.join(format!("{table}.db"))
    }

    /// Path of the block file for `index` on `table`.
    #[must_use]
    pub fn index_path(&self, table: &str, index: &str) -> PathBuf {
        self.data_directory.join(format!("{table}-{index}.db"))
    }

    // ========== Relations ==========

    /// A closed heap table stored in this catalog.
    pub fn heap_table(
        &self,
        name: &str,
        columns: Vec<Column>,
    ) -> Result<HeapTable<BlockFile>, RelationError> {
        validate_name(name)?;
        Ok(HeapTable::new(
            name,
            columns,
            BlockFile::new(&self.table_path(name)),
        ))
    }

    /// A closed clustered table stored in this catalog.
    pub fn btree_table(
        &self,
        name: &str,
        columns: Vec<Column>,
        key_columns: &[&str],
    ) -> Result<BTreeTable<BlockFile>, RelationError> {
        validate_name(name)?;
        BTreeTable::new(
            name,
            columns,
            key_columns,
            BlockFile::new(&self.table_path(name)),
        )
    }

    /// A closed unique index named `name` over `key_columns` of `relation`.
    pub fn index<R>(
        &self,
        relation: &R,
        name: &str,
        key_columns: &[&str],
    ) -> Result<BTreeIndex<BlockFile>, RelationError>
    where
        R: Relation<Handle = RecordLocation>,
    {
        validate_name(name)?;
        let path = self.index_path(relation.table_name(), name);
        BTreeIndex::new(relation, name, key_columns, true, BlockFile::new(&path))
    }
}

/// Check that `name` can be used as part of a file name.
///
/// Names must be non-empty, at most `MAX_NAME_LENGTH` bytes, and made of
/// ASCII alphanumerics and underscores. Hyphens are reserved as the
/// table/index separator.
pub fn validate_name(name: &str) -> Result<(), RelationError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RelationError::InvalidName(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Value, ValueDict};
    use tempfile::tempdir;

    fn columns() -> Vec<Column> {
        vec![
            Column::new("a", DataType::Int),
            Column::new("b", DataType::Text),
        ]
    }

    #[test]
    fn test_paths() {
        let catalog = Catalog::new(PathBuf::from("/data"));
        assert_eq!(catalog.table_path("foo"), PathBuf::from("/data/foo.db"));
        assert_eq!(
            catalog.index_path("foo", "fx"),
            PathBuf::from("/data/foo-fx.db")
        );
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("foo_2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("foo-bar").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_relations_land_in_their_files() {
        let dir = tempdir().expect("create temp dir");
        let catalog = Catalog::new(dir.path().join("nested"));
        catalog.ensure_directory().expect("create data directory");

        let mut table = catalog.heap_table("foo", columns()).expect("table");
        table.create().expect("create table");
        table
            .insert(&ValueDict::from([
                ("a".into(), Value::Int(1)),
                ("b".into(), "one".into()),
            ]))
            .expect("insert");

        let mut index = catalog.index(&table, "fx", &["a"]).expect("index");
        index.create(&mut table).expect("create index");

        let mut clustered = catalog
            .btree_table("bar", columns(), &["a"])
            .expect("clustered table");
        clustered.create().expect("create clustered table");

        assert!(catalog.table_path("foo").exists());
        assert!(catalog.index_path("foo", "fx").exists());
        assert!(catalog.table_path("bar").exists());

        index.drop().expect("drop index");
        assert!(!catalog.index_path("foo", "fx").exists());
        assert!(catalog.table_path("foo").exists());
    }

    #[test]
    fn test_rejects_bad_names() {
        let catalog = Catalog::new(PathBuf::from("/data"));
        assert!(matches!(
            catalog.heap_table("a-b", columns()),
            Err(RelationError::InvalidName(_))
        ));
    }
}
