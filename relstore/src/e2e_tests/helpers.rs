//! Common helpers for end-to-end tests.

use tempfile::TempDir;

use crate::catalog::Catalog;
use crate::relation::{BTreeIndex, HeapTable};
use crate::storage::file::BlockFile;
use crate::types::{Column, DataType, Value, ValueDict};

/// A catalog in a fresh temporary directory, removed on drop.
pub struct TestCatalog {
    pub catalog: Catalog,
    _dir: TempDir,
}

impl TestCatalog {
    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::expect_used)]
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self {
            catalog: Catalog::new(dir.path().to_path_buf()),
            _dir: dir,
        }
    }

    /// A created, empty `foo(a INT, b INT)` heap table.
    #[allow(clippy::expect_used)]
    pub fn foo_table(&self) -> HeapTable<BlockFile> {
        let mut table = self.catalog.heap_table("foo", foo_columns()).expect("table");
        table.create().expect("create table");
        table
    }

    /// An unbuilt unique index on `foo.a`.
    #[allow(clippy::expect_used)]
    pub fn a_index(&self, table: &HeapTable<BlockFile>) -> BTreeIndex<BlockFile> {
        self.catalog.index(table, "fx", &["a"]).expect("index")
    }
}

pub fn foo_columns() -> Vec<Column> {
    vec![Column::new("a", DataType::Int), Column::new("b", DataType::Int)]
}

pub fn foo_row(a: i32, b: i32) -> ValueDict {
    ValueDict::from([("a".into(), Value::Int(a)), ("b".into(), Value::Int(b))])
}

pub fn a_key(a: i32) -> ValueDict {
    ValueDict::from([("a".into(), Value::Int(a))])
}
