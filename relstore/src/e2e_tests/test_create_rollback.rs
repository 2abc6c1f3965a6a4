//! Test: a failed index build leaves no index behind and the table intact.

use super::helpers::{TestCatalog, a_key, foo_row};
use crate::relation::{Relation, RelationError};
use crate::storage::btree::BTreeError;

#[test]
fn test_duplicate_key_rolls_back_index() {
    let test = TestCatalog::new();
    let mut table = test.foo_table();
    for a in [3, 1, 4, 1, 5] {
        table.insert(&foo_row(a, 0)).expect("insert");
    }

    let mut index = test.a_index(&table);
    let result = index.create(&mut table);
    assert!(matches!(
        result,
        Err(RelationError::BTree(BTreeError::DuplicateKey(_)))
    ));
    assert!(!test.catalog.index_path("foo", "fx").exists());
    assert!(matches!(
        index.lookup(&a_key(3)),
        Err(RelationError::BTree(BTreeError::NotOpen))
    ));

    // The table is untouched and a retry succeeds once the duplicate is gone
    let rows = table.select().expect("select");
    assert_eq!(rows.len(), 5);
    table.del(rows[3]).expect("delete duplicate");

    let mut index = test.a_index(&table);
    index.create(&mut table).expect("create index");
    assert_eq!(index.range(None, None).expect("range").len(), 4);
    assert_eq!(index.lookup(&a_key(1)).expect("lookup"), vec![rows[1]]);
}
