//! Test: deleting rows through the index and inserting them again.

use super::helpers::{TestCatalog, a_key, foo_row};
use crate::relation::{Relation, RelationError};
use crate::storage::btree::BTreeError;

#[test]
fn test_delete_half_then_reinsert() {
    let test = TestCatalog::new();
    let mut table = test.foo_table();
    let mut index = test.a_index(&table);
    index.create(&mut table).expect("create index");

    let mut locations = Vec::new();
    for a in 0..600 {
        let location = table.insert(&foo_row(a, a)).expect("insert");
        index.insert(&mut table, location).expect("index insert");
        locations.push(location);
    }
    let height_before = index.tree().height().expect("height");

    for (a, location) in (0..600).zip(&locations) {
        if a % 2 == 0 {
            index.del(&mut table, *location).expect("index delete");
            table.del(*location).expect("table delete");
        }
    }

    assert_eq!(table.select().expect("select").len(), 300);
    assert!(index.lookup(&a_key(0)).expect("lookup").is_empty());
    assert_eq!(index.lookup(&a_key(1)).expect("lookup"), vec![locations[1]]);
    assert_eq!(index.range(None, None).expect("range").len(), 300);
    // No merging: the tree keeps its height
    assert_eq!(index.tree().height().expect("height"), height_before);

    for a in (0..600).step_by(2) {
        let location = table.insert(&foo_row(a, -a)).expect("reinsert");
        index.insert(&mut table, location).expect("index reinsert");
    }

    let all = index.range(None, None).expect("range");
    assert_eq!(all.len(), 600);
    let rows: Vec<_> = all
        .iter()
        .map(|location| table.get(*location).expect("row"))
        .collect();
    for (a, row) in (0..600).zip(&rows) {
        let b = if a % 2 == 0 { -a } else { a };
        assert_eq!(*row, foo_row(a, b));
    }
}

#[test]
fn test_delete_missing_key_is_reported() {
    let test = TestCatalog::new();
    let mut table = test.foo_table();
    let location = table.insert(&foo_row(1, 1)).expect("insert");
    let mut index = test.a_index(&table);
    index.create(&mut table).expect("create index");

    index.del(&mut table, location).expect("first delete");
    assert!(matches!(
        index.del(&mut table, location),
        Err(RelationError::BTree(BTreeError::KeyNotFound(_)))
    ));
}
