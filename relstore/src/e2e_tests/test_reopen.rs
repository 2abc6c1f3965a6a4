//! Test: tables and indexes survive closing and reopening their files.

use super::helpers::{TestCatalog, a_key, foo_columns, foo_row};
use crate::relation::Relation;

#[test]
fn test_heap_and_index_reopen() {
    let test = TestCatalog::new();

    let (first, last) = {
        let mut table = test.foo_table();
        let mut index = test.a_index(&table);
        index.create(&mut table).expect("create index");

        let mut locations = Vec::new();
        for a in (0..800).rev() {
            let location = table.insert(&foo_row(a, a * 2)).expect("insert");
            index.insert(&mut table, location).expect("index insert");
            locations.push(location);
        }
        index.close().expect("close index");
        table.close().expect("close table");
        (locations[799], locations[0])
    };

    let mut table = test
        .catalog
        .heap_table("foo", foo_columns())
        .expect("table");
    table.create_if_not_exists().expect("open table");
    let mut index = test.catalog.index(&table, "fx", &["a"]).expect("index");
    index.open().expect("open index");

    assert!(index.tree().height().expect("height") > 1);
    assert_eq!(index.lookup(&a_key(0)).expect("lookup"), vec![first]);
    assert_eq!(index.lookup(&a_key(799)).expect("lookup"), vec![last]);
    assert_eq!(table.get(first).expect("row"), foo_row(0, 0));

    let all = index.range(None, None).expect("range");
    assert_eq!(all.len(), 800);
    assert_eq!(table.select().expect("select").len(), 800);

    // Maintenance keeps working after the reopen
    let location = table.insert(&foo_row(1000, 1)).expect("insert");
    index.insert(&mut table, location).expect("index insert");
    assert_eq!(index.lookup(&a_key(1000)).expect("lookup"), vec![location]);
}
