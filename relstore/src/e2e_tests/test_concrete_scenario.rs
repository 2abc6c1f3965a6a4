//! Test: two rows, an index built over them, then a thousand more rows
//! maintained through the index.

use super::helpers::{TestCatalog, a_key, foo_row};
use crate::relation::{BTreeIndex, HeapTable, Relation};
use crate::storage::file::BlockFile;
use crate::types::Value;

fn range_keys(
    index: &mut BTreeIndex<BlockFile>,
    table: &mut HeapTable<BlockFile>,
    min: Option<i32>,
    max: Option<i32>,
) -> Vec<Value> {
    let min = min.map(a_key);
    let max = max.map(a_key);
    index
        .range(min.as_ref(), max.as_ref())
        .expect("range")
        .iter()
        .map(|location| table.get(*location).expect("row")["a"].clone())
        .collect()
}

#[test]
fn test_lookup_and_range_over_indexed_heap() {
    let test = TestCatalog::new();
    let mut table = test.foo_table();
    table.insert(&foo_row(12, 99)).expect("insert 12");
    table.insert(&foo_row(88, 101)).expect("insert 88");

    let mut index = test.a_index(&table);
    index.create(&mut table).expect("create index");

    for n in 0..1000 {
        let location = table.insert(&foo_row(100 + n, -n)).expect("insert");
        index.insert(&mut table, location).expect("index insert");
    }
    assert!(index.tree().height().expect("height") > 1);

    let hits = index.lookup(&a_key(12)).expect("lookup 12");
    assert_eq!(hits.len(), 1);
    assert_eq!(table.get(hits[0]).expect("row"), foo_row(12, 99));

    assert!(index.lookup(&a_key(6)).expect("lookup 6").is_empty());

    let locations = index
        .range(Some(&a_key(100)), Some(&a_key(1099)))
        .expect("range");
    assert_eq!(locations.len(), 1000);

    let mut expected = 100;
    for location in &locations {
        let row = table.project(location, &["a".into(), "b".into()]).expect("project");
        assert_eq!(row["a"], Value::Int(expected));
        assert_eq!(row["b"], Value::Int(100 - expected));
        expected += 1;
    }
}

#[test]
fn test_open_ended_ranges() {
    let test = TestCatalog::new();
    let mut table = test.foo_table();
    for a in [5, 1, 9, 3, 7] {
        table.insert(&foo_row(a, a * 10)).expect("insert");
    }
    let mut index = test.a_index(&table);
    index.create(&mut table).expect("create index");

    let ints = |values: &[i32]| values.iter().map(|&v| Value::Int(v)).collect::<Vec<_>>();
    assert_eq!(range_keys(&mut index, &mut table, None, None), ints(&[1, 3, 5, 7, 9]));
    assert_eq!(range_keys(&mut index, &mut table, Some(4), None), ints(&[5, 7, 9]));
    assert_eq!(range_keys(&mut index, &mut table, None, Some(5)), ints(&[1, 3, 5]));
    assert!(range_keys(&mut index, &mut table, Some(10), None).is_empty());
    assert!(range_keys(&mut index, &mut table, Some(6), Some(4)).is_empty());
}
