//! Test: a clustered table under shuffled inserts, updates and deletes.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::helpers::TestCatalog;
use crate::relation::Relation;
use crate::types::{Column, DataType, KeyValue, Value, ValueDict};

fn columns() -> Vec<Column> {
    vec![
        Column::new("region", DataType::Text),
        Column::new("id", DataType::Int),
        Column::new("label", DataType::Text),
        Column::new("open", DataType::Boolean),
    ]
}

fn row(region: &str, id: i32) -> ValueDict {
    ValueDict::from([
        ("region".into(), region.into()),
        ("id".into(), Value::Int(id)),
        ("label".into(), format!("{region}-{id}").into()),
        ("open".into(), (id % 4 == 0).into()),
    ])
}

fn key(region: &str, id: i32) -> KeyValue {
    KeyValue::new(vec![region.into(), Value::Int(id)])
}

#[test]
fn test_shuffled_composite_keys() {
    let test = TestCatalog::new();
    let mut table = test
        .catalog
        .btree_table("sites", columns(), &["region", "id"])
        .expect("table");
    table.create().expect("create");

    let mut keys: Vec<(&str, i32)> = ["north", "east", "south"]
        .into_iter()
        .flat_map(|region| (0..700).map(move |id| (region, id)))
        .collect();
    keys.shuffle(&mut StdRng::seed_from_u64(7));
    for &(region, id) in &keys {
        table.insert(&row(region, id)).expect("insert");
    }

    assert!(table.tree().height().expect("height") > 1);
    let all = table.select().expect("select");
    assert_eq!(all.len(), 2100);
    assert!(all.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(all[0], key("east", 0));
    assert_eq!(all[2099], key("south", 699));

    let open_in_north = table
        .select_where(Some(&ValueDict::from([
            ("region".into(), "north".into()),
            ("open".into(), true.into()),
        ])))
        .expect("select open");
    assert_eq!(open_in_north.len(), 175);

    let label = table
        .project(&key("south", 42), &["label".into()])
        .expect("project");
    assert_eq!(label["label"], Value::from("south-42"));
}

#[test]
fn test_update_moves_and_delete_removes() {
    let test = TestCatalog::new();
    let mut table = test
        .catalog
        .btree_table("sites", columns(), &["region", "id"])
        .expect("table");
    table.create().expect("create");
    for id in 0..50 {
        table.insert(&row("west", id)).expect("insert");
    }

    let moved = table
        .update(
            &key("west", 10),
            &ValueDict::from([("region".into(), "east".into())]),
        )
        .expect("update");
    assert_eq!(moved, key("east", 10));
    assert_eq!(table.row(&moved).expect("row")["label"], Value::from("west-10"));
    assert_eq!(table.select().expect("select")[0], moved);

    for id in (0..50).filter(|id| *id != 10) {
        table.del(&key("west", id)).expect("delete");
    }
    assert_eq!(table.select().expect("select"), vec![moved]);

    table.drop().expect("drop");
    assert!(!test.catalog.table_path("sites").exists());
}
