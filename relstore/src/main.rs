use relstore::storage::file::BlockFile;
use relstore::types::{Column, DataType, KeyValue, Value, ValueDict};
use relstore::{BTreeIndex, Catalog, HeapTable, Relation, StoreConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TABLE: &str = "foo";
const INDEX: &str = "fx";

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relstore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: data_directory={}, demo_rows={}, keep_files={}",
        config.data_directory.display(),
        config.demo_rows,
        config.keep_files
    );

    if let Err(e) = run(&config) {
        tracing::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

fn row(a: i32, b: i32) -> ValueDict {
    ValueDict::from([("a".into(), Value::Int(a)), ("b".into(), Value::Int(b))])
}

fn key(a: i32) -> ValueDict {
    ValueDict::from([("a".into(), Value::Int(a))])
}

fn run(config: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    let rows = i32::try_from(config.demo_rows)?;

    let catalog = Catalog::new(config.data_directory.clone());
    catalog.ensure_directory()?;

    let columns = vec![Column::new("a", DataType::Int), Column::new("b", DataType::Int)];
    let mut table = catalog.heap_table(TABLE, columns)?;
    let mut index = catalog.index(&table, INDEX, &["a"])?;

    // A previous run with keep_files set leaves its files behind
    if catalog.table_path(TABLE).exists() {
        tracing::warn!("Removing block files left by a previous run");
        index.drop()?;
        table.drop()?;
    }

    table.create()?;
    table.insert(&row(12, 99))?;
    table.insert(&row(88, 101))?;
    index.create(&mut table)?;

    for n in 0..rows {
        let location = table.insert(&row(100 + n, -n))?;
        index.insert(&mut table, location)?;
    }
    tracing::info!(
        rows = rows + 2,
        height = index.tree().height()?,
        "Loaded demo rows"
    );

    report_lookup(&mut table, &mut index, 12)?;
    report_lookup(&mut table, &mut index, 6)?;

    let last = 100 + rows - 1;
    let locations = index.range(Some(&key(100)), Some(&key(last)))?;
    let mut keys = Vec::with_capacity(locations.len());
    for location in &locations {
        let projected = table.project(location, &["a".into()])?;
        keys.push(projected.into_values().collect::<KeyValue>());
    }
    tracing::info!(
        min = 100,
        max = last,
        found = keys.len(),
        ascending = keys.windows(2).all(|w| w[0] < w[1]),
        "Range scan"
    );

    if config.keep_files {
        index.close()?;
        table.close()?;
        tracing::info!(
            "Kept block files in {}",
            catalog.data_directory().display()
        );
    } else {
        index.drop()?;
        table.drop()?;
    }
    Ok(())
}

fn report_lookup(
    table: &mut HeapTable<BlockFile>,
    index: &mut BTreeIndex<BlockFile>,
    a: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    let locations = index.lookup(&key(a))?;
    match locations.first() {
        Some(location) => {
            let found = table.get(*location)?;
            tracing::info!(key = a, row = ?found, "Lookup hit");
        }
        None => tracing::info!(key = a, "Lookup miss"),
    }
    Ok(())
}
