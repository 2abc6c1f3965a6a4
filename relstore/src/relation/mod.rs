//! Relations: tables and indexes built on the storage engine.
//!
//! A `Relation` is anything rows can be selected from and projected out of.
//! Two table kinds implement it:
//! - `HeapTable`: rows appended to heap blocks, addressed by `RecordLocation`
//! - `BTreeTable`: rows stored in a clustered B-tree, addressed by their
//!   primary key
//!
//! A `BTreeIndex` is a unique secondary index over a relation whose handles
//! are heap locations. The index never owns its relation; callers pass it in
//! to every operation that needs to read rows.

mod heap;
mod index;
mod table;

pub use heap::HeapTable;
pub use index::BTreeIndex;
pub use table::BTreeTable;

use crate::storage::btree::{BTreeError, EncodingError};
use crate::storage::io::StorageError;
use crate::types::{Column, DataType, Identifier, KeyProfile, KeyValue, ValueDict, column_names};

/// A source of rows.
pub trait Relation {
    /// How a row of this relation is addressed.
    type Handle: Clone + std::fmt::Debug;

    fn table_name(&self) -> &str;

    /// Declared columns, in declaration order.
    fn columns(&self) -> &[Column];

    fn column_names(&self) -> Vec<Identifier> {
        column_names(self.columns())
    }

    /// Types of the named columns, in the order given.
    fn column_types(&self, columns: &[Identifier]) -> Result<KeyProfile, RelationError> {
        columns
            .iter()
            .map(|name| {
                self.columns()
                    .iter()
                    .find(|c| &c.name == name)
                    .map(|c| c.data_type)
                    .ok_or_else(|| RelationError::UnknownColumn {
                        table: self.table_name().to_owned(),
                        column: name.clone(),
                    })
            })
            .collect()
    }

    /// Handles of every row.
    fn select(&mut self) -> Result<Vec<Self::Handle>, RelationError>;

    /// The named columns of one row.
    fn project(
        &mut self,
        handle: &Self::Handle,
        columns: &[Identifier],
    ) -> Result<ValueDict, RelationError>;
}

/// Check that `row` has a value of the declared type for every column.
pub(crate) fn validate_row(
    table: &str,
    columns: &[Column],
    row: &ValueDict,
) -> Result<(), RelationError> {
    for column in columns {
        let value = row.get(&column.name).ok_or_else(|| RelationError::MissingColumn {
            table: table.to_owned(),
            column: column.name.clone(),
        })?;
        if value.data_type() != column.data_type {
            return Err(RelationError::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type,
                found: value.data_type(),
            });
        }
    }

    if let Some(unknown) = row.keys().find(|k| !columns.iter().any(|c| &c.name == *k)) {
        return Err(RelationError::UnknownColumn {
            table: table.to_owned(),
            column: unknown.clone(),
        });
    }
    Ok(())
}

/// Build a key from the named columns of `row`.
pub(crate) fn key_from_row(
    table: &str,
    key_columns: &[Identifier],
    row: &ValueDict,
) -> Result<KeyValue, RelationError> {
    key_columns
        .iter()
        .map(|name| {
            row.get(name)
                .cloned()
                .ok_or_else(|| RelationError::MissingColumn {
                    table: table.to_owned(),
                    column: name.clone(),
                })
        })
        .collect()
}

/// Keep only the named columns of `row`, failing on names it does not have.
pub(crate) fn restrict_row(
    table: &str,
    row: ValueDict,
    columns: &[Identifier],
) -> Result<ValueDict, RelationError> {
    columns
        .iter()
        .map(|name| {
            row.get(name)
                .cloned()
                .map(|value| (name.clone(), value))
                .ok_or_else(|| RelationError::UnknownColumn {
                    table: table.to_owned(),
                    column: name.clone(),
                })
        })
        .collect()
}

/// Errors that can occur in the relation layer.
#[derive(Debug)]
pub enum RelationError {
    /// Block store error.
    Storage(StorageError),
    /// A row could not be marshaled.
    Encoding(EncodingError),
    /// B-tree error (duplicate key, missing key, corruption).
    BTree(BTreeError),
    /// A column name the relation does not declare.
    UnknownColumn { table: Identifier, column: Identifier },
    /// A row lacks a declared column.
    MissingColumn { table: Identifier, column: Identifier },
    /// A value does not match its column's declared type.
    TypeMismatch {
        column: Identifier,
        expected: DataType,
        found: DataType,
    },
    /// Only unique indexes are supported.
    NonUniqueIndex(Identifier),
    /// A table or index name that cannot name a block file.
    InvalidName(Identifier),
}

impl std::fmt::Display for RelationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::Encoding(e) => write!(f, "encoding error: {e}"),
            Self::BTree(e) => write!(f, "b-tree error: {e}"),
            Self::UnknownColumn { table, column } => {
                write!(f, "table {table} has no column {column}")
            }
            Self::MissingColumn { table, column } => {
                write!(f, "row for table {table} is missing column {column}")
            }
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "column {column} expects {expected}, got a {found} value"
            ),
            Self::NonUniqueIndex(name) => {
                write!(f, "index {name}: only unique indexes are supported")
            }
            Self::InvalidName(name) => write!(f, "invalid relation name: {name:?}"),
        }
    }
}

impl std::error::Error for RelationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Encoding(e) => Some(e),
            Self::BTree(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for RelationError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<EncodingError> for RelationError {
    fn from(e: EncodingError) -> Self {
        Self::Encoding(e)
    }
}

impl From<BTreeError> for RelationError {
    fn from(e: BTreeError) -> Self {
        Self::BTree(e)
    }
}

impl From<crate::storage::block::BlockError> for RelationError {
    fn from(e: crate::storage::block::BlockError) -> Self {
        Self::Storage(StorageError::Block(e))
    }
}
