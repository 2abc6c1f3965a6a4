//! Column declarations.

use crate::types::value::{DataType, Identifier};

/// A declared column: name plus data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: Identifier,
    pub data_type: DataType,
}

impl Column {
    #[must_use]
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_owned(),
            data_type,
        }
    }
}

/// Names of the given columns, in declaration order.
#[must_use]
pub fn column_names(columns: &[Column]) -> Vec<Identifier> {
    columns.iter().map(|c| c.name.clone()).collect()
}

/// Data types of the given columns, in declaration order.
#[must_use]
pub fn column_types(columns: &[Column]) -> Vec<DataType> {
    columns.iter().map(|c| c.data_type).collect()
}
