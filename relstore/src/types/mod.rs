//! Core value, key and identifier types shared by the storage engine and
//! the relation layer.

pub mod column;
pub mod ids;
pub mod value;

pub use column::{Column, column_names, column_types};
pub use ids::{BlockId, RecordId, RecordLocation};
pub use value::{DataType, Identifier, KeyProfile, KeyValue, Value, ValueDict, compare_keys};
