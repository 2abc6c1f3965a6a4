//! Typed scalar values and composite search keys.
//!
//! A `KeyValue` is an ordered tuple of `Value`s, one per indexed column. Keys
//! are totally ordered component by component:
//! - INTEGER compares numerically
//! - TEXT compares byte-wise (lexicographic)
//! - BOOLEAN compares as 0/1

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A column or table name.
pub type Identifier = String;

/// A row, or part of one, keyed by column name.
pub type ValueDict = BTreeMap<Identifier, Value>;

/// The ordered column types of a key (or row), fixing its binary layout.
pub type KeyProfile = Vec<DataType>;

/// Column data types supported by the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DataType {
    Int = 0x01,
    Text = 0x02,
    Boolean = 0x03,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// A single typed column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Text(String),
    Boolean(bool),
}

impl Value {
    /// Get the data type of this value.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::Text(_) => DataType::Text,
            Self::Boolean(_) => DataType::Boolean,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::Boolean(a), Self::Boolean(b)) => u8::from(*a).cmp(&u8::from(*b)),
            // Mixed types never share a key position under one profile.
            _ => self.data_type().cmp(&other.data_type()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// A search key: one value per indexed column, in index-column order.
///
/// # Invariants
///
/// - Immutable once constructed.
/// - Equal only if every component is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyValue(Vec<Value>);

impl KeyValue {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Get the key components.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len() is not const-stable
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::is_empty() is not const-stable
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(self, other)
    }
}

impl From<Vec<Value>> for KeyValue {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for KeyValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// Compare two keys component-wise.
///
/// A key that is a strict prefix of the other sorts first.
#[must_use]
pub fn compare_keys(a: &KeyValue, b: &KeyValue) -> Ordering {
    for (x, y) in a.0.iter().zip(b.0.iter()) {
        match x.cmp(y) {
            Ordering::Equal => {}
            unequal => return unequal,
        }
    }
    a.0.len().cmp(&b.0.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(values: Vec<Value>) -> KeyValue {
        KeyValue::new(values)
    }

    #[test]
    fn test_integer_order_is_numeric() {
        assert!(key(vec![Value::Int(-5)]) < key(vec![Value::Int(3)]));
        assert!(key(vec![Value::Int(100)]) > key(vec![Value::Int(99)]));
        assert_eq!(
            compare_keys(&key(vec![Value::Int(7)]), &key(vec![Value::Int(7)])),
            Ordering::Equal
        );
    }

    #[test]
    fn test_text_order_is_bytewise() {
        assert!(key(vec!["B".into()]) < key(vec!["a".into()]));
        assert!(key(vec!["ab".into()]) < key(vec!["abc".into()]));
        assert!(key(vec!["".into()]) < key(vec!["a".into()]));
    }

    #[test]
    fn test_boolean_order() {
        assert!(key(vec![false.into()]) < key(vec![true.into()]));
    }

    #[test]
    fn test_composite_order_is_componentwise() {
        let a = key(vec![Value::Int(1), "zzz".into()]);
        let b = key(vec![Value::Int(2), "aaa".into()]);
        let c = key(vec![Value::Int(2), "aab".into()]);

        assert!(a < b);
        assert!(b < c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_key_display() {
        let k = key(vec![Value::Int(12), "x".into(), true.into()]);
        assert_eq!(k.to_string(), "(12, \"x\", true)");
    }
}
