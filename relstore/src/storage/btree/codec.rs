//! Binary marshaling for B-tree records.
//!
//! Keys and rows use the same per-column encoding, concatenated in column
//! order with no padding:
//! - INT: 4 bytes, signed little-endian
//! - TEXT: 2-byte little-endian length, then that many UTF-8 bytes
//! - BOOLEAN: 1 byte (0 or 1)
//!
//! Block pointers are 4 bytes (little-endian u32). Row locators are 6 bytes:
//! block id (u32) followed by record id (u16).

use crate::storage::block::MAX_RECORD_SIZE;
use crate::types::{
    BlockId, Column, DataType, Identifier, KeyValue, RecordLocation, Value, ValueDict,
    column_types,
};

/// Size of a marshaled block id.
pub const BLOCK_ID_SIZE: usize = 4;

/// Size of a marshaled row locator.
pub const LOCATOR_SIZE: usize = BLOCK_ID_SIZE + 2;

/// Marshal a key according to its type profile.
pub fn marshal_key(key: &KeyValue, profile: &[DataType]) -> Result<Vec<u8>, EncodingError> {
    if key.len() != profile.len() {
        return Err(EncodingError::ArityMismatch {
            expected: profile.len(),
            found: key.len(),
        });
    }
    marshal_values(key.values().iter(), profile)
}

/// Unmarshal a key according to its type profile.
pub fn unmarshal_key(bytes: &[u8], profile: &[DataType]) -> Result<KeyValue, EncodingError> {
    unmarshal_values(bytes, profile).map(KeyValue::new)
}

/// Marshal the named columns of a row, in column order.
pub fn marshal_row(row: &ValueDict, columns: &[Column]) -> Result<Vec<u8>, EncodingError> {
    let values = columns
        .iter()
        .map(|c| {
            row.get(&c.name)
                .ok_or_else(|| EncodingError::MissingColumn(c.name.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let profile = column_types(columns);
    marshal_values(values.into_iter(), &profile)
}

/// Unmarshal a row produced by `marshal_row` with the same columns.
pub fn unmarshal_row(bytes: &[u8], columns: &[Column]) -> Result<ValueDict, EncodingError> {
    let profile = column_types(columns);
    let values = unmarshal_values(bytes, &profile)?;
    Ok(columns
        .iter()
        .map(|c| c.name.clone())
        .zip(values)
        .collect())
}

#[must_use]
pub const fn marshal_block_id(block_id: BlockId) -> [u8; BLOCK_ID_SIZE] {
    block_id.to_le_bytes()
}

pub fn unmarshal_block_id(bytes: &[u8]) -> Result<BlockId, EncodingError> {
    let array: [u8; BLOCK_ID_SIZE] =
        bytes
            .try_into()
            .map_err(|_| EncodingError::InvalidLength {
                expected: BLOCK_ID_SIZE,
                found: bytes.len(),
            })?;
    Ok(BlockId::from_le_bytes(array))
}

#[must_use]
pub fn marshal_locator(location: RecordLocation) -> [u8; LOCATOR_SIZE] {
    let mut bytes = [0u8; LOCATOR_SIZE];
    bytes[..BLOCK_ID_SIZE].copy_from_slice(&location.block_id.to_le_bytes());
    bytes[BLOCK_ID_SIZE..].copy_from_slice(&location.record_id.to_le_bytes());
    bytes
}

pub fn unmarshal_locator(bytes: &[u8]) -> Result<RecordLocation, EncodingError> {
    if bytes.len() != LOCATOR_SIZE {
        return Err(EncodingError::InvalidLength {
            expected: LOCATOR_SIZE,
            found: bytes.len(),
        });
    }
    let block_id = BlockId::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let record_id = u16::from_le_bytes([bytes[4], bytes[5]]);
    Ok(RecordLocation::new(block_id, record_id))
}

fn marshal_values<'a>(
    values: impl Iterator<Item = &'a Value>,
    profile: &[DataType],
) -> Result<Vec<u8>, EncodingError> {
    let mut bytes = Vec::new();

    for (value, data_type) in values.zip(profile) {
        match (data_type, value) {
            (DataType::Int, Value::Int(n)) => bytes.extend_from_slice(&n.to_le_bytes()),
            (DataType::Text, Value::Text(s)) => {
                let len =
                    u16::try_from(s.len()).map_err(|_| EncodingError::TextTooLong(s.len()))?;
                bytes.extend_from_slice(&len.to_le_bytes());
                bytes.extend_from_slice(s.as_bytes());
            }
            (DataType::Boolean, Value::Boolean(b)) => bytes.push(u8::from(*b)),
            _ => {
                return Err(EncodingError::TypeMismatch {
                    expected: *data_type,
                    found: value.data_type(),
                });
            }
        }

        if bytes.len() > MAX_RECORD_SIZE {
            return Err(EncodingError::RecordTooLarge {
                size: bytes.len(),
                max: MAX_RECORD_SIZE,
            });
        }
    }

    Ok(bytes)
}

fn unmarshal_values(bytes: &[u8], profile: &[DataType]) -> Result<Vec<Value>, EncodingError> {
    let mut values = Vec::with_capacity(profile.len());
    let mut offset = 0;

    let take = |offset: usize, len: usize| -> Result<&[u8], EncodingError> {
        bytes
            .get(offset..offset + len)
            .ok_or(EncodingError::Truncated {
                offset,
                needed: len,
            })
    };

    for data_type in profile {
        match data_type {
            DataType::Int => {
                let raw = take(offset, 4)?;
                values.push(Value::Int(i32::from_le_bytes([
                    raw[0], raw[1], raw[2], raw[3],
                ])));
                offset += 4;
            }
            DataType::Text => {
                let raw = take(offset, 2)?;
                let len = usize::from(u16::from_le_bytes([raw[0], raw[1]]));
                offset += 2;
                let text = std::str::from_utf8(take(offset, len)?)
                    .map_err(|_| EncodingError::InvalidUtf8)?;
                values.push(Value::Text(text.to_owned()));
                offset += len;
            }
            DataType::Boolean => {
                let raw = take(offset, 1)?;
                values.push(Value::Boolean(raw[0] != 0));
                offset += 1;
            }
        }
    }

    if offset != bytes.len() {
        return Err(EncodingError::TrailingBytes(bytes.len() - offset));
    }
    Ok(values)
}

/// Marshaling strategy for the values stored in leaf nodes.
///
/// Index leaves store row locators; clustered leaves store the non-key
/// columns of the row itself.
pub trait LeafCodec {
    type Value: Clone + std::fmt::Debug;

    fn marshal_value(&self, value: &Self::Value) -> Result<Vec<u8>, EncodingError>;

    fn unmarshal_value(&self, bytes: &[u8]) -> Result<Self::Value, EncodingError>;
}

/// Leaf values of a secondary index: the location of the row in its heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocatorCodec;

impl LeafCodec for LocatorCodec {
    type Value = RecordLocation;

    fn marshal_value(&self, value: &RecordLocation) -> Result<Vec<u8>, EncodingError> {
        Ok(marshal_locator(*value).to_vec())
    }

    fn unmarshal_value(&self, bytes: &[u8]) -> Result<RecordLocation, EncodingError> {
        unmarshal_locator(bytes)
    }
}

/// Leaf values of a clustered table: the row's non-key columns.
#[derive(Debug, Clone)]
pub struct RowCodec {
    columns: Vec<Column>,
}

impl RowCodec {
    /// Create a codec for the given non-key columns, in declaration order.
    #[must_use]
    pub const fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

impl LeafCodec for RowCodec {
    type Value = ValueDict;

    fn marshal_value(&self, value: &ValueDict) -> Result<Vec<u8>, EncodingError> {
        marshal_row(value, &self.columns)
    }

    fn unmarshal_value(&self, bytes: &[u8]) -> Result<ValueDict, EncodingError> {
        unmarshal_row(bytes, &self.columns)
    }
}

/// Errors that can occur while marshaling or unmarshaling records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Text value longer than a 16-bit length prefix can describe.
    TextTooLong(usize),
    /// Marshaled record larger than a block can hold.
    RecordTooLarge { size: usize, max: usize },
    /// Value type does not match the declared column type.
    TypeMismatch { expected: DataType, found: DataType },
    /// Key has the wrong number of components.
    ArityMismatch { expected: usize, found: usize },
    /// Row is missing a column required by the layout.
    MissingColumn(Identifier),
    /// Input ended before a value was complete.
    Truncated { offset: usize, needed: usize },
    /// Fixed-width record has the wrong size.
    InvalidLength { expected: usize, found: usize },
    /// Text bytes are not valid UTF-8.
    InvalidUtf8,
    /// Bytes left over after the last column.
    TrailingBytes(usize),
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextTooLong(len) => {
                write!(f, "text value too long to marshal: {len} bytes (max 65535)")
            }
            Self::RecordTooLarge { size, max } => {
                write!(f, "record too large to marshal: {size} bytes (max {max})")
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {expected}, found {found}")
            }
            Self::ArityMismatch { expected, found } => {
                write!(f, "key has {found} components, expected {expected}")
            }
            Self::MissingColumn(name) => write!(f, "missing column: {name}"),
            Self::Truncated { offset, needed } => {
                write!(f, "record truncated: needed {needed} bytes at offset {offset}")
            }
            Self::InvalidLength { expected, found } => {
                write!(f, "invalid record length: expected {expected}, found {found}")
            }
            Self::InvalidUtf8 => write!(f, "text value is not valid UTF-8"),
            Self::TrailingBytes(n) => write!(f, "{n} trailing bytes after last column"),
        }
    }
}

impl std::error::Error for EncodingError {}
