//! Block and record identifiers.

use std::fmt;

/// Identifier of a block inside one block store (0-indexed).
pub type BlockId = u32;

/// Identifier of a record inside one block (1-indexed, 0 is never issued).
pub type RecordId = u16;

/// Location of a row in heap storage.
///
/// This is the value stored by index leaves: it addresses a row that lives
/// in a separate heap block store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordLocation {
    pub block_id: BlockId,
    pub record_id: RecordId,
}

impl RecordLocation {
    #[must_use]
    pub const fn new(block_id: BlockId, record_id: RecordId) -> Self {
        Self {
            block_id,
            record_id,
        }
    }
}

impl fmt::Display for RecordLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block_id, self.record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_location_ordering() {
        let a = RecordLocation::new(1, 9);
        let b = RecordLocation::new(2, 1);
        let c = RecordLocation::new(2, 3);

        assert!(a < b);
        assert!(b < c);
        assert_eq!(c.to_string(), "2:3");
    }
}
