use std::fmt;

/// Maximum payload length of a `STRING` field, per the on-disk page
/// layout (see `HeapPage`). The stored width is a 4-byte length prefix
/// followed by this many padded bytes.
pub const STRING_MAX_LEN: usize = 128;

/// Tag of a field in a [`crate::tuple_desc::TupleDesc`]. Closed set:
/// only `Int` and `String` are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    String,
}

impl FieldType {
    /// Fixed width in bytes this field type occupies in a serialized
    /// tuple slot.
    pub fn width(self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::String => 4 + STRING_MAX_LEN,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::String => write!(f, "STRING"),
        }
    }
}

/// A tagged-union field value, dispatched on by `TupleDesc`/`Tuple`
/// rather than modeled as separate types per field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i32),
    String(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::String(_) => FieldType::String,
        }
    }

    /// Encode into `buf`, which must be exactly `field_type().width()`
    /// bytes long.
    pub(crate) fn encode_into(&self, buf: &mut [u8]) {
        match self {
            Field::Int(v) => {
                buf[..4].copy_from_slice(&v.to_le_bytes());
            }
            Field::String(s) => {
                let bytes = s.as_bytes();
                let len = bytes.len().min(STRING_MAX_LEN);
                buf[..4].copy_from_slice(&(len as u32).to_le_bytes());
                buf[4..4 + len].copy_from_slice(&bytes[..len]);
                for b in &mut buf[4 + len..4 + STRING_MAX_LEN] {
                    *b = 0;
                }
            }
        }
    }

    pub(crate) fn decode(field_type: FieldType, buf: &[u8]) -> Self {
        match field_type {
            FieldType::Int => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&buf[..4]);
                Field::Int(i32::from_le_bytes(bytes))
            }
            FieldType::String => {
                let mut len_bytes = [0u8; 4];
                len_bytes.copy_from_slice(&buf[..4]);
                let len = (u32::from_le_bytes(len_bytes) as usize).min(STRING_MAX_LEN);
                let s = String::from_utf8_lossy(&buf[4..4 + len]).into_owned();
                Field::String(s)
            }
        }
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => a.partial_cmp(b),
            (Field::String(a), Field::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::String(s) => write!(f, "{}", s),
        }
    }
}
