use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The persisted type tag of a value node.
///
/// The numeric codes are part of the storage schema and differ from the
/// CBOR major types the encoder emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Null,
    Boolean,
    /// Unsigned magnitude `m` representing `m`.
    Integer,
    /// Unsigned magnitude `m` representing `-(m + 1)`.
    NegativeInteger,
    /// UTF-8 text held in the byte payload.
    String,
    Bytes,
    /// Integer payload references a list aggregate, or is absent when empty.
    List,
    /// Integer payload references a map aggregate, or is absent when empty.
    Map,
    /// Reserved for content-identifier links. Never produced by the builder
    /// and rejected by the encoder.
    Link,
}

impl ValueType {
    pub const ALL: [ValueType; 9] = [
        Self::Null,
        Self::Boolean,
        Self::Integer,
        Self::NegativeInteger,
        Self::String,
        Self::Bytes,
        Self::List,
        Self::Map,
        Self::Link,
    ];

    /// Storage code of this tag.
    pub const fn code(self) -> i64 {
        match self {
            Self::Null => 0,
            Self::Boolean => 1,
            Self::Integer => 2,
            Self::NegativeInteger => 3,
            Self::String => 4,
            Self::Bytes => 5,
            Self::List => 6,
            Self::Map => 7,
            Self::Link => 8,
        }
    }

    /// Parse a storage code.
    pub fn from_code(code: i64) -> Result<Self, TypeError> {
        Self::ALL
            .into_iter()
            .find(|t| t.code() == code)
            .ok_or(TypeError::UnrecognizedType(code))
    }

    /// Returns `true` for List and Map.
    pub const fn is_container(self) -> bool {
        matches!(self, Self::List | Self::Map)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::NegativeInteger => "negative-integer",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Link => "link",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_roundtrip() {
        for t in ValueType::ALL {
            assert_eq!(ValueType::from_code(t.code()).unwrap(), t);
        }
    }

    #[test]
    fn codes_are_schema_stable() {
        assert_eq!(ValueType::Null.code(), 0);
        assert_eq!(ValueType::NegativeInteger.code(), 3);
        assert_eq!(ValueType::Map.code(), 7);
        assert_eq!(ValueType::Link.code(), 8);
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            ValueType::from_code(9),
            Err(TypeError::UnrecognizedType(9))
        );
        assert_eq!(
            ValueType::from_code(-1),
            Err(TypeError::UnrecognizedType(-1))
        );
    }

    #[test]
    fn containers() {
        assert!(ValueType::List.is_container());
        assert!(ValueType::Map.is_container());
        assert!(!ValueType::Bytes.is_container());
    }
}
