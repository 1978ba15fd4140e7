use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::{AggregateId, NodeId};
use crate::value_type::ValueType;

/// The column values of a node, before the store assigns it an id.
///
/// `type_code` is kept raw so that rows read back from a store can carry
/// tags this version does not know; [`NodeRow::value_type`] reports them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRow {
    pub type_code: i64,
    /// Magnitude for integers, 0/1 for booleans, aggregate id for
    /// non-empty containers.
    pub int_val: Option<u64>,
    /// Payload for strings and byte strings.
    pub blob_val: Option<Vec<u8>>,
}

impl NodeRow {
    fn typed(t: ValueType, int_val: Option<u64>, blob_val: Option<Vec<u8>>) -> Self {
        Self {
            type_code: t.code(),
            int_val,
            blob_val,
        }
    }

    pub fn null() -> Self {
        Self::typed(ValueType::Null, None, None)
    }

    pub fn boolean(b: bool) -> Self {
        Self::typed(ValueType::Boolean, Some(u64::from(b)), None)
    }

    pub fn integer(magnitude: u64) -> Self {
        Self::typed(ValueType::Integer, Some(magnitude), None)
    }

    /// A negative integer `-(magnitude + 1)`.
    pub fn negative_integer(magnitude: u64) -> Self {
        Self::typed(ValueType::NegativeInteger, Some(magnitude), None)
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::typed(ValueType::String, None, Some(text.into().into_bytes()))
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::typed(ValueType::Bytes, None, Some(data.into()))
    }

    /// A list node; `None` marks the empty list.
    pub fn list(aggregate: Option<AggregateId>) -> Self {
        Self::typed(ValueType::List, aggregate.map(AggregateId::get), None)
    }

    /// A map node; `None` marks the empty map.
    pub fn map(aggregate: Option<AggregateId>) -> Self {
        Self::typed(ValueType::Map, aggregate.map(AggregateId::get), None)
    }

    /// Decode the type tag.
    pub fn value_type(&self) -> Result<ValueType, TypeError> {
        ValueType::from_code(self.type_code)
    }

    /// Integer payload, with a missing value read as zero.
    pub fn magnitude(&self) -> u64 {
        self.int_val.unwrap_or(0)
    }

    /// Byte payload, with a missing value read as empty.
    pub fn payload(&self) -> &[u8] {
        self.blob_val.as_deref().unwrap_or(&[])
    }

    /// Aggregate referenced by a container node.
    pub fn aggregate(&self) -> Option<AggregateId> {
        self.int_val.map(AggregateId::new)
    }
}

/// A node read back from a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: NodeId,
    pub row: NodeRow,
}

impl StoredNode {
    pub fn new(id: NodeId, row: NodeRow) -> Self {
        Self { id, row }
    }

    pub fn value_type(&self) -> Result<ValueType, TypeError> {
        self.row.value_type()
    }
}

/// One pending unit of traversal work: a node to visit, optionally preceded
/// by the map key it is stored under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    pub key: Option<Vec<u8>>,
    pub node: NodeId,
}

impl StackFrame {
    pub fn root(node: NodeId) -> Self {
        Self { key: None, node }
    }

    pub fn keyed(key: impl Into<Vec<u8>>, node: NodeId) -> Self {
        Self {
            key: Some(key.into()),
            node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_tags() {
        assert_eq!(NodeRow::null().value_type().unwrap(), ValueType::Null);
        assert_eq!(NodeRow::boolean(true).magnitude(), 1);
        assert_eq!(NodeRow::boolean(false).magnitude(), 0);
        assert_eq!(
            NodeRow::negative_integer(0).value_type().unwrap(),
            ValueType::NegativeInteger
        );
        assert_eq!(NodeRow::string("hi").payload(), b"hi");
    }

    #[test]
    fn empty_containers_have_no_aggregate() {
        assert_eq!(NodeRow::list(None).aggregate(), None);
        assert_eq!(
            NodeRow::map(Some(AggregateId::new(4))).aggregate(),
            Some(AggregateId::new(4))
        );
    }

    #[test]
    fn unknown_tag_surfaces_on_decode() {
        let row = NodeRow {
            type_code: 42,
            int_val: None,
            blob_val: None,
        };
        assert_eq!(row.value_type(), Err(TypeError::UnrecognizedType(42)));
    }

    #[test]
    fn missing_payloads_read_as_empty() {
        let row = NodeRow {
            type_code: ValueType::Bytes.code(),
            int_val: None,
            blob_val: None,
        };
        assert!(row.payload().is_empty());
        assert_eq!(row.magnitude(), 0);
    }
}
