//! Projection of a stored graph back into a host value.
//!
//! Recursive in the depth of the graph, like
//! [`encode_recursive`](crate::recursive::encode_recursive). Maps come back
//! with keys in canonical order.

use dagsql_store::ValueStore;
use dagsql_types::{NodeId, TypeError, Value, ValueType};

use crate::error::{GraphError, GraphResult};

/// Rebuild the host value rooted at `id`.
pub fn dump<S: ValueStore>(store: &S, id: NodeId) -> GraphResult<Value> {
    let node = store.node(id)?.ok_or(GraphError::MissingNode(id))?;
    let row = &node.row;
    let corrupt = |reason: &str| GraphError::CorruptNode {
        node: id,
        reason: reason.to_owned(),
    };

    Ok(match node.value_type()? {
        ValueType::Null => Value::Null,
        ValueType::Boolean => Value::Bool(row.magnitude() != 0),
        t @ (ValueType::Integer | ValueType::NegativeInteger) => Value::Integer(
            Value::integer_from_parts(t, row.magnitude())
                .ok_or_else(|| corrupt("integer tag without magnitude"))?,
        ),
        ValueType::String => Value::String(
            String::from_utf8(row.payload().to_vec())
                .map_err(|_| corrupt("string payload is not UTF-8"))?,
        ),
        ValueType::Bytes => Value::Bytes(row.payload().to_vec()),
        ValueType::List => match row.aggregate() {
            Some(list) => Value::List(
                store
                    .list_items(list)?
                    .into_iter()
                    .map(|child| dump(store, child))
                    .collect::<GraphResult<_>>()?,
            ),
            None => Value::List(Vec::new()),
        },
        ValueType::Map => match row.aggregate() {
            Some(map) => Value::Map(
                store
                    .map_entries(map)?
                    .into_iter()
                    .map(|(key, child)| -> GraphResult<(Value, Value)> {
                        let key = String::from_utf8(key)
                            .map_err(|_| corrupt("map key is not UTF-8"))?;
                        Ok((Value::String(key), dump(store, child)?))
                    })
                    .collect::<GraphResult<_>>()?,
            ),
            None => Value::Map(Vec::new()),
        },
        ValueType::Link => return Err(TypeError::UnrecognizedType(row.type_code).into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use dagsql_store::{InMemoryValueStore, SqliteValueStore};
    use dagsql_types::NodeRow;

    fn sample() -> Value {
        Value::map([
            ("zz", Value::Integer(-(1i128 << 64))),
            ("a", Value::List(vec![Value::Bool(false), Value::Bytes(vec![0xde, 0xad])])),
            ("m", Value::Map(vec![])),
            ("u", Value::Integer(u64::MAX.into())),
            ("s", Value::from("\u{e9}t\u{e9}")),
        ])
    }

    #[test]
    fn roundtrip_is_canonical() {
        let mem = InMemoryValueStore::new();
        let root = GraphBuilder::new(&mem).insert(&sample()).unwrap();
        assert_eq!(dump(&mem, root).unwrap(), sample().canonicalize().unwrap());

        let sql = SqliteValueStore::open_in_memory().unwrap();
        let root = GraphBuilder::new(&sql).insert(&sample()).unwrap();
        assert_eq!(dump(&sql, root).unwrap(), sample().canonicalize().unwrap());
    }

    #[test]
    fn empty_containers_without_aggregate() {
        let store = InMemoryValueStore::new();
        let list = store.insert_node(&NodeRow::list(None)).unwrap();
        let map = store.insert_node(&NodeRow::map(None)).unwrap();
        assert_eq!(dump(&store, list).unwrap(), Value::List(vec![]));
        assert_eq!(dump(&store, map).unwrap(), Value::Map(vec![]));
    }

    #[test]
    fn invalid_utf8_string_is_corrupt() {
        let store = InMemoryValueStore::new();
        let id = store
            .insert_node(&NodeRow {
                type_code: ValueType::String.code(),
                int_val: None,
                blob_val: Some(vec![0xc3, 0x28]),
            })
            .unwrap();
        assert!(matches!(
            dump(&store, id),
            Err(GraphError::CorruptNode { node, .. }) if node == id
        ));
    }

    #[test]
    fn link_and_missing() {
        let store = InMemoryValueStore::new();
        let link = store
            .insert_node(&NodeRow {
                type_code: ValueType::Link.code(),
                int_val: None,
                blob_val: None,
            })
            .unwrap();
        assert!(matches!(
            dump(&store, link),
            Err(GraphError::Type(TypeError::UnrecognizedType(8)))
        ));
        assert!(matches!(
            dump(&store, NodeId::new(99)),
            Err(GraphError::MissingNode(_))
        ));
    }
}
