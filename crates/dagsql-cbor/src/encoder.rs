//! Node-level canonical encoding.
//!
//! A stored node's own frame depends only on its type tag and payload. For
//! containers the frame is just the count header; the children's bytes
//! follow it, in index order for lists and canonical key order for maps.

use std::collections::BTreeMap;
use std::io::Write;

use dagsql_types::{CanonicalKey, NodeRow, TypeError, Value, ValueType};

use crate::error::CborResult;
use crate::header::{write_header, MajorType, SIMPLE_FALSE, SIMPLE_NULL, SIMPLE_TRUE};

/// The already-encoded bytes of one child, with the map key it sits under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChild {
    pub key: Option<Vec<u8>>,
    pub bytes: Vec<u8>,
}

impl EncodedChild {
    pub fn item(bytes: Vec<u8>) -> Self {
        Self { key: None, bytes }
    }

    pub fn entry(key: impl Into<Vec<u8>>, bytes: Vec<u8>) -> Self {
        Self {
            key: Some(key.into()),
            bytes,
        }
    }
}

/// Write a map key as a text-string frame.
pub fn write_map_key<W: Write + ?Sized>(out: &mut W, key: &[u8]) -> std::io::Result<()> {
    write_header(out, MajorType::TextString, key.len() as u64)?;
    out.write_all(key)
}

/// Write a node's own frame.
///
/// Scalars are written in full. For List and Map only the count header is
/// written, using `child_count`; the caller is responsible for the
/// children. Any tag other than the eight encodable ones (including the
/// reserved Link tag) fails with [`TypeError::UnrecognizedType`].
pub fn write_node_head<W: Write + ?Sized>(
    out: &mut W,
    node: &NodeRow,
    child_count: u64,
) -> CborResult<()> {
    match node.value_type()? {
        ValueType::Null => write_header(out, MajorType::Simple, SIMPLE_NULL)?,
        ValueType::Boolean => {
            let code = if node.magnitude() != 0 {
                SIMPLE_TRUE
            } else {
                SIMPLE_FALSE
            };
            write_header(out, MajorType::Simple, code)?;
        }
        ValueType::Integer => write_header(out, MajorType::UnsignedInteger, node.magnitude())?,
        ValueType::NegativeInteger => {
            write_header(out, MajorType::NegativeInteger, node.magnitude())?
        }
        ValueType::String => {
            write_header(out, MajorType::TextString, node.payload().len() as u64)?;
            out.write_all(node.payload())?;
        }
        ValueType::Bytes => {
            write_header(out, MajorType::ByteString, node.payload().len() as u64)?;
            out.write_all(node.payload())?;
        }
        ValueType::List => write_header(out, MajorType::Array, child_count)?,
        ValueType::Map => write_header(out, MajorType::Map, child_count)?,
        ValueType::Link => return Err(TypeError::UnrecognizedType(node.type_code).into()),
    }
    Ok(())
}

/// Encode one node given the encodings of its children.
///
/// `children` must already be in traversal order. Scalars ignore it.
pub fn encode_node(node: &NodeRow, children: &[EncodedChild]) -> CborResult<Vec<u8>> {
    let body: usize = children
        .iter()
        .map(|c| c.bytes.len() + c.key.as_ref().map_or(0, |k| k.len() + 9))
        .sum();
    let mut out = Vec::with_capacity(9 + node.payload().len() + body);
    write_node_head(&mut out, node, children.len() as u64)?;
    if node.value_type()?.is_container() {
        for child in children {
            if let Some(key) = &child.key {
                write_map_key(&mut out, key)?;
            }
            out.extend_from_slice(&child.bytes);
        }
    }
    Ok(out)
}

/// Encode a host value directly, without a store.
///
/// Maps are emitted in canonical key order with duplicate keys collapsed
/// (last wins), matching what building the value into a store and encoding
/// it produces. Recursive in the depth of `value`.
pub fn encode_value(value: &Value) -> CborResult<Vec<u8>> {
    let mut out = Vec::new();
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> CborResult<()> {
    match value {
        Value::Null => write_header(out, MajorType::Simple, SIMPLE_NULL)?,
        Value::Bool(b) => {
            let code = if *b { SIMPLE_TRUE } else { SIMPLE_FALSE };
            write_header(out, MajorType::Simple, code)?;
        }
        Value::Integer(n) => {
            let major = match Value::integer_parts(*n)? {
                (ValueType::Integer, m) => (MajorType::UnsignedInteger, m),
                (_, m) => (MajorType::NegativeInteger, m),
            };
            write_header(out, major.0, major.1)?;
        }
        Value::String(s) => {
            write_header(out, MajorType::TextString, s.len() as u64)?;
            out.extend_from_slice(s.as_bytes());
        }
        Value::Bytes(b) => {
            write_header(out, MajorType::ByteString, b.len() as u64)?;
            out.extend_from_slice(b);
        }
        Value::List(items) => {
            write_header(out, MajorType::Array, items.len() as u64)?;
            for item in items {
                write_value(out, item)?;
            }
        }
        Value::Map(entries) => {
            let mut sorted: BTreeMap<CanonicalKey, &Value> = BTreeMap::new();
            for (k, v) in entries {
                let Value::String(key) = k else {
                    return Err(TypeError::NonTextMapKey(k.kind().into()).into());
                };
                sorted.insert(CanonicalKey::from(key.as_bytes()), v);
            }
            write_header(out, MajorType::Map, sorted.len() as u64)?;
            for (key, v) in sorted {
                write_map_key(out, key.as_bytes())?;
                write_value(out, v)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CborError;
    use dagsql_types::AggregateId;

    #[test]
    fn scalar_frames() {
        assert_eq!(encode_node(&NodeRow::null(), &[]).unwrap(), vec![0xf6]);
        assert_eq!(encode_node(&NodeRow::boolean(false), &[]).unwrap(), vec![0xf4]);
        assert_eq!(encode_node(&NodeRow::boolean(true), &[]).unwrap(), vec![0xf5]);
        assert_eq!(encode_node(&NodeRow::integer(500), &[]).unwrap(), vec![0x19, 0x01, 0xf4]);
        assert_eq!(encode_node(&NodeRow::negative_integer(0), &[]).unwrap(), vec![0x20]);
        assert_eq!(
            encode_node(&NodeRow::string("IETF"), &[]).unwrap(),
            vec![0x64, b'I', b'E', b'T', b'F']
        );
        assert_eq!(
            encode_node(&NodeRow::bytes(vec![1, 2, 3, 4]), &[]).unwrap(),
            vec![0x44, 1, 2, 3, 4]
        );
    }

    #[test]
    fn list_frame_wraps_children() {
        let children = vec![
            EncodedChild::item(vec![0x01]),
            EncodedChild::item(vec![0x82, 0x02, 0x03]),
        ];
        let node = NodeRow::list(Some(AggregateId::new(1)));
        assert_eq!(
            encode_node(&node, &children).unwrap(),
            vec![0x82, 0x01, 0x82, 0x02, 0x03]
        );
    }

    #[test]
    fn map_frame_interleaves_keys() {
        let children = vec![
            EncodedChild::entry("a", vec![0x01]),
            EncodedChild::entry("bb", vec![0xf6]),
        ];
        let node = NodeRow::map(Some(AggregateId::new(1)));
        assert_eq!(
            encode_node(&node, &children).unwrap(),
            vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0xf6]
        );
    }

    #[test]
    fn empty_containers() {
        assert_eq!(encode_node(&NodeRow::list(None), &[]).unwrap(), vec![0x80]);
        assert_eq!(encode_node(&NodeRow::map(None), &[]).unwrap(), vec![0xa0]);
    }

    #[test]
    fn link_and_unknown_tags_are_rejected() {
        let link = NodeRow {
            type_code: ValueType::Link.code(),
            int_val: None,
            blob_val: None,
        };
        let err = encode_node(&link, &[]).unwrap_err();
        assert!(matches!(err, CborError::Type(TypeError::UnrecognizedType(8))));

        let bogus = NodeRow {
            type_code: 99,
            int_val: None,
            blob_val: None,
        };
        let err = encode_node(&bogus, &[]).unwrap_err();
        assert!(matches!(err, CborError::Type(TypeError::UnrecognizedType(99))));
    }

    #[test]
    fn encode_value_example_document() {
        // {"a": 1, "bb": [true, null]}, inserted out of order
        let v = Value::map([
            ("bb", Value::List(vec![Value::Bool(true), Value::Null])),
            ("a", Value::Integer(1)),
        ]);
        assert_eq!(
            encode_value(&v).unwrap(),
            vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x82, 0xf5, 0xf6]
        );
    }

    #[test]
    fn encode_value_negative_boundaries() {
        assert_eq!(encode_value(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(
            encode_value(&Value::Integer(dagsql_types::MIN_INTEGER)).unwrap(),
            vec![0x3b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn encode_value_rejects_bad_input() {
        let non_text = Value::Map(vec![(Value::Bool(true), Value::Null)]);
        assert!(matches!(
            encode_value(&non_text),
            Err(CborError::Type(TypeError::NonTextMapKey(_)))
        ));
        assert!(matches!(
            encode_value(&Value::Integer(dagsql_types::MAX_INTEGER + 1)),
            Err(CborError::Type(TypeError::MagnitudeOverflow(_)))
        ));
    }

    #[test]
    fn duplicate_keys_keep_last() {
        let v = Value::map([("k", Value::Integer(1)), ("k", Value::Integer(2))]);
        assert_eq!(encode_value(&v).unwrap(), vec![0xa1, 0x61, b'k', 0x02]);
    }
}
