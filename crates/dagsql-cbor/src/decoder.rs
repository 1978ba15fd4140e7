//! Strict canonical decoder.
//!
//! Accepts exactly the byte strings the encoder can produce and rejects
//! everything else, so `decode` succeeding means the input was canonical.
//! Nesting is tracked on an explicit stack; decoding depth is bounded by
//! memory, not by the call stack.

use dagsql_types::{canonical_key_cmp, Value};

use crate::error::{CborError, CborResult};
use crate::header::{
    MajorType, INFO_INDEFINITE, INFO_U16, INFO_U32, INFO_U64, INFO_U8, SIMPLE_FALSE, SIMPLE_NULL,
    SIMPLE_TRUE,
};

/// Decode one canonical item spanning all of `data`.
pub fn decode(data: &[u8]) -> CborResult<Value> {
    let mut reader = Reader { data, pos: 0 };
    let value = decode_item(&mut reader)?;
    if reader.pos != data.len() {
        return Err(CborError::TrailingBytes {
            count: data.len() - reader.pos,
        });
    }
    Ok(value)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

struct Header {
    offset: usize,
    major: MajorType,
    info: u8,
    value: u64,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: u64) -> CborResult<&'a [u8]> {
        if n > self.remaining() as u64 {
            return Err(CborError::Truncated {
                offset: self.pos,
                needed: n - self.remaining() as u64,
            });
        }
        let start = self.pos;
        self.pos += n as usize;
        Ok(&self.data[start..self.pos])
    }

    fn header(&mut self) -> CborResult<Header> {
        let offset = self.pos;
        let byte = self.take(1)?[0];
        let major = MajorType::from_code(byte >> 5);
        let info = byte & 0x1f;

        if major == MajorType::Simple {
            // No floats or extended simple values: the argument must be one of
            // the three inline codes.
            return match u64::from(info) {
                SIMPLE_FALSE | SIMPLE_TRUE | SIMPLE_NULL => Ok(Header {
                    offset,
                    major,
                    info,
                    value: u64::from(info),
                }),
                _ => Err(CborError::UnsupportedSimple { offset, info }),
            };
        }

        let (value, min) = match info {
            0..=23 => (u64::from(info), 0),
            INFO_U8 => (u64::from(self.take(1)?[0]), 24),
            INFO_U16 => (be_u64(self.take(2)?), 1 << 8),
            INFO_U32 => (be_u64(self.take(4)?), 1 << 16),
            INFO_U64 => (be_u64(self.take(8)?), 1 << 32),
            INFO_INDEFINITE => return Err(CborError::IndefiniteLength { offset }),
            _ => return Err(CborError::MalformedHeader { offset, byte }),
        };
        if value < min {
            return Err(CborError::NonMinimalHeader { offset });
        }
        Ok(Header {
            offset,
            major,
            info,
            value,
        })
    }
}

fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// A container whose children are still being read.
enum Open {
    List {
        remaining: u64,
        items: Vec<Value>,
    },
    Map {
        remaining: u64,
        entries: Vec<(Value, Value)>,
        /// Key read but whose value has not been completed yet.
        pending_key: Option<String>,
    },
}

impl Open {
    /// Attach a finished child. Returns the container once it is complete.
    fn push(&mut self, child: Value) -> Option<Value> {
        match self {
            Open::List { remaining, items } => {
                items.push(child);
                *remaining -= 1;
                (*remaining == 0).then(|| Value::List(std::mem::take(items)))
            }
            Open::Map {
                remaining,
                entries,
                pending_key,
            } => {
                let key = pending_key.take().unwrap_or_default();
                entries.push((Value::String(key), child));
                *remaining -= 1;
                (*remaining == 0).then(|| Value::Map(std::mem::take(entries)))
            }
        }
    }

    fn wants_key(&self) -> bool {
        matches!(self, Open::Map { pending_key: None, .. })
    }
}

fn decode_item(reader: &mut Reader<'_>) -> CborResult<Value> {
    let mut stack: Vec<Open> = Vec::new();

    loop {
        if let Some(top) = stack.last_mut() {
            if top.wants_key() {
                read_map_key(reader, top)?;
                continue;
            }
        }

        let header = reader.header()?;
        // Never trust a declared count for preallocation beyond what the
        // remaining input could possibly hold.
        let cap = header.value.min(reader.remaining() as u64) as usize;
        let mut finished = match header.major {
            MajorType::UnsignedInteger => Value::Integer(i128::from(header.value)),
            MajorType::NegativeInteger => Value::Integer(-1 - i128::from(header.value)),
            MajorType::ByteString => Value::Bytes(reader.take(header.value)?.to_vec()),
            MajorType::TextString => {
                let offset = header.offset;
                let bytes = reader.take(header.value)?;
                let text =
                    std::str::from_utf8(bytes).map_err(|_| CborError::InvalidUtf8 { offset })?;
                Value::String(text.to_owned())
            }
            MajorType::Array if header.value == 0 => Value::List(Vec::new()),
            MajorType::Array => {
                stack.push(Open::List {
                    remaining: header.value,
                    items: Vec::with_capacity(cap),
                });
                continue;
            }
            MajorType::Map if header.value == 0 => Value::Map(Vec::new()),
            MajorType::Map => {
                stack.push(Open::Map {
                    remaining: header.value,
                    entries: Vec::with_capacity(cap),
                    pending_key: None,
                });
                continue;
            }
            MajorType::Simple => match header.info as u64 {
                SIMPLE_FALSE => Value::Bool(false),
                SIMPLE_TRUE => Value::Bool(true),
                _ => Value::Null,
            },
            MajorType::Tag => {
                return Err(CborError::UnsupportedMajorType {
                    offset: header.offset,
                    major: header.major.code(),
                })
            }
        };

        // Bubble the finished value up through every container it completes.
        loop {
            let Some(top) = stack.last_mut() else {
                return Ok(finished);
            };
            match top.push(finished) {
                Some(done) => {
                    stack.pop();
                    finished = done;
                }
                None => break,
            }
        }
    }
}

fn read_map_key(reader: &mut Reader<'_>, open: &mut Open) -> CborResult<()> {
    let Open::Map {
        entries,
        pending_key,
        ..
    } = open
    else {
        return Ok(());
    };
    let header = reader.header()?;
    let offset = header.offset;
    if header.major != MajorType::TextString {
        return Err(CborError::NonTextMapKey { offset });
    }
    let bytes = reader.take(header.value)?;
    let key = std::str::from_utf8(bytes).map_err(|_| CborError::InvalidUtf8 { offset })?;
    if let Some((Value::String(prev), _)) = entries.last() {
        if canonical_key_cmp(prev.as_bytes(), key.as_bytes()).is_ge() {
            return Err(CborError::MapKeyOrder { offset });
        }
    }
    *pending_key = Some(key.to_owned());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_value;
    use proptest::prelude::*;

    fn hex(s: &str) -> Vec<u8> {
        ::hex::decode(s).unwrap()
    }

    #[test]
    fn decodes_example_document() {
        let v = decode(&hex("a261610162626282f5f6")).unwrap();
        assert_eq!(
            v,
            Value::map([
                ("a", Value::Integer(1)),
                ("bb", Value::List(vec![Value::Bool(true), Value::Null])),
            ])
        );
    }

    #[test]
    fn decodes_integers() {
        assert_eq!(decode(&hex("00")).unwrap(), Value::Integer(0));
        assert_eq!(decode(&hex("1903e8")).unwrap(), Value::Integer(1000));
        assert_eq!(decode(&hex("20")).unwrap(), Value::Integer(-1));
        assert_eq!(
            decode(&hex("3bffffffffffffffff")).unwrap(),
            Value::Integer(dagsql_types::MIN_INTEGER)
        );
    }

    #[test]
    fn decodes_empty_containers() {
        assert_eq!(decode(&hex("80")).unwrap(), Value::List(vec![]));
        assert_eq!(decode(&hex("a0")).unwrap(), Value::Map(vec![]));
    }

    #[test]
    fn nested_lists_close_in_order() {
        // [[1, []], 2]
        let v = decode(&hex("8282018002")).unwrap();
        assert_eq!(
            v,
            Value::List(vec![
                Value::List(vec![Value::Integer(1), Value::List(vec![])]),
                Value::Integer(2),
            ])
        );
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let depth = 200_000;
        let mut data = vec![0x81; depth];
        data.push(0x80);
        let v = decode(&data).unwrap();
        let Value::List(outer) = &v else {
            panic!("expected list");
        };
        assert_eq!(outer.len(), 1);
        // Value drop is recursive; leak to keep this test about decoding.
        std::mem::forget(v);
    }

    #[test]
    fn rejects_non_minimal_headers() {
        assert!(matches!(
            decode(&hex("1817")),
            Err(CborError::NonMinimalHeader { offset: 0 })
        ));
        assert!(matches!(
            decode(&hex("1900ff")),
            Err(CborError::NonMinimalHeader { .. })
        ));
        assert!(matches!(
            decode(&hex("9a00000001f6")),
            Err(CborError::NonMinimalHeader { .. })
        ));
    }

    #[test]
    fn rejects_out_of_subset_items() {
        assert!(matches!(
            decode(&hex("f93c00")),
            Err(CborError::UnsupportedSimple { info: 25, .. })
        ));
        assert!(matches!(
            decode(&hex("f7")),
            Err(CborError::UnsupportedSimple { info: 23, .. })
        ));
        assert!(matches!(
            decode(&hex("c100")),
            Err(CborError::UnsupportedMajorType { major: 6, .. })
        ));
        assert!(matches!(
            decode(&hex("9fff")),
            Err(CborError::IndefiniteLength { .. })
        ));
        assert!(matches!(
            decode(&hex("1c")),
            Err(CborError::MalformedHeader { byte: 0x1c, .. })
        ));
    }

    #[test]
    fn rejects_bad_maps() {
        // {"bb": 1, "a": 2}: longer key first
        assert!(matches!(
            decode(&hex("a262626201616102")),
            Err(CborError::MapKeyOrder { .. })
        ));
        // {"a": 1, "a": 2}
        assert!(matches!(
            decode(&hex("a2616101616102")),
            Err(CborError::MapKeyOrder { .. })
        ));
        // {1: 2}
        assert!(matches!(
            decode(&hex("a10102")),
            Err(CborError::NonTextMapKey { offset: 1 })
        ));
    }

    #[test]
    fn rejects_truncation_and_trailing_bytes() {
        assert!(matches!(
            decode(&hex("6461")),
            Err(CborError::Truncated { needed: 3, .. })
        ));
        assert!(matches!(
            decode(&hex("8201")),
            Err(CborError::Truncated { .. })
        ));
        assert!(matches!(
            decode(&hex("0001")),
            Err(CborError::TrailingBytes { count: 1 })
        ));
        assert!(matches!(decode(&[]), Err(CborError::Truncated { .. })));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(matches!(
            decode(&hex("62c328")),
            Err(CborError::InvalidUtf8 { offset: 0 })
        ));
    }

    #[test]
    fn huge_declared_length_does_not_allocate() {
        assert!(matches!(
            decode(&hex("9bffffffffffffffff")),
            Err(CborError::Truncated { .. })
        ));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (dagsql_types::MIN_INTEGER..=dagsql_types::MAX_INTEGER).prop_map(Value::Integer),
            "[a-z]{0,6}".prop_map(Value::String),
            proptest::collection::vec(any::<u8>(), 0..6).prop_map(Value::Bytes),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
                proptest::collection::vec(("[a-c]{0,3}", inner), 0..6).prop_map(Value::map),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(v in arb_value()) {
            let bytes = encode_value(&v).unwrap();
            prop_assert_eq!(decode(&bytes).unwrap(), v.canonicalize().unwrap());
        }
    }
}
