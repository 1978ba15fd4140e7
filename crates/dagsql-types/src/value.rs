//! Host-native values.
//!
//! [`Value`] is what a graph is built from and what a stored graph is
//! projected back into. Maps keep their entries as an ordered list of
//! pairs so that insertion order, duplicate keys and non-text keys can all
//! be expressed; the builder rejects or normalizes them.

use serde_json::json;

use crate::error::TypeError;
use crate::key::canonical_key_cmp;
use crate::value_type::ValueType;

/// Smallest integer representable: `-(2^64)`.
pub const MIN_INTEGER: i128 = -(1i128 << 64);
/// Largest integer representable: `2^64 - 1`.
pub const MAX_INTEGER: i128 = u64::MAX as i128;

/// A host-native value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Any integer in `MIN_INTEGER..=MAX_INTEGER`.
    Integer(i128),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Entries in insertion order. Keys must be [`Value::String`] to be
    /// stored.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Build a map from text keys.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::String(k.into()), v))
                .collect(),
        )
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Split an integer into its stored tag and magnitude.
    ///
    /// Non-negative `n` is `Integer` with magnitude `n`; negative `n` is
    /// `NegativeInteger` with magnitude `-(n + 1)`.
    pub fn integer_parts(n: i128) -> Result<(ValueType, u64), TypeError> {
        if !(MIN_INTEGER..=MAX_INTEGER).contains(&n) {
            return Err(TypeError::MagnitudeOverflow(n.to_string()));
        }
        if n >= 0 {
            Ok((ValueType::Integer, n as u64))
        } else {
            Ok((ValueType::NegativeInteger, (-1 - n) as u64))
        }
    }

    /// Inverse of [`Value::integer_parts`]. Returns `None` for non-integer
    /// tags.
    pub fn integer_from_parts(t: ValueType, magnitude: u64) -> Option<i128> {
        match t {
            ValueType::Integer => Some(i128::from(magnitude)),
            ValueType::NegativeInteger => Some(-1 - i128::from(magnitude)),
            _ => None,
        }
    }

    /// Return a copy with every map sorted in canonical key order and
    /// duplicate keys collapsed (last occurrence wins), which is what a
    /// store round-trip produces.
    ///
    /// Recursive; intended for comparisons on values of moderate depth.
    pub fn canonicalize(&self) -> Result<Value, TypeError> {
        Ok(match self {
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(Value::canonicalize)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => {
                let mut out: Vec<(String, Value)> = Vec::with_capacity(entries.len());
                for (k, v) in entries {
                    let Value::String(key) = k else {
                        return Err(TypeError::NonTextMapKey(k.kind().into()));
                    };
                    let v = v.canonicalize()?;
                    match out.iter_mut().find(|(existing, _)| existing == key) {
                        Some(slot) => slot.1 = v,
                        None => out.push((key.clone(), v)),
                    }
                }
                out.sort_by(|(a, _), (b, _)| canonical_key_cmp(a.as_bytes(), b.as_bytes()));
                Self::Map(out.into_iter().map(|(k, v)| (Value::String(k), v)).collect())
            }
            other => other.clone(),
        })
    }

    /// Convert a JSON document. JSON numbers that are not integers are
    /// rejected with [`TypeError::UnsupportedHostType`].
    pub fn from_json(json: &serde_json::Value) -> Result<Value, TypeError> {
        Ok(match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Self::Integer(i128::from(u))
                } else if let Some(i) = n.as_i64() {
                    Self::Integer(i128::from(i))
                } else {
                    return Err(TypeError::UnsupportedHostType(format!("float {n}")));
                }
            }
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(obj) => Self::Map(
                obj.iter()
                    .map(|(k, v)| Ok((Value::String(k.clone()), Value::from_json(v)?)))
                    .collect::<Result<_, TypeError>>()?,
            ),
        })
    }

    /// Render as JSON.
    ///
    /// Byte strings use the DAG-JSON style wrapper `{"/": {"bytes": ..}}`
    /// with a hex payload. Integers outside the `i64`/`u64` range of JSON
    /// numbers are rendered as decimal strings.
    pub fn to_json(&self) -> Result<serde_json::Value, TypeError> {
        Ok(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(n) => {
                if let Ok(i) = i64::try_from(*n) {
                    json!(i)
                } else if let Ok(u) = u64::try_from(*n) {
                    json!(u)
                } else {
                    serde_json::Value::String(n.to_string())
                }
            }
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => json!({ "/": { "bytes": hex::encode(b) } }),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) => {
                let mut obj = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    let Value::String(key) = k else {
                        return Err(TypeError::NonTextMapKey(k.kind().into()));
                    };
                    obj.insert(key.clone(), v.to_json()?);
                }
                serde_json::Value::Object(obj)
            }
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(i128::from(n))
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Integer(i128::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_parts_boundaries() {
        assert_eq!(Value::integer_parts(0).unwrap(), (ValueType::Integer, 0));
        assert_eq!(
            Value::integer_parts(-1).unwrap(),
            (ValueType::NegativeInteger, 0)
        );
        assert_eq!(
            Value::integer_parts(MAX_INTEGER).unwrap(),
            (ValueType::Integer, u64::MAX)
        );
        assert_eq!(
            Value::integer_parts(MIN_INTEGER).unwrap(),
            (ValueType::NegativeInteger, u64::MAX)
        );
    }

    #[test]
    fn integer_parts_overflow() {
        assert!(matches!(
            Value::integer_parts(MAX_INTEGER + 1),
            Err(TypeError::MagnitudeOverflow(_))
        ));
        assert!(matches!(
            Value::integer_parts(MIN_INTEGER - 1),
            Err(TypeError::MagnitudeOverflow(_))
        ));
    }

    #[test]
    fn integer_parts_invert() {
        for n in [MIN_INTEGER, -300, -24, -1, 0, 23, 24, 65_536, MAX_INTEGER] {
            let (t, m) = Value::integer_parts(n).unwrap();
            assert_eq!(Value::integer_from_parts(t, m), Some(n));
        }
        assert_eq!(Value::integer_from_parts(ValueType::Bytes, 1), None);
    }

    #[test]
    fn from_json_maps_every_kind() {
        let doc = json!({"a": [1, -2, "x", null, true], "b": {}});
        let v = Value::from_json(&doc).unwrap();
        let Value::Map(entries) = &v else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].1,
            Value::List(vec![
                Value::Integer(1),
                Value::Integer(-2),
                Value::from("x"),
                Value::Null,
                Value::Bool(true),
            ])
        );
    }

    #[test]
    fn from_json_rejects_floats() {
        let err = Value::from_json(&json!([1.5])).unwrap_err();
        assert!(matches!(err, TypeError::UnsupportedHostType(_)));
    }

    #[test]
    fn to_json_renders_bytes_and_wide_integers() {
        let v = Value::List(vec![
            Value::Bytes(vec![0xde, 0xad]),
            Value::Integer(MIN_INTEGER),
            Value::Integer(i128::from(u64::MAX)),
        ]);
        assert_eq!(
            v.to_json().unwrap(),
            json!([{"/": {"bytes": "dead"}}, "-18446744073709551616", u64::MAX])
        );
    }

    #[test]
    fn to_json_rejects_non_text_keys() {
        let v = Value::Map(vec![(Value::Integer(1), Value::Null)]);
        assert!(matches!(v.to_json(), Err(TypeError::NonTextMapKey(_))));
    }

    #[test]
    fn canonicalize_sorts_and_dedups() {
        let v = Value::map([
            ("bb", Value::Integer(1)),
            ("a", Value::Integer(2)),
            ("bb", Value::Integer(3)),
        ]);
        assert_eq!(
            v.canonicalize().unwrap(),
            Value::map([("a", Value::Integer(2)), ("bb", Value::Integer(3))])
        );
    }
}
