//! Canonical DAG-CBOR for DAG-SQL.
//!
//! Only the subset DAG-SQL can store is supported: unsigned and negative
//! integers, text and byte strings, arrays, maps with text keys, `true`,
//! `false` and `null`. There are no floats, no tags and no
//! indefinite-length items. Every header uses the shortest length form and
//! map keys appear in canonical order (shorter first, then bytewise), so a
//! value has exactly one encoding.
//!
//! - [`header`]: major-type framing (`encode_header`, `write_header`)
//! - [`encoder`]: one stored node to bytes, given its children's bytes
//! - [`decoder`]: strict, non-recursive decoding back into a [`Value`]
//!
//! [`Value`]: dagsql_types::Value

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod header;

pub use decoder::decode;
pub use encoder::{encode_node, encode_value, write_map_key, write_node_head, EncodedChild};
pub use error::{CborError, CborResult};
pub use header::{encode_header, header_len, write_header, MajorType};
