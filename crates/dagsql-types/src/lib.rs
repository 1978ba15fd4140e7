//! Foundation types for DAG-SQL.
//!
//! DAG-SQL stores tree/DAG-shaped values (null, booleans, integers, text,
//! byte strings, lists and maps) as rows in a relational store and
//! serializes them into canonical DAG-CBOR. Every other DAG-SQL crate
//! depends on `dagsql-types`.
//!
//! # Key Types
//!
//! - [`NodeId`] / [`AggregateId`]: store-issued row identifiers
//! - [`ValueType`]: the persisted type tag of a node
//! - [`NodeRow`] / [`StoredNode`]: a node as written to / read from a store
//! - [`StackFrame`]: one pending unit of work in a traversal stack
//! - [`Value`]: the host-native value a graph is built from and dumped to
//! - [`CanonicalKey`]: map key bytes in canonical (length, bytes) order
//! - [`ContentId`]: BLAKE3 digest of a canonical encoding

pub mod content;
pub mod error;
pub mod ids;
pub mod key;
pub mod node;
pub mod value;
pub mod value_type;

pub use content::ContentId;
pub use error::TypeError;
pub use ids::{AggregateId, NodeId};
pub use key::{canonical_key_cmp, CanonicalKey};
pub use node::{NodeRow, StackFrame, StoredNode};
pub use value::{Value, MAX_INTEGER, MIN_INTEGER};
pub use value_type::ValueType;
