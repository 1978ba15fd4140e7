//! Value graphs for DAG-SQL.
//!
//! Builds host values into a [`ValueStore`](dagsql_store::ValueStore),
//! serializes stored graphs into canonical DAG-CBOR and projects them back
//! into host values.
//!
//! The encoder in [`engine`] never recurses: pending work lives in the
//! store's traversal stack and each list or map is expanded onto it with a
//! single bulk rewrite. [`recursive`] holds the straightforward
//! depth-first encoder used as a reference; it produces identical bytes but
//! needs call stack proportional to nesting depth.

pub mod builder;
pub mod dump;
pub mod engine;
pub mod error;
pub mod graph;
pub mod recursive;

pub use builder::GraphBuilder;
pub use dump::dump;
pub use engine::{encode, encode_to, EncodeStats};
pub use error::{GraphError, GraphResult};
pub use graph::{ValueGraph, VerifyReport};
pub use recursive::encode_recursive;
