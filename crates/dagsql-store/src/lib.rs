//! Relational value store for DAG-SQL.
//!
//! A value graph is persisted as four relations:
//!
//! - nodes: `(id, type tag, integer payload, byte payload)`
//! - list membership: `(aggregate id, index, child id)`
//! - map membership: `(aggregate id, key bytes, child id)`
//! - roots: `(handle, node id)`
//!
//! plus a per-operation traversal stack `(position, pending key, node id)`
//! that the encoder rewrites in bulk.
//!
//! # Storage Backends
//!
//! All backends implement the [`ValueStore`] trait:
//!
//! - [`InMemoryValueStore`] -- `BTreeMap` tables for tests and embedding
//! - [`SqliteValueStore`] -- SQLite via `rusqlite`; list/map expansion of the
//!   traversal stack runs as a single `INSERT ... SELECT` inside SQLite
//!
//! # Design Rules
//!
//! 1. Nodes are immutable once written; ids are never reused.
//! 2. Aggregate ids are reserved before their entries exist, from a counter
//!    that never falls below the largest id present.
//! 3. Map entries are always enumerated in canonical key order.
//! 4. Every builder and encoder call runs inside one transaction.
//! 5. All backend errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
pub(crate) mod conformance;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryValueStore;
pub use sqlite::SqliteValueStore;
pub use traits::{StackEntry, ValueStore};
