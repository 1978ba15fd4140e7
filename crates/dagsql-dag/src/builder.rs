//! Iterative construction of value graphs.
//!
//! Children are inserted before their container so a container's node row
//! is written only once every entry of its aggregate exists. Aggregate ids
//! come from [`ValueStore::reserve_list`] / [`ValueStore::reserve_map`], so
//! no placeholder rows are ever written. The walk uses an explicit work
//! list and handles any nesting depth the host value itself can represent.

use dagsql_store::ValueStore;
use dagsql_types::{AggregateId, NodeId, NodeRow, TypeError, Value, ValueType};
use tracing::debug;

use crate::error::{GraphError, GraphResult};

/// Writes host values into a store as immutable node graphs.
pub struct GraphBuilder<'s, S> {
    store: &'s S,
}

impl<'s, S: ValueStore> GraphBuilder<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Insert `value` and return the id of its root node.
    ///
    /// The whole value is written in one transaction: if any part fails
    /// (non-text map key, out-of-range integer, store error) nothing is
    /// kept.
    pub fn insert(&self, value: &Value) -> GraphResult<NodeId> {
        let (root, written) = self.store.atomically(|s| insert_all(s, value))?;
        debug!(root = %root, nodes = written, "built value graph");
        Ok(root)
    }

    /// Insert `value` and bind `name` to its root in the same transaction.
    pub fn insert_root(&self, name: &str, value: &Value) -> GraphResult<NodeId> {
        let (root, written) = self.store.atomically(|s| {
            let built = insert_all(s, value)?;
            s.set_root(name, built.0)?;
            Ok::<_, GraphError>(built)
        })?;
        debug!(root = %root, handle = name, nodes = written, "bound root");
        Ok(root)
    }
}

/// A container whose children are still being written.
enum Pending<'v> {
    List {
        aggregate: AggregateId,
        items: &'v [Value],
        next: usize,
    },
    Map {
        aggregate: AggregateId,
        entries: Vec<(&'v str, &'v Value)>,
        next: usize,
    },
}

impl<'v> Pending<'v> {
    fn child(&self, index: usize) -> Option<&'v Value> {
        match self {
            Self::List { items, .. } => {
                let items: &'v [Value] = *items;
                items.get(index)
            }
            Self::Map { entries, .. } => entries.get(index).map(|(_, v)| *v),
        }
    }

    fn current(&self) -> Option<&'v Value> {
        match self {
            Self::List { next, .. } | Self::Map { next, .. } => self.child(*next),
        }
    }

    /// Record `child` as the entry at the cursor and advance it.
    fn attach<S: ValueStore>(&mut self, store: &S, child: NodeId) -> GraphResult<()> {
        match self {
            Self::List {
                aggregate, next, ..
            } => {
                store.put_list_item(*aggregate, *next as u64, child)?;
                *next += 1;
            }
            Self::Map {
                aggregate,
                entries,
                next,
            } => {
                store.put_map_entry(*aggregate, entries[*next].0.as_bytes(), child)?;
                *next += 1;
            }
        }
        Ok(())
    }

    fn close<S: ValueStore>(self, store: &S) -> GraphResult<NodeId> {
        let row = match self {
            Self::List { aggregate, .. } => NodeRow::list(Some(aggregate)),
            Self::Map { aggregate, .. } => NodeRow::map(Some(aggregate)),
        };
        Ok(store.insert_node(&row)?)
    }
}

enum Opened<'v> {
    Leaf(NodeId),
    Container(Pending<'v>),
}

/// Write a scalar or empty container outright, or reserve an aggregate for
/// a non-empty one.
fn open<'v, S: ValueStore>(store: &S, value: &'v Value) -> GraphResult<Opened<'v>> {
    let row = match value {
        Value::Null => NodeRow::null(),
        Value::Bool(b) => NodeRow::boolean(*b),
        Value::Integer(n) => match Value::integer_parts(*n)? {
            (ValueType::Integer, m) => NodeRow::integer(m),
            (_, m) => NodeRow::negative_integer(m),
        },
        Value::String(s) => NodeRow::string(s.as_str()),
        Value::Bytes(b) => NodeRow::bytes(b.as_slice()),
        Value::List(items) if items.is_empty() => NodeRow::list(None),
        Value::Map(entries) if entries.is_empty() => NodeRow::map(None),
        Value::List(items) => {
            return Ok(Opened::Container(Pending::List {
                aggregate: store.reserve_list()?,
                items,
                next: 0,
            }));
        }
        Value::Map(entries) => {
            let entries = entries
                .iter()
                .map(|(k, v)| match k {
                    Value::String(key) => Ok((key.as_str(), v)),
                    other => Err(TypeError::NonTextMapKey(other.kind().to_owned())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Opened::Container(Pending::Map {
                aggregate: store.reserve_map()?,
                entries,
                next: 0,
            }));
        }
    };
    Ok(Opened::Leaf(store.insert_node(&row)?))
}

/// Post-order walk. Returns the root id and the number of nodes written.
fn insert_all<S: ValueStore>(store: &S, value: &Value) -> GraphResult<(NodeId, u64)> {
    let mut pending: Vec<Pending<'_>> = Vec::new();
    let mut written = 0u64;
    let mut current = value;

    loop {
        let mut done = match open(store, current)? {
            Opened::Leaf(id) => id,
            Opened::Container(container) => {
                // Non-empty by construction.
                if let Some(first) = container.current() {
                    current = first;
                }
                pending.push(container);
                continue;
            }
        };
        written += 1;

        // Attach the finished node upwards, closing every container whose
        // last child it was.
        loop {
            let Some(top) = pending.last_mut() else {
                return Ok((done, written));
            };
            top.attach(store, done)?;
            if let Some(next) = top.current() {
                current = next;
                break;
            }
            if let Some(finished) = pending.pop() {
                done = finished.close(store)?;
                written += 1;
            }
        }
    }
}
