use std::collections::BTreeMap;
use std::sync::RwLock;

use dagsql_types::{AggregateId, CanonicalKey, NodeId, NodeRow, StackFrame, StoredNode};
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::traits::{StackEntry, ValueStore};

#[derive(Debug, Default)]
struct Tables {
    nodes: BTreeMap<NodeId, NodeRow>,
    lists: BTreeMap<AggregateId, BTreeMap<u64, NodeId>>,
    maps: BTreeMap<AggregateId, BTreeMap<CanonicalKey, NodeId>>,
    roots: BTreeMap<String, NodeId>,
    next_node: u64,
    last_list: u64,
    last_map: u64,
}

/// The inverse of one write, recorded while a transaction is open.
#[derive(Debug)]
enum Undo {
    Node { id: NodeId, next_node: u64 },
    LastList(u64),
    LastMap(u64),
    ListItem {
        list: AggregateId,
        index: u64,
        previous: Option<NodeId>,
    },
    MapEntry {
        map: AggregateId,
        key: CanonicalKey,
        previous: Option<NodeId>,
    },
    Root {
        name: String,
        previous: Option<NodeId>,
    },
}

impl Tables {
    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Node { id, next_node } => {
                self.nodes.remove(&id);
                self.next_node = next_node;
            }
            Undo::LastList(last) => self.last_list = last,
            Undo::LastMap(last) => self.last_map = last,
            Undo::ListItem {
                list,
                index,
                previous,
            } => restore(&mut self.lists, list, index, previous),
            Undo::MapEntry { map, key, previous } => restore(&mut self.maps, map, key, previous),
            Undo::Root { name, previous } => match previous {
                Some(node) => {
                    self.roots.insert(name, node);
                }
                None => {
                    self.roots.remove(&name);
                }
            },
        }
    }
}

/// Put back (or remove) one aggregate entry, dropping the aggregate when it
/// ends up empty so it reads as never written.
fn restore<K: Ord>(
    table: &mut BTreeMap<AggregateId, BTreeMap<K, NodeId>>,
    aggregate: AggregateId,
    slot: K,
    previous: Option<NodeId>,
) {
    let entries = table.entry(aggregate).or_default();
    match previous {
        Some(child) => {
            entries.insert(slot, child);
        }
        None => {
            entries.remove(&slot);
        }
    }
    if entries.is_empty() {
        table.remove(&aggregate);
    }
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    /// One undo log per open transaction level, innermost last.
    undo: Vec<Vec<Undo>>,
    /// Traversal stack; `None` marks a position never written.
    stack: Vec<Option<StackFrame>>,
}

impl State {
    fn record(&mut self, undo: Undo) {
        if let Some(log) = self.undo.last_mut() {
            log.push(undo);
        }
    }
}

/// In-memory, `BTreeMap`-based value store.
///
/// Intended for tests and embedding. All tables live behind one `RwLock`.
/// While a transaction is open every write logs its inverse, so `begin` is
/// free and `rollback` costs one step per write it discards. The traversal
/// stack is scratch space and is not logged.
pub struct InMemoryValueStore {
    state: RwLock<State>,
}

impl InMemoryValueStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// Number of list aggregates with at least one entry.
    pub fn list_aggregate_count(&self) -> usize {
        self.state.read().expect("lock poisoned").tables.lists.len()
    }

    /// Number of map aggregates with at least one entry.
    pub fn map_aggregate_count(&self) -> usize {
        self.state.read().expect("lock poisoned").tables.maps.len()
    }

    /// Current length of the traversal stack region.
    pub fn stack_capacity(&self) -> usize {
        self.state.read().expect("lock poisoned").stack.len()
    }

    /// Overwrite a node row in place, bypassing immutability. Only useful for
    /// simulating store corruption.
    #[cfg(any(test, feature = "test-util"))]
    pub fn corrupt_node(&self, id: NodeId, row: NodeRow) {
        let mut state = self.state.write().expect("lock poisoned");
        state.tables.nodes.insert(id, row);
    }
}

impl Default for InMemoryValueStore {
    fn default() -> Self {
        Self::new()
    }
}

fn place(stack: &mut Vec<Option<StackFrame>>, pos: u64, frame: StackFrame) {
    let pos = pos as usize;
    if stack.len() <= pos {
        stack.resize(pos + 1, None);
    }
    stack[pos] = Some(frame);
}

impl ValueStore for InMemoryValueStore {
    fn begin(&self) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.undo.push(Vec::new());
        trace!(depth = state.undo.len(), "begin");
        Ok(())
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let log = state.undo.pop().ok_or(StoreError::NoTransaction)?;
        // An inner level's writes stay revertible by the enclosing one.
        if let Some(outer) = state.undo.last_mut() {
            outer.extend(log);
        }
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let log = state.undo.pop().ok_or(StoreError::NoTransaction)?;
        trace!(writes = log.len(), "rollback");
        for undo in log.into_iter().rev() {
            state.tables.revert(undo);
        }
        Ok(())
    }

    fn insert_node(&self, row: &NodeRow) -> StoreResult<NodeId> {
        let mut state = self.state.write().expect("lock poisoned");
        let next_node = state.tables.next_node;
        let id = NodeId::new(next_node + 1);
        state.tables.next_node = id.get();
        state.tables.nodes.insert(id, row.clone());
        state.record(Undo::Node { id, next_node });
        Ok(id)
    }

    fn node(&self, id: NodeId) -> StoreResult<Option<StoredNode>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .tables
            .nodes
            .get(&id)
            .map(|row| StoredNode::new(id, row.clone())))
    }

    fn node_count(&self) -> StoreResult<u64> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.tables.nodes.len() as u64)
    }

    fn reserve_list(&self) -> StoreResult<AggregateId> {
        let mut state = self.state.write().expect("lock poisoned");
        let last = state.tables.last_list;
        let present = state.tables.lists.keys().next_back().map_or(0, |id| id.get());
        state.tables.last_list = last.max(present) + 1;
        state.record(Undo::LastList(last));
        Ok(AggregateId::new(state.tables.last_list))
    }

    fn reserve_map(&self) -> StoreResult<AggregateId> {
        let mut state = self.state.write().expect("lock poisoned");
        let last = state.tables.last_map;
        let present = state.tables.maps.keys().next_back().map_or(0, |id| id.get());
        state.tables.last_map = last.max(present) + 1;
        state.record(Undo::LastMap(last));
        Ok(AggregateId::new(state.tables.last_map))
    }

    fn put_list_item(&self, list: AggregateId, index: u64, child: NodeId) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let previous = state
            .tables
            .lists
            .entry(list)
            .or_default()
            .insert(index, child);
        state.record(Undo::ListItem {
            list,
            index,
            previous,
        });
        Ok(())
    }

    fn put_map_entry(&self, map: AggregateId, key: &[u8], child: NodeId) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let key = CanonicalKey::from(key);
        let previous = state
            .tables
            .maps
            .entry(map)
            .or_default()
            .insert(key.clone(), child);
        state.record(Undo::MapEntry { map, key, previous });
        Ok(())
    }

    fn list_items(&self, list: AggregateId) -> StoreResult<Vec<NodeId>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .tables
            .lists
            .get(&list)
            .map(|items| items.values().copied().collect())
            .unwrap_or_default())
    }

    fn map_entries(&self, map: AggregateId) -> StoreResult<Vec<(Vec<u8>, NodeId)>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .tables
            .maps
            .get(&map)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.as_bytes().to_vec(), *v))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn set_root(&self, name: &str, node: NodeId) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        let previous = state.tables.roots.insert(name.to_owned(), node);
        state.record(Undo::Root {
            name: name.to_owned(),
            previous,
        });
        Ok(())
    }

    fn root(&self, name: &str) -> StoreResult<Option<NodeId>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state.tables.roots.get(name).copied())
    }

    fn roots(&self) -> StoreResult<Vec<(String, NodeId)>> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .tables
            .roots
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    fn remove_root(&self, name: &str) -> StoreResult<bool> {
        let mut state = self.state.write().expect("lock poisoned");
        let previous = state.tables.roots.remove(name);
        let existed = previous.is_some();
        if existed {
            state.record(Undo::Root {
                name: name.to_owned(),
                previous,
            });
        }
        Ok(existed)
    }

    fn stack_clear(&self) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.stack.clear();
        Ok(())
    }

    fn stack_put(&self, pos: u64, frame: &StackFrame) -> StoreResult<()> {
        let mut state = self.state.write().expect("lock poisoned");
        place(&mut state.stack, pos, frame.clone());
        Ok(())
    }

    fn stack_read(&self, pos: u64) -> StoreResult<StackEntry> {
        let state = self.state.read().expect("lock poisoned");
        let frame = state
            .stack
            .get(pos as usize)
            .cloned()
            .flatten()
            .ok_or(StoreError::MissingStackFrame(pos))?;
        let node = state
            .tables
            .nodes
            .get(&frame.node)
            .map(|row| StoredNode::new(frame.node, row.clone()));
        Ok(StackEntry { frame, node })
    }

    fn stack_push_list(&self, list: AggregateId, base: u64) -> StoreResult<u64> {
        let mut guard = self.state.write().expect("lock poisoned");
        let state = &mut *guard;
        let Some(items) = state.tables.lists.get(&list) else {
            return Ok(0);
        };
        let n = items.len() as u64;
        for (i, child) in items.values().enumerate() {
            place(&mut state.stack, base + n - 1 - i as u64, StackFrame::root(*child));
        }
        Ok(n)
    }

    fn stack_push_map(&self, map: AggregateId, base: u64) -> StoreResult<u64> {
        let mut guard = self.state.write().expect("lock poisoned");
        let state = &mut *guard;
        let Some(entries) = state.tables.maps.get(&map) else {
            return Ok(0);
        };
        let n = entries.len() as u64;
        for (i, (key, child)) in entries.iter().enumerate() {
            place(
                &mut state.stack,
                base + n - 1 - i as u64,
                StackFrame::keyed(key.as_bytes(), *child),
            );
        }
        Ok(n)
    }
}

impl std::fmt::Debug for InMemoryValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("lock poisoned");
        f.debug_struct("InMemoryValueStore")
            .field("node_count", &state.tables.nodes.len())
            .field("root_count", &state.tables.roots.len())
            .finish()
    }
}
