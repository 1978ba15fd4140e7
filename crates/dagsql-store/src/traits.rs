use dagsql_types::{AggregateId, NodeId, NodeRow, StackFrame, StoredNode};
use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// A traversal-stack frame joined with the node it points at.
///
/// `node` is `None` when the frame references an id with no node row,
/// which only happens in a corrupted store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackEntry {
    pub frame: StackFrame,
    pub node: Option<StoredNode>,
}

/// Relational store for value graphs.
///
/// All implementations must satisfy these invariants:
/// - Node rows are immutable once inserted and their ids are never reused.
/// - `list_items` returns children by ascending index.
/// - `map_entries` and `stack_push_map` enumerate keys in canonical order
///   (shorter first, then bytewise).
/// - `reserve_*` never returns an id that already has entries or that an
///   earlier reservation in committed state or in the open transaction
///   returned. The counter is transactional: a reservation discarded by
///   `rollback` may be issued again.
/// - Transactions nest: only the outermost `commit` makes changes durable,
///   and `rollback` discards everything since the matching `begin`.
///
/// Concurrent use by several writers is not supported; a store handle is
/// meant to be driven by one logical operation at a time.
pub trait ValueStore: Send + Sync {
    // -- Transactions --------------------------------------------------------

    fn begin(&self) -> StoreResult<()>;

    fn commit(&self) -> StoreResult<()>;

    fn rollback(&self) -> StoreResult<()>;

    // -- Nodes ---------------------------------------------------------------

    /// Insert a node and return its freshly issued id.
    fn insert_node(&self, row: &NodeRow) -> StoreResult<NodeId>;

    /// Point lookup of a node. Returns `Ok(None)` if it does not exist.
    fn node(&self, id: NodeId) -> StoreResult<Option<StoredNode>>;

    /// Number of node rows.
    fn node_count(&self) -> StoreResult<u64>;

    // -- Aggregates ----------------------------------------------------------

    /// Reserve a fresh list aggregate id.
    fn reserve_list(&self) -> StoreResult<AggregateId>;

    /// Reserve a fresh map aggregate id.
    fn reserve_map(&self) -> StoreResult<AggregateId>;

    /// Insert or replace the child at `index` of a list aggregate.
    fn put_list_item(&self, list: AggregateId, index: u64, child: NodeId) -> StoreResult<()>;

    /// Insert or replace the child under `key` of a map aggregate.
    fn put_map_entry(&self, map: AggregateId, key: &[u8], child: NodeId) -> StoreResult<()>;

    /// Children of a list aggregate in index order.
    fn list_items(&self, list: AggregateId) -> StoreResult<Vec<NodeId>>;

    /// Entries of a map aggregate in canonical key order.
    fn map_entries(&self, map: AggregateId) -> StoreResult<Vec<(Vec<u8>, NodeId)>>;

    // -- Roots ---------------------------------------------------------------

    /// Bind a root handle to a node, replacing any previous binding.
    fn set_root(&self, name: &str, node: NodeId) -> StoreResult<()>;

    fn root(&self, name: &str) -> StoreResult<Option<NodeId>>;

    /// All root bindings, sorted by handle.
    fn roots(&self) -> StoreResult<Vec<(String, NodeId)>>;

    /// Remove a root binding. Returns `true` if it existed.
    fn remove_root(&self, name: &str) -> StoreResult<bool>;

    // -- Traversal stack -----------------------------------------------------

    /// Drop every frame.
    fn stack_clear(&self) -> StoreResult<()>;

    /// Write one frame at `pos`, growing the stack if needed.
    fn stack_put(&self, pos: u64, frame: &StackFrame) -> StoreResult<()>;

    /// Read the frame at `pos` together with its node.
    fn stack_read(&self, pos: u64) -> StoreResult<StackEntry>;

    /// Push every child of a list aggregate in one rewrite.
    ///
    /// With `n` children, child `i` (0-based) lands at `base + n - 1 - i`, so
    /// the first child ends on top. Returns `n`; an unknown aggregate pushes
    /// nothing and returns 0.
    fn stack_push_list(&self, list: AggregateId, base: u64) -> StoreResult<u64>;

    /// Push every entry of a map aggregate in one rewrite, keys included.
    ///
    /// Same layout as [`ValueStore::stack_push_list`], with entries taken in
    /// canonical key order.
    fn stack_push_map(&self, map: AggregateId, base: u64) -> StoreResult<u64>;

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    ///
    /// A commit that fails is rolled back as well, so the transaction never
    /// outlives the call.
    fn atomically<T, E, F>(&self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.begin()?;
        let result = f(self).and_then(|value| match self.commit() {
            Ok(()) => Ok(value),
            Err(err) => Err(E::from(err)),
        });
        if result.is_err() {
            if let Err(rollback_err) = self.rollback() {
                warn!(error = %rollback_err, "rollback failed");
            }
        }
        result
    }
}
