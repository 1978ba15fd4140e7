use std::io::Write;

use dagsql_cbor::decode;
use dagsql_store::ValueStore;
use dagsql_types::{ContentId, NodeId, Value};
use tracing::{info, warn};

use crate::builder::GraphBuilder;
use crate::dump::dump;
use crate::engine::{self, EncodeStats};
use crate::error::{GraphError, GraphResult};
use crate::recursive::encode_recursive;

/// Outcome of [`ValueGraph::verify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyReport {
    pub node: NodeId,
    pub content_id: ContentId,
    pub bytes: usize,
    /// Whether the recursive encoder produced the same bytes.
    pub engines_agree: bool,
    /// Whether decoding the bytes gives back the dumped value.
    pub roundtrips: bool,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.engines_agree && self.roundtrips
    }
}

/// A value store together with the graph operations over it.
///
/// Root handles give graphs stable names; every `*_root` method resolves the
/// handle first and fails with [`GraphError::RootNotFound`] if it is
/// unbound.
pub struct ValueGraph<S> {
    store: S,
}

impl<S: ValueStore> ValueGraph<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ---- Building ----

    /// Insert `value` as a new graph without naming it.
    pub fn insert(&self, value: &Value) -> GraphResult<NodeId> {
        GraphBuilder::new(&self.store).insert(value)
    }

    /// Insert `value` and bind `name` to it, replacing any previous binding.
    pub fn put_root(&self, name: &str, value: &Value) -> GraphResult<NodeId> {
        let node = GraphBuilder::new(&self.store).insert_root(name, value)?;
        info!(root = name, node = %node, "stored root");
        Ok(node)
    }

    /// Resolve a root handle.
    pub fn root_node(&self, name: &str) -> GraphResult<NodeId> {
        self.store
            .root(name)?
            .ok_or_else(|| GraphError::RootNotFound(name.to_owned()))
    }

    pub fn roots(&self) -> GraphResult<Vec<(String, NodeId)>> {
        Ok(self.store.roots()?)
    }

    /// Unbind a root. The graph itself stays in the store.
    pub fn remove_root(&self, name: &str) -> GraphResult<bool> {
        Ok(self.store.remove_root(name)?)
    }

    // ---- Encoding ----

    pub fn encode(&self, node: NodeId) -> GraphResult<Vec<u8>> {
        engine::encode(&self.store, node)
    }

    pub fn encode_to<W: Write + ?Sized>(
        &self,
        node: NodeId,
        out: &mut W,
    ) -> GraphResult<EncodeStats> {
        engine::encode_to(&self.store, node, out)
    }

    pub fn encode_root(&self, name: &str) -> GraphResult<Vec<u8>> {
        self.encode(self.root_node(name)?)
    }

    /// BLAKE3 of the canonical encoding.
    pub fn content_id(&self, node: NodeId) -> GraphResult<ContentId> {
        Ok(ContentId::of_encoding(&self.encode(node)?))
    }

    pub fn content_id_root(&self, name: &str) -> GraphResult<ContentId> {
        self.content_id(self.root_node(name)?)
    }

    // ---- Projection ----

    pub fn dump(&self, node: NodeId) -> GraphResult<Value> {
        dump(&self.store, node)
    }

    pub fn dump_root(&self, name: &str) -> GraphResult<Value> {
        self.dump(self.root_node(name)?)
    }

    // ---- Verification ----

    /// Cross-check a stored graph.
    ///
    /// Encodes with both engines and strictly decodes the result. A decode
    /// failure is returned as an error; disagreements are reported. The
    /// recursive checks share the recursion limits of
    /// [`encode_recursive`] and [`dump`].
    pub fn verify(&self, node: NodeId) -> GraphResult<VerifyReport> {
        let bytes = self.encode(node)?;
        let engines_agree = encode_recursive(&self.store, node)? == bytes;
        let decoded = decode(&bytes).map_err(GraphError::Decode)?;
        let roundtrips = decoded == self.dump(node)?;
        let report = VerifyReport {
            node,
            content_id: ContentId::of_encoding(&bytes),
            bytes: bytes.len(),
            engines_agree,
            roundtrips,
        };
        if !report.is_ok() {
            warn!(node = %node, engines_agree, roundtrips, "graph verification failed");
        }
        Ok(report)
    }

    pub fn verify_root(&self, name: &str) -> GraphResult<VerifyReport> {
        self.verify(self.root_node(name)?)
    }
}

impl<S: ValueStore> std::fmt::Debug for ValueGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueGraph")
            .field("node_count", &self.store.node_count().ok())
            .field("root_count", &self.store.roots().map(|r| r.len()).ok())
            .finish()
    }
}
