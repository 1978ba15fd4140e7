//! Error types for value graph operations.

use dagsql_cbor::CborError;
use dagsql_store::StoreError;
use dagsql_types::{NodeId, TypeError};

/// Errors that can occur while building, encoding or dumping a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Unrecognized stored type tag, unsupported host value, non-text map
    /// key or out-of-range integer.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Storage backend failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Writing encoded bytes to the sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoded bytes failed strict decoding.
    #[error("decode error: {0}")]
    Decode(CborError),

    /// A node id referenced by a root, aggregate or stack frame has no row.
    #[error("node not found: {0}")]
    MissingNode(NodeId),

    /// A node row whose payload contradicts its type tag.
    #[error("corrupt node {node}: {reason}")]
    CorruptNode {
        /// The offending node.
        node: NodeId,
        /// What is wrong with it.
        reason: String,
    },

    /// No root is bound to the handle.
    #[error("root not found: {0}")]
    RootNotFound(String),
}

impl From<CborError> for GraphError {
    fn from(err: CborError) -> Self {
        match err {
            CborError::Type(e) => Self::Type(e),
            CborError::Io(e) => Self::Io(e),
            other => Self::Decode(other),
        }
    }
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
