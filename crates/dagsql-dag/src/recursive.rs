//! Depth-first recursive encoder.
//!
//! Produces exactly the bytes of [`crate::engine::encode`], but recurses once
//! per nesting level and buffers every subtree's encoding. Graphs nested
//! deeper than a few thousand levels will overflow the native stack here;
//! use the stack-based engine for untrusted or arbitrarily deep input.

use dagsql_cbor::{encode_node, EncodedChild};
use dagsql_store::ValueStore;
use dagsql_types::{NodeId, ValueType};

use crate::error::{GraphError, GraphResult};

/// Encode the graph rooted at `id` by straightforward recursion.
pub fn encode_recursive<S: ValueStore>(store: &S, id: NodeId) -> GraphResult<Vec<u8>> {
    let node = store.node(id)?.ok_or(GraphError::MissingNode(id))?;
    let children = match (node.value_type()?, node.row.aggregate()) {
        (ValueType::List, Some(list)) => store
            .list_items(list)?
            .into_iter()
            .map(|child| Ok(EncodedChild::item(encode_recursive(store, child)?)))
            .collect::<GraphResult<Vec<_>>>()?,
        (ValueType::Map, Some(map)) => store
            .map_entries(map)?
            .into_iter()
            .map(|(key, child)| Ok(EncodedChild::entry(key, encode_recursive(store, child)?)))
            .collect::<GraphResult<Vec<_>>>()?,
        _ => Vec::new(),
    };
    Ok(encode_node(&node.row, &children)?)
}
