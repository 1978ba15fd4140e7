//! Recursion-free canonical encoder.
//!
//! Pending work lives in the store's traversal stack rather than on the
//! call stack. Each step pops the top frame, writes the frame's map key if
//! it has one, then writes the node's own header or scalar bytes. A list or
//! map is expanded by one bulk rewrite that places its children above the
//! current top in reverse order, so the first child is popped next. Nesting
//! depth therefore costs stack rows, never native stack.

use std::io::{self, Write};

use dagsql_cbor::write_map_key;
use dagsql_cbor::write_node_head;
use dagsql_store::{StackEntry, ValueStore};
use dagsql_types::{NodeId, StackFrame, ValueType};
use tracing::debug;

use crate::error::{GraphError, GraphResult};

/// Counters collected during one encode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Bytes written to the sink.
    pub bytes: u64,
    /// Stack frames processed, one per emitted node.
    pub nodes: u64,
    /// Highest number of frames live on the stack at once.
    pub max_stack: u64,
}

/// Encode the graph rooted at `root` into a byte vector.
pub fn encode<S: ValueStore>(store: &S, root: NodeId) -> GraphResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_to(store, root, &mut out)?;
    Ok(out)
}

/// Stream the canonical encoding of the graph rooted at `root` into `out`.
///
/// Runs inside one store transaction so the traversal sees a consistent
/// graph and the stack scratch rows never outlive the call. On error the
/// sink may hold a partial prefix of the encoding.
pub fn encode_to<S, W>(store: &S, root: NodeId, out: &mut W) -> GraphResult<EncodeStats>
where
    S: ValueStore,
    W: Write + ?Sized,
{
    let mut sink = Counting::new(out);
    let stats = store.atomically(|s| traverse(s, root, &mut sink))?;
    debug!(
        root = %root,
        bytes = stats.bytes,
        nodes = stats.nodes,
        max_stack = stats.max_stack,
        "encoded graph"
    );
    Ok(stats)
}

fn traverse<S, W>(store: &S, root: NodeId, out: &mut Counting<'_, W>) -> GraphResult<EncodeStats>
where
    S: ValueStore,
    W: Write + ?Sized,
{
    let mut stats = EncodeStats::default();
    store.stack_clear()?;
    store.stack_put(0, &StackFrame::root(root))?;
    let mut len: u64 = 1;
    stats.max_stack = 1;

    while len > 0 {
        len -= 1;
        let StackEntry { frame, node } = store.stack_read(len)?;
        let node = node.ok_or(GraphError::MissingNode(frame.node))?;
        if let Some(key) = &frame.key {
            write_map_key(out, key)?;
        }

        // Children go to positions len..len+n, overwriting the popped frame.
        let pushed = match (node.value_type()?, node.row.aggregate()) {
            (ValueType::List, Some(list)) => store.stack_push_list(list, len)?,
            (ValueType::Map, Some(map)) => store.stack_push_map(map, len)?,
            _ => 0,
        };
        write_node_head(out, &node.row, pushed)?;

        len += pushed;
        stats.nodes += 1;
        stats.max_stack = stats.max_stack.max(len);
    }

    store.stack_clear()?;
    out.flush()?;
    stats.bytes = out.written;
    Ok(stats)
}

/// Byte-counting pass-through writer.
struct Counting<'a, W: ?Sized> {
    inner: &'a mut W,
    written: u64,
}

impl<'a, W: Write + ?Sized> Counting<'a, W> {
    fn new(inner: &'a mut W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write + ?Sized> Write for Counting<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
