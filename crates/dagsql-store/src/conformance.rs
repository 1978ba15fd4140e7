//! Behaviour every [`ValueStore`] backend must share.

use dagsql_types::{AggregateId, NodeId, NodeRow, StackFrame, ValueType};

use crate::error::StoreError;
use crate::traits::ValueStore;

pub(crate) fn run_all<S: ValueStore>(make: &dyn Fn() -> S) {
    nodes_roundtrip(&make());
    node_ids_are_unique(&make());
    list_items_in_index_order(&make());
    map_entries_in_canonical_order(&make());
    put_replaces_existing_slot(&make());
    reservations_are_fresh(&make());
    rolled_back_reservation_is_reissued(&make());
    roots_bind_and_rebind(&make());
    stack_push_list_layout(&make());
    stack_push_map_layout(&make());
    stack_push_unknown_aggregate(&make());
    stack_read_reports_missing(&make());
    rollback_discards_rows(&make());
    nested_rollback_keeps_outer(&make());
    unbalanced_commit_is_error(&make());
    atomically_commits_and_rolls_back(&make());
}

fn nodes_roundtrip<S: ValueStore>(store: &S) {
    let rows = [
        NodeRow::null(),
        NodeRow::boolean(true),
        NodeRow::integer(42),
        NodeRow::negative_integer(7),
        NodeRow::string("text"),
        NodeRow::bytes(vec![0, 255]),
        NodeRow::list(None),
        NodeRow::map(Some(AggregateId::new(3))),
    ];
    for row in &rows {
        let id = store.insert_node(row).unwrap();
        let stored = store.node(id).unwrap().expect("node should exist");
        assert_eq!(stored.id, id);
        assert_eq!(&stored.row, row);
    }
    assert_eq!(store.node_count().unwrap(), rows.len() as u64);
    assert!(store.node(NodeId::new(10_000)).unwrap().is_none());
}

fn node_ids_are_unique<S: ValueStore>(store: &S) {
    let a = store.insert_node(&NodeRow::null()).unwrap();
    let b = store.insert_node(&NodeRow::null()).unwrap();
    assert_ne!(a, b);
}

fn list_items_in_index_order<S: ValueStore>(store: &S) {
    let list = store.reserve_list().unwrap();
    let ids: Vec<NodeId> = (0..5)
        .map(|i| store.insert_node(&NodeRow::integer(i)).unwrap())
        .collect();
    for i in [3usize, 0, 4, 1, 2] {
        store.put_list_item(list, i as u64, ids[i]).unwrap();
    }
    assert_eq!(store.list_items(list).unwrap(), ids);
    assert!(store.list_items(list.next()).unwrap().is_empty());
}

fn map_entries_in_canonical_order<S: ValueStore>(store: &S) {
    let map = store.reserve_map().unwrap();
    let leaf = store.insert_node(&NodeRow::null()).unwrap();
    for key in ["zz", "b", "aaa", "a", "\u{ff}"] {
        store.put_map_entry(map, key.as_bytes(), leaf).unwrap();
    }
    let keys: Vec<Vec<u8>> = store
        .map_entries(map)
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
    assert_eq!(
        keys,
        vec![
            b"a".to_vec(),
            b"b".to_vec(),
            b"zz".to_vec(),
            "\u{ff}".as_bytes().to_vec(),
            b"aaa".to_vec(),
        ]
    );
}

fn put_replaces_existing_slot<S: ValueStore>(store: &S) {
    let first = store.insert_node(&NodeRow::integer(1)).unwrap();
    let second = store.insert_node(&NodeRow::integer(2)).unwrap();
    let list = store.reserve_list().unwrap();
    store.put_list_item(list, 0, first).unwrap();
    store.put_list_item(list, 0, second).unwrap();
    assert_eq!(store.list_items(list).unwrap(), vec![second]);

    let map = store.reserve_map().unwrap();
    store.put_map_entry(map, b"k", first).unwrap();
    store.put_map_entry(map, b"k", second).unwrap();
    assert_eq!(store.map_entries(map).unwrap(), vec![(b"k".to_vec(), second)]);
}

fn reservations_are_fresh<S: ValueStore>(store: &S) {
    let a = store.reserve_list().unwrap();
    assert_eq!(a, AggregateId::FIRST);
    // Reserved but unused ids are not handed out again.
    let b = store.reserve_list().unwrap();
    assert!(b > a);
    // Entries written under an id the counter has not reached yet still
    // push it forward.
    let leaf = store.insert_node(&NodeRow::null()).unwrap();
    store
        .put_list_item(AggregateId::new(b.get() + 10), 0, leaf)
        .unwrap();
    assert!(store.reserve_list().unwrap().get() > b.get() + 10);
    // Maps count independently.
    assert_eq!(store.reserve_map().unwrap(), AggregateId::FIRST);
}

fn rolled_back_reservation_is_reissued<S: ValueStore>(store: &S) {
    let kept = store.reserve_map().unwrap();
    store.begin().unwrap();
    let discarded = store.reserve_map().unwrap();
    assert!(discarded > kept);
    store.rollback().unwrap();
    // The counter is transactional; only committed reservations count.
    assert_eq!(store.reserve_map().unwrap(), discarded);
}

fn roots_bind_and_rebind<S: ValueStore>(store: &S) {
    let a = store.insert_node(&NodeRow::null()).unwrap();
    let b = store.insert_node(&NodeRow::boolean(false)).unwrap();
    store.set_root("zeta", a).unwrap();
    store.set_root("alpha", a).unwrap();
    store.set_root("zeta", b).unwrap();
    assert_eq!(store.root("zeta").unwrap(), Some(b));
    assert_eq!(store.root("missing").unwrap(), None);
    assert_eq!(
        store.roots().unwrap(),
        vec![("alpha".to_string(), a), ("zeta".to_string(), b)]
    );
    assert!(store.remove_root("alpha").unwrap());
    assert!(!store.remove_root("alpha").unwrap());
    assert_eq!(store.roots().unwrap().len(), 1);
}

fn stack_push_list_layout<S: ValueStore>(store: &S) {
    let list = store.reserve_list().unwrap();
    let ids: Vec<NodeId> = (0..3)
        .map(|i| store.insert_node(&NodeRow::integer(i)).unwrap())
        .collect();
    for (i, id) in ids.iter().enumerate() {
        store.put_list_item(list, i as u64, *id).unwrap();
    }
    store.stack_clear().unwrap();
    store.stack_put(0, &StackFrame::root(ids[0])).unwrap();
    assert_eq!(store.stack_push_list(list, 1).unwrap(), 3);
    // Top of stack (position 3) is the first element.
    for (pos, expected) in [(3u64, 0usize), (2, 1), (1, 2)] {
        let entry = store.stack_read(pos).unwrap();
        assert_eq!(entry.frame, StackFrame::root(ids[expected]));
        let node = entry.node.expect("joined node");
        assert_eq!(node.row.magnitude(), expected as u64);
    }
    // The frame below the pushed region is untouched.
    assert_eq!(store.stack_read(0).unwrap().frame.node, ids[0]);
}

fn stack_push_map_layout<S: ValueStore>(store: &S) {
    let map = store.reserve_map().unwrap();
    let leaf = store.insert_node(&NodeRow::string("v")).unwrap();
    store.put_map_entry(map, b"bb", leaf).unwrap();
    store.put_map_entry(map, b"a", leaf).unwrap();
    store.stack_clear().unwrap();
    assert_eq!(store.stack_push_map(map, 0).unwrap(), 2);
    assert_eq!(store.stack_read(1).unwrap().frame, StackFrame::keyed("a", leaf));
    assert_eq!(store.stack_read(0).unwrap().frame, StackFrame::keyed("bb", leaf));
    let node = store.stack_read(0).unwrap().node.unwrap();
    assert_eq!(node.value_type().unwrap(), ValueType::String);
}

fn stack_push_unknown_aggregate<S: ValueStore>(store: &S) {
    store.stack_clear().unwrap();
    assert_eq!(store.stack_push_list(AggregateId::new(999), 0).unwrap(), 0);
    assert_eq!(store.stack_push_map(AggregateId::new(999), 0).unwrap(), 0);
}

fn stack_read_reports_missing<S: ValueStore>(store: &S) {
    store.stack_clear().unwrap();
    assert!(matches!(
        store.stack_read(0),
        Err(StoreError::MissingStackFrame(0))
    ));
    // A frame pointing at a node that does not exist joins to `None`.
    store.stack_put(0, &StackFrame::root(NodeId::new(424_242))).unwrap();
    assert!(store.stack_read(0).unwrap().node.is_none());
    store.stack_clear().unwrap();
}

fn rollback_discards_rows<S: ValueStore>(store: &S) {
    store.begin().unwrap();
    let id = store.insert_node(&NodeRow::null()).unwrap();
    store.set_root("tmp", id).unwrap();
    let list = store.reserve_list().unwrap();
    store.put_list_item(list, 0, id).unwrap();
    store.rollback().unwrap();
    assert!(store.node(id).unwrap().is_none());
    assert_eq!(store.root("tmp").unwrap(), None);
    assert!(store.list_items(list).unwrap().is_empty());
    assert_eq!(store.node_count().unwrap(), 0);
}

fn nested_rollback_keeps_outer<S: ValueStore>(store: &S) {
    store.begin().unwrap();
    let outer = store.insert_node(&NodeRow::integer(1)).unwrap();
    store.begin().unwrap();
    let inner = store.insert_node(&NodeRow::integer(2)).unwrap();
    store.rollback().unwrap();
    store.commit().unwrap();
    assert!(store.node(outer).unwrap().is_some());
    assert!(store.node(inner).unwrap().is_none());
}

fn unbalanced_commit_is_error<S: ValueStore>(store: &S) {
    assert!(matches!(store.commit(), Err(StoreError::NoTransaction)));
    assert!(matches!(store.rollback(), Err(StoreError::NoTransaction)));
}

fn atomically_commits_and_rolls_back<S: ValueStore>(store: &S) {
    let kept = store
        .atomically(|s| s.insert_node(&NodeRow::boolean(true)))
        .unwrap();
    assert!(store.node(kept).unwrap().is_some());

    let result: Result<(), StoreError> = store.atomically(|s| {
        s.set_root("doomed", kept)?;
        Err(StoreError::MissingStackFrame(0))
    });
    assert!(result.is_err());
    assert_eq!(store.root("doomed").unwrap(), None);
}
