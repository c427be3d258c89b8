//! Tests for the generation stores

use converge_core::{Error, FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
use converge_model::{ConfigTree, MAX_DEPTH, Value};
use converge_test_utils::trees::{rich_tree, rich_tree_edited};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::{TempDir, tempdir};

fn file_store() -> (TempDir, Box<dyn SnapshotStore>) {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    (dir, Box::new(store))
}

fn memory_store() -> (TempDir, Box<dyn SnapshotStore>) {
    (tempdir().unwrap(), Box::new(MemorySnapshotStore::new()))
}

#[rstest]
#[case::file(file_store())]
#[case::memory(memory_store())]
fn stores_share_append_only_semantics(#[case] store: (TempDir, Box<dyn SnapshotStore>)) {
    let (_dir, store) = store;
    assert!(store.latest().unwrap().is_none());

    let first = store.record(rich_tree()).unwrap();
    let second = store.record(rich_tree_edited()).unwrap();

    assert_eq!(first.id(), 1);
    assert_eq!(second.id(), 2);
    assert!(second.timestamp() >= first.timestamp());
    assert_eq!(store.latest().unwrap().as_ref(), Some(&second));
    assert_eq!(store.get(1).unwrap(), first);
    assert_eq!(
        store.list().unwrap().iter().map(|g| g.id()).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(matches!(store.get(3), Err(Error::GenerationNotFound { id: 3 })));

    let report = store.verify().unwrap();
    assert_eq!(report.checked, 2);
    assert!(report.is_ok());
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        store.record(rich_tree()).unwrap();
        store.record(rich_tree_edited()).unwrap();
    }

    let reopened = FileSnapshotStore::open(dir.path()).unwrap();
    let latest = reopened.latest().unwrap().unwrap();
    assert_eq!(latest.id(), 2);
    assert_eq!(latest.tree(), &rich_tree_edited());

    let third = reopened.record(ConfigTree::new()).unwrap();
    assert_eq!(third.id(), 3);
}

#[test]
fn tampered_generation_is_reported_corrupt() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    store
        .record(ConfigTree::from_iter([("user", Value::str("alice"))]))
        .unwrap();
    store.record(rich_tree()).unwrap();

    let path = dir.path().join("generations/00000001.json");
    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, content.replace("alice", "mallory")).unwrap();

    assert!(matches!(
        store.get(1),
        Err(Error::CorruptGeneration { id: 1, .. })
    ));
    assert!(store.list().is_err());
    store.get(2).unwrap();

    let report = store.verify().unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.problems.len(), 1);
    assert!(report.problems[0].contains("Generation 1 is corrupt"));
}

#[test]
fn unreadable_generation_is_reported_corrupt() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    store.record(rich_tree()).unwrap();
    std::fs::write(dir.path().join("generations/00000001.json"), "{ not json").unwrap();

    assert!(matches!(
        store.latest(),
        Err(Error::CorruptGeneration { id: 1, .. })
    ));
}

#[test]
fn verify_reports_gaps_in_history() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    for _ in 0..3 {
        store.record(rich_tree()).unwrap();
    }
    std::fs::remove_file(dir.path().join("generations/00000002.json")).unwrap();

    let report = store.verify().unwrap();

    assert_eq!(report.checked, 2);
    assert_eq!(report.problems, vec!["Generation 2 is missing".to_string()]);
}

#[test]
fn records_are_refused_while_another_writer_holds_the_lock() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    let _held = store.lock().unwrap();

    assert!(matches!(
        store.record(ConfigTree::new()),
        Err(Error::ConcurrentRun(_))
    ));
}

fn nested(depth: usize) -> ConfigTree {
    let value = (1..depth).fold(Value::str("leaf"), |inner, _| Value::map([("n", inner)]));
    ConfigTree::from_iter([("deep", value)])
}

#[test]
fn deepest_allowed_tree_reads_back_after_reopen() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();

    store.record(nested(MAX_DEPTH)).unwrap();

    let reopened = FileSnapshotStore::open(dir.path()).unwrap();
    assert_eq!(reopened.latest().unwrap().unwrap().tree(), &nested(MAX_DEPTH));
    assert!(reopened.verify().unwrap().is_ok());
}

#[test]
fn too_deep_tree_is_refused_and_store_stays_readable() {
    let dir = tempdir().unwrap();
    let store = FileSnapshotStore::open(dir.path()).unwrap();
    store.record(rich_tree()).unwrap();

    let err = store.record(nested(MAX_DEPTH + 1)).unwrap_err();

    let schema = err.as_schema_error().expect("a schema error");
    assert_eq!(schema.path.len(), MAX_DEPTH + 1);
    assert_eq!(store.latest().unwrap().unwrap().id(), 1);
    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn file_store_refuses_a_lock_issued_by_another_store() {
    let (first_dir, second_dir) = (tempdir().unwrap(), tempdir().unwrap());
    let first = FileSnapshotStore::open(first_dir.path()).unwrap();
    let second = FileSnapshotStore::open(second_dir.path()).unwrap();

    let lock = first.lock().unwrap();
    let err = second.record_locked(&lock, rich_tree()).unwrap_err();

    assert!(matches!(err, Error::ForeignLock { .. }), "{err:?}");
    assert!(second.latest().unwrap().is_none());
    assert_eq!(first.record_locked(&lock, rich_tree()).unwrap().id(), 1);
}

#[test]
fn memory_store_refuses_a_lock_issued_by_another_store() {
    let first = MemorySnapshotStore::new();
    let second = MemorySnapshotStore::new();

    let lock = first.lock().unwrap();

    assert!(matches!(
        second.record_locked(&lock, rich_tree()),
        Err(Error::ForeignLock { .. })
    ));
    assert!(second.list().unwrap().is_empty());
}
