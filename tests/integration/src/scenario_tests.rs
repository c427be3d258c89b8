//! Scenario tests across the converge crates
//!
//! Each test drives the library the way a deployment would: fragments on
//! disk, a directory-backed store, and runs separated by reopening the
//! store.

use converge_core::{
    Error, FileSnapshotStore, Loader, Reconciler, SnapshotStore, TreeExecutor, load_schema,
};
use converge_model::{ConfigTree, Value};
use converge_test_utils::TestWorkspace;
use pretty_assertions::assert_eq;
use std::sync::mpsc;
use std::thread;

fn load(ws: &TestWorkspace, fragments: &[&str]) -> ConfigTree {
    let schema = load_schema(&ws.path("schema.toml")).unwrap();
    let paths: Vec<_> = fragments.iter().map(|f| ws.path(f)).collect();
    Loader::new(schema).load_files(&paths).unwrap()
}

/// Reconcile `desired` against a freshly opened store, as a new process
/// would. Returns the live tree the executor ended with.
fn run(ws: &TestWorkspace, live: ConfigTree, desired: &ConfigTree) -> ConfigTree {
    let store = FileSnapshotStore::open(ws.state_dir()).unwrap();
    let mut reconciler = Reconciler::new(&store, TreeExecutor::new(live));
    reconciler.reconcile(desired).unwrap();
    reconciler.into_executor().into_tree()
}

#[test]
fn layered_hosts_converge_and_roll_back_across_runs() {
    let ws = TestWorkspace::new().with_sample_schema();
    ws.write(
        "base.toml",
        "pkg = [\"git\"]\ngroups = [\"wheel\"]\n\n[boot]\ntimeout = 5\n",
    );
    ws.write(
        "laptop.yaml",
        "pkg: [tlp]\ngroups: [audio]\nboot:\n  timeout:\n    \"@override\": 1\n",
    );
    ws.write(
        "server.json",
        r#"{"services": {"sshd": {"port": 2222}}, "user": "ops"}"#,
    );

    let laptop = load(&ws, &["base.toml", "laptop.yaml"]);
    assert_eq!(
        laptop,
        ConfigTree::from_iter([
            ("boot", Value::map([("timeout", Value::int(1))])),
            ("groups", Value::set([Value::str("audio"), Value::str("wheel")])),
            ("pkg", Value::list([Value::str("git"), Value::str("tlp")])),
        ])
    );

    let live = run(&ws, ConfigTree::new(), &laptop);
    assert_eq!(live, laptop);

    let server = load(&ws, &["base.toml", "server.json"]);
    let live = run(&ws, live, &server);
    assert_eq!(live, server);

    let store = FileSnapshotStore::open(ws.state_dir()).unwrap();
    let first = store.get(1).unwrap();
    let live = run(&ws, live, first.tree());
    assert_eq!(live, laptop);

    let history: Vec<u64> = store.list().unwrap().iter().map(|g| g.id()).collect();
    assert_eq!(history, vec![1, 2, 3]);
    assert_eq!(store.get(3).unwrap().checksum(), first.checksum());
    assert!(store.verify().unwrap().is_ok());
}

#[test]
fn second_writer_fails_fast_until_the_first_finishes() {
    let ws = TestWorkspace::new();
    let state_dir = ws.state_dir();
    let (locked_tx, locked_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let holder = thread::spawn({
        let state_dir = state_dir.clone();
        move || {
            let store = FileSnapshotStore::open(&state_dir).unwrap();
            let lock = store.lock().unwrap();
            locked_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            drop(lock);
        }
    });

    locked_rx.recv().unwrap();
    let store = FileSnapshotStore::open(&state_dir).unwrap();
    let desired = ConfigTree::from_iter([("user", Value::str("alice"))]);

    let err = Reconciler::new(&store, TreeExecutor::default())
        .reconcile(&desired)
        .unwrap_err();
    assert!(matches!(err, Error::ConcurrentRun(_)), "{err:?}");

    release_tx.send(()).unwrap();
    holder.join().unwrap();

    let outcome = Reconciler::new(&store, TreeExecutor::default())
        .reconcile(&desired)
        .unwrap();
    assert_eq!(outcome.generation.id(), 1);
}

#[test]
fn interrupted_write_leftovers_are_ignored() {
    let ws = TestWorkspace::new();
    let store = FileSnapshotStore::open(ws.state_dir()).unwrap();
    store.record(ConfigTree::new()).unwrap();
    ws.write(".converge/generations/.00000002.json.4242.tmp", "{\"id\": 2");

    let next = store
        .record(ConfigTree::from_iter([("user", Value::str("alice"))]))
        .unwrap();

    assert_eq!(next.id(), 2);
    assert!(store.verify().unwrap().is_ok());
    assert!(converge_fs::is_checksum(next.checksum()));
}
