use runlog_store::{
    Cursor, EventLogStorage, FilesystemEventLogStorage, InMemoryEventLogStorage, RunStatus,
    StoreError, StoreOptions, Tailer, WatchService,
};
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::sync::{mpsc, Arc};
use std::thread;
use tempfile::TempDir;

fn make_event(run_id: &str, n: u64) -> Value {
    json!({
        "event_type": "step_output",
        "run_id": run_id,
        "seq": n,
        "message": format!("event {}", n),
    })
}

fn run_success(run_id: &str) -> Value {
    json!({ "event_type": "run_success", "run_id": run_id })
}

fn seqs(records: &[Value]) -> Vec<u64> {
    records.iter().map(|r| r["seq"].as_u64().unwrap()).collect()
}

fn status_of(record: &Value) -> RunStatus {
    match record["event_type"].as_str() {
        Some("run_success") => RunStatus::Success,
        Some("run_failure") => RunStatus::Failure,
        _ => RunStatus::Started,
    }
}

fn durable(dir: &TempDir) -> FilesystemEventLogStorage<Value> {
    FilesystemEventLogStorage::new(dir.path()).unwrap()
}

fn backends(dir: &TempDir) -> Vec<Box<dyn EventLogStorage<Value>>> {
    vec![
        Box::new(InMemoryEventLogStorage::new()),
        Box::new(durable(dir)),
    ]
}

#[test]
fn test_completeness_both_backends() {
    let dir = TempDir::new().unwrap();
    for store in backends(&dir) {
        for n in 0..10 {
            store.store_event("r1", &make_event("r1", n)).unwrap();
        }
        let records = store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap();
        assert_eq!(seqs(&records), (0..10).collect::<Vec<_>>());
    }
}

#[test]
fn test_repeated_reads_are_identical() {
    let dir = TempDir::new().unwrap();
    for store in backends(&dir) {
        for n in 0..4 {
            store.store_event("r1", &make_event("r1", n)).unwrap();
        }
        for cursor in 0..5 {
            let first = store.get_logs_for_run("r1", Cursor::new(cursor)).unwrap();
            let second = store.get_logs_for_run("r1", Cursor::new(cursor)).unwrap();
            assert_eq!(first, second);
        }
    }
}

#[test]
fn test_each_cursor_reads_a_suffix_of_the_previous() {
    let dir = TempDir::new().unwrap();
    for store in backends(&dir) {
        for n in 0..6 {
            store.store_event("r1", &make_event("r1", n)).unwrap();
        }
        for c in 1..7 {
            let longer = store.get_logs_for_run("r1", Cursor::new(c - 1)).unwrap();
            let shorter = store.get_logs_for_run("r1", Cursor::new(c)).unwrap();
            assert_eq!(shorter.len() + 1, longer.len());
            assert_eq!(&longer[1..], &shorter[..]);
        }
    }
}

#[test]
fn test_runs_are_isolated() {
    let dir = TempDir::new().unwrap();
    for store in backends(&dir) {
        store.store_event("b", &make_event("b", 0)).unwrap();
        let before = store.get_logs_for_run("b", Cursor::BEGINNING).unwrap();
        store.store_event("a", &make_event("a", 1)).unwrap();
        store.store_event("a", &make_event("a", 2)).unwrap();
        assert_eq!(store.get_logs_for_run("b", Cursor::BEGINNING).unwrap(), before);
        assert_eq!(seqs(&store.get_logs_for_run("a", Cursor::BEGINNING).unwrap()), vec![1, 2]);
    }
}

#[test]
fn test_scenario_a_in_memory_cursor_positions() {
    let store = InMemoryEventLogStorage::<Value>::new();
    for n in 0..3 {
        store.store_event("r1", &make_event("r1", n)).unwrap();
    }
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap()), vec![0, 1, 2]);
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::after(1)).unwrap()), vec![2]);
}

#[test]
fn test_scenario_b_durable_across_instances() {
    let dir = TempDir::new().unwrap();
    {
        let store = durable(&dir);
        store.store_event("r1", &make_event("r1", 0)).unwrap();
        store.store_event("r1", &make_event("r1", 1)).unwrap();
    }

    let store = durable(&dir);
    assert!(store.is_persistent());
    assert!(store.logs_ready("r1"));
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap()), vec![0, 1]);
}

#[test]
fn test_scenario_c_wipe() {
    let memory = InMemoryEventLogStorage::<Value>::new();
    memory.store_event("r1", &make_event("r1", 0)).unwrap();
    memory.wipe().unwrap();
    assert!(memory.get_logs_for_run("r1", Cursor::BEGINNING).unwrap().is_empty());
    assert!(!memory.is_persistent());
    assert!(!memory.logs_ready("r1"));

    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    store.store_event("r1", &make_event("r1", 0)).unwrap();
    store.store_event("r2", &make_event("r2", 0)).unwrap();
    store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap();
    store.wipe().unwrap();

    assert!(store.is_persistent());
    assert!(!store.logs_ready("r1"));
    assert!(store.cached_offset("r1").is_none());
    for run in ["r1", "r2"] {
        match store.get_logs_for_run(run, Cursor::BEGINNING) {
            Err(StoreError::NotFound { run_id }) => assert_eq!(run_id, run),
            other => panic!("expected NotFound, got {:?}", other.map(|r| r.len())),
        }
    }

    // The store is usable again after a wipe
    store.store_event("r1", &make_event("r1", 7)).unwrap();
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap()), vec![7]);
}

#[test]
fn test_wipe_leaves_other_files_alone() {
    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    store.store_event("r1", &make_event("r1", 0)).unwrap();
    fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

    store.wipe().unwrap();
    assert!(dir.path().join("notes.txt").exists());
}

#[test]
fn test_unknown_run_behaviour_per_backend() {
    let memory = InMemoryEventLogStorage::<Value>::new();
    assert!(memory.get_logs_for_run("nope", Cursor::BEGINNING).unwrap().is_empty());

    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    assert!(!store.logs_ready("nope"));
    let err = store.get_logs_for_run("nope", Cursor::BEGINNING).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_invalid_run_id_rejected() {
    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    assert!(matches!(
        store.store_event("../escape", &make_event("x", 0)),
        Err(StoreError::InvalidRunId(_))
    ));
    assert!(!store.logs_ready("../escape"));
}

#[test]
fn test_cursor_cache_follows_incremental_reads() {
    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    for n in 0..3 {
        store.store_event("r1", &make_event("r1", n)).unwrap();
    }

    let first = store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap();
    assert_eq!(first.len(), 3);
    let (cursor, offset) = store.cached_offset("r1").unwrap();
    assert_eq!(cursor, Cursor::new(3));
    assert_eq!(offset, fs::metadata(store.filepath_for_run_id("r1").unwrap()).unwrap().len());

    store.store_event("r1", &make_event("r1", 3)).unwrap();
    let next = store.get_logs_for_run("r1", Cursor::new(3)).unwrap();
    assert_eq!(seqs(&next), vec![3]);
    assert_eq!(store.cached_offset("r1").unwrap().0, Cursor::new(4));

    // A cursor other than the cached one still reads correctly
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::new(1)).unwrap()), vec![1, 2, 3]);
}

#[test]
fn test_cursor_beyond_end_does_not_poison_cache() {
    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    store.store_event("r1", &make_event("r1", 0)).unwrap();

    assert!(store.get_logs_for_run("r1", Cursor::new(5)).unwrap().is_empty());
    assert!(store.cached_offset("r1").is_none());

    for n in 1..7 {
        store.store_event("r1", &make_event("r1", n)).unwrap();
    }
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::new(5)).unwrap()), vec![5, 6]);
}

#[test]
fn test_truncated_trailing_record_is_end_of_stream() {
    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    store.store_event("r1", &make_event("r1", 0)).unwrap();
    store.store_event("r1", &make_event("r1", 1)).unwrap();

    let path = store.filepath_for_run_id("r1").unwrap();
    let len = fs::metadata(&path).unwrap().len();
    fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let fresh = durable(&dir);
    assert_eq!(seqs(&fresh.get_logs_for_run("r1", Cursor::BEGINNING).unwrap()), vec![0]);
}

#[test]
fn test_failed_read_leaves_cache_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    store.store_event("r1", &make_event("r1", 0)).unwrap();
    store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap();
    let cached = store.cached_offset("r1");

    // A complete frame whose payload is not a valid record
    let path = store.filepath_for_run_id("r1").unwrap();
    let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0x01, 0, 0, 0, 3, 0, 0, 0]).unwrap();
    file.write_all(b"{{{").unwrap();
    drop(file);

    assert!(matches!(
        store.get_logs_for_run("r1", Cursor::new(1)),
        Err(StoreError::Journal(_))
    ));
    assert_eq!(store.cached_offset("r1"), cached);
}

#[test]
fn test_event_handler_forwards_to_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(durable(&dir));
    let handler = store.clone().event_handler("r9");
    assert_eq!(handler.run_id(), "r9");

    handler.handle_new_event(&make_event("r9", 0)).unwrap();
    handler.handle_new_event(&make_event("r9", 1)).unwrap();
    assert_eq!(seqs(&store.get_logs_for_run("r9", Cursor::BEGINNING).unwrap()), vec![0, 1]);
}

#[test]
fn test_concurrent_writers_on_distinct_runs() {
    let dir = TempDir::new().unwrap();
    let options = StoreOptions {
        base_dir: dir.path().to_path_buf(),
        sync: false,
    };
    let store = Arc::new(FilesystemEventLogStorage::<Value>::open(options).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let run_id = format!("run-{}", t);
                for n in 0..50 {
                    store.store_event(&run_id, &make_event(&run_id, n)).unwrap();
                    // Interleave reads with writes on the same run
                    let seen = store.get_logs_for_run(&run_id, Cursor::BEGINNING).unwrap();
                    assert_eq!(seen.len() as u64, n + 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        let records = store.get_logs_for_run(&format!("run-{}", t), Cursor::BEGINNING).unwrap();
        assert_eq!(seqs(&records), (0..50).collect::<Vec<_>>());
    }
}

#[test]
fn test_concurrent_writers_same_run_never_tear() {
    let store = Arc::new(InMemoryEventLogStorage::<Value>::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..100 {
                    store.store_event("shared", &make_event("shared", t * 1000 + n)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let records = store.get_logs_for_run("shared", Cursor::BEGINNING).unwrap();
    assert_eq!(records.len(), 400);
    // Each writer's own records stay in order
    for t in 0..4u64 {
        let mine: Vec<u64> = seqs(&records)
            .into_iter()
            .filter(|s| s / 1000 == t)
            .collect();
        assert_eq!(mine, (0..100).map(|n| t * 1000 + n).collect::<Vec<_>>());
    }
}

#[test]
fn test_tail_delivers_exactly_once_then_stops() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::new();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));
    let path = store.filepath_for_run_id("r1").unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = store
        .watch("r1", Cursor::BEGINNING, move |record: Value| {
            let status = status_of(&record);
            tx.send(record).unwrap();
            status
        })
        .unwrap();
    assert_eq!(service.subscription_count(), 1);

    store.store_event("r1", &make_event("r1", 0)).unwrap();
    service.dispatch(&path);
    // Duplicate notification
    service.dispatch(&path);
    store.store_event("r1", &make_event("r1", 1)).unwrap();
    store.store_event("r1", &run_success("r1")).unwrap();
    service.dispatch(&path);

    assert!(handle.is_stopped());
    assert_eq!(service.subscription_count(), 0);

    store.store_event("r1", &make_event("r1", 3)).unwrap();
    assert_eq!(service.dispatch(&path), 0);

    let delivered: Vec<Value> = rx.try_iter().collect();
    assert_eq!(delivered.len(), 3);
    assert_eq!(delivered[0]["seq"], 0);
    assert_eq!(delivered[1]["seq"], 1);
    assert_eq!(delivered[2]["event_type"], "run_success");
    assert_eq!(handle.cursor(), Cursor::new(3));

    // Stopping again is a no-op
    handle.stop();
    handle.stop();
    assert!(!service.unsubscribe(handle.id()));
}

#[test]
fn test_tail_catches_up_on_existing_records() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::new();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));
    for n in 0..3 {
        store.store_event("r1", &make_event("r1", n)).unwrap();
    }

    let (tx, rx) = mpsc::channel();
    let handle = store
        .watch("r1", Cursor::new(1), move |record: Value| {
            tx.send(record).unwrap();
            RunStatus::Started
        })
        .unwrap();

    assert_eq!(seqs(&rx.try_iter().collect::<Vec<_>>()), vec![1, 2]);
    assert!(!handle.is_stopped());
    handle.stop();
    assert!(handle.is_stopped());
    assert_eq!(service.subscription_count(), 0);
}

#[test]
fn test_tail_on_already_finished_run_stops_immediately() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::new();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));
    store.store_event("r1", &make_event("r1", 0)).unwrap();
    store.store_event("r1", &json!({"event_type": "run_failure"})).unwrap();

    let handle = store
        .watch("r1", Cursor::BEGINNING, |record: Value| status_of(&record))
        .unwrap();
    assert!(handle.is_stopped());
    assert_eq!(service.subscription_count(), 0);
}

#[test]
fn test_notifications_for_other_paths_are_ignored() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::new();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));

    let (tx, rx) = mpsc::channel();
    let _handle = store
        .watch("r1", Cursor::BEGINNING, move |record: Value| {
            tx.send(record).unwrap();
            RunStatus::Started
        })
        .unwrap();

    store.store_event("r2", &make_event("r2", 0)).unwrap();
    assert_eq!(service.dispatch(&store.filepath_for_run_id("r2").unwrap()), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_tail_read_error_is_isolated() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::new();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));

    let (bad_tx, bad_rx) = mpsc::channel();
    let bad = store
        .watch("bad", Cursor::BEGINNING, move |record: Value| {
            bad_tx.send(record).unwrap();
            RunStatus::Started
        })
        .unwrap();
    let (good_tx, good_rx) = mpsc::channel();
    let good = store
        .watch("good", Cursor::BEGINNING, move |record: Value| {
            good_tx.send(record).unwrap();
            RunStatus::Started
        })
        .unwrap();

    // Corrupt header on the "bad" run
    fs::write(store.filepath_for_run_id("bad").unwrap(), b"XXXXXXXXXXXXXXXXXXXX").unwrap();
    service.dispatch(&store.filepath_for_run_id("bad").unwrap());
    store.store_event("good", &make_event("good", 0)).unwrap();
    service.dispatch(&store.filepath_for_run_id("good").unwrap());

    assert!(bad_rx.try_recv().is_err());
    assert!(!bad.is_stopped());
    assert_eq!(good_rx.try_iter().count(), 1);
    assert!(!good.is_stopped());
    assert_eq!(service.subscription_count(), 2);
}

#[test]
fn test_wipe_stops_tailers_of_the_store() {
    let dir = TempDir::new().unwrap();
    let other_dir = TempDir::new().unwrap();
    let service = WatchService::new();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));
    let other = Arc::new(durable(&other_dir).with_watch_service(service.clone()));

    let handle = store
        .watch("r1", Cursor::BEGINNING, |_: Value| RunStatus::Started)
        .unwrap();
    let other_handle = other
        .watch("r1", Cursor::BEGINNING, |_: Value| RunStatus::Started)
        .unwrap();

    store.store_event("r1", &make_event("r1", 0)).unwrap();
    store.wipe().unwrap();

    assert!(handle.is_stopped());
    assert!(!other_handle.is_stopped());
    assert_eq!(service.subscription_count(), 1);
}

#[test]
fn test_tailer_over_in_memory_store() {
    let service = WatchService::new();
    let storage: Arc<dyn EventLogStorage<Value>> = Arc::new(InMemoryEventLogStorage::new());
    let (tx, rx) = mpsc::channel();
    let tailer = Tailer::new(storage.clone(), "r1", "/virtual/r1.log", Cursor::BEGINNING, move |record: Value| {
        let status = status_of(&record);
        tx.send(record).unwrap();
        status
    });
    let handle = service.subscribe(tailer).unwrap();

    for n in 0..2 {
        storage.store_event("r1", &make_event("r1", n)).unwrap();
        service.dispatch(std::path::Path::new("/virtual/r1.log"));
    }
    storage.store_event("r1", &run_success("r1")).unwrap();
    service.dispatch(std::path::Path::new("/virtual/r1.log"));

    assert_eq!(rx.try_iter().count(), 3);
    assert!(handle.is_stopped());
}

#[test]
fn test_live_tail_with_os_monitor() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::start().unwrap();
    assert!(service.is_running());
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));

    let (tx, rx) = mpsc::channel();
    let handle = store
        .watch("live", Cursor::BEGINNING, move |record: Value| {
            let status = status_of(&record);
            tx.send(record).unwrap();
            status
        })
        .unwrap();

    store.store_event("live", &make_event("live", 0)).unwrap();
    store.store_event("live", &run_success("live")).unwrap();

    let timeout = std::time::Duration::from_secs(10);
    let first = rx.recv_timeout(timeout).unwrap();
    let second = rx.recv_timeout(timeout).unwrap();
    assert_eq!(first["seq"], 0);
    assert_eq!(second["event_type"], "run_success");

    // The tailer stops on the terminal record
    let deadline = std::time::Instant::now() + timeout;
    while !handle.is_stopped() && std::time::Instant::now() < deadline {
        thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(handle.is_stopped());
    service.stop();
    assert!(!service.is_running());
}

#[test]
fn test_resumed_run_after_torn_append_keeps_all_records() {
    let dir = TempDir::new().unwrap();
    {
        let store = durable(&dir);
        store.store_event("r1", &make_event("r1", 0)).unwrap();
        store.store_event("r1", &make_event("r1", 1)).unwrap();
    }
    let path = durable(&dir).filepath_for_run_id("r1").unwrap();
    let len = fs::metadata(&path).unwrap().len();
    fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let store = durable(&dir);
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap()), vec![0]);
    store.store_event("r1", &make_event("r1", 2)).unwrap();
    store.store_event("r1", &make_event("r1", 3)).unwrap();
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap()), vec![0, 2, 3]);
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::new(1)).unwrap()), vec![2, 3]);
}

#[test]
fn test_torn_header_is_rewritten_on_append() {
    let dir = TempDir::new().unwrap();
    let store = durable(&dir);
    let path = store.filepath_for_run_id("r1").unwrap();
    fs::write(&path, &runlog_journal::JournalHeader::CURRENT.encode()[..6]).unwrap();

    assert!(store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap().is_empty());
    store.store_event("r1", &make_event("r1", 0)).unwrap();
    assert_eq!(seqs(&store.get_logs_for_run("r1", Cursor::BEGINNING).unwrap()), vec![0]);
}

#[test]
fn test_panicking_callback_does_not_starve_other_tailers() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::start().unwrap();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));

    let bad = store
        .watch("bad", Cursor::BEGINNING, |_: Value| -> RunStatus {
            panic!("callback failure")
        })
        .unwrap();
    let (tx, rx) = mpsc::channel();
    let good = store
        .watch("good", Cursor::BEGINNING, move |record: Value| {
            tx.send(record).unwrap();
            RunStatus::Started
        })
        .unwrap();

    store.store_event("bad", &make_event("bad", 0)).unwrap();
    let timeout = std::time::Duration::from_secs(10);
    let deadline = std::time::Instant::now() + timeout;
    while !bad.is_stopped() && std::time::Instant::now() < deadline {
        thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(bad.is_stopped());

    store.store_event("good", &make_event("good", 1)).unwrap();
    let received = rx.recv_timeout(timeout).unwrap();
    assert_eq!(received["seq"], 1);
    assert!(!good.is_stopped());
    assert!(service.is_running());
    service.stop();
}

#[test]
fn test_wipe_releases_watched_directory() {
    let dir = TempDir::new().unwrap();
    let service = WatchService::start().unwrap();
    let store = Arc::new(durable(&dir).with_watch_service(service.clone()));

    let handle = store
        .watch("r1", Cursor::BEGINNING, |_: Value| RunStatus::Started)
        .unwrap();
    assert_eq!(service.watched_dirs(), vec![store.base_dir().to_path_buf()]);

    store.wipe().unwrap();
    assert!(handle.is_stopped());
    assert!(service.watched_dirs().is_empty());
    service.stop();
}
