use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;
use zed_core::{Error, Result};
use zed_journal::{BranchTip, Journal, MemStorage, PoolConfig, Storage, Store, StoreConfig};

/// Route `zed::*` logs to the test harness when `RUST_LOG` is set.
fn init_logging() {
    if std::env::var_os("RUST_LOG").is_some() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }
}

#[test]
fn test_concurrent_commits() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::create_dir(dir.path()).unwrap();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let journal = journal.clone();
            thread::spawn(move || loop {
                match journal.commit(b"hello, world") {
                    Ok(id) => return id,
                    Err(Error::ConcurrentChange) => continue,
                    Err(e) => panic!("commit failed: {e}"),
                }
            })
        })
        .collect();
    let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=50).collect::<Vec<_>>());

    let reopened = Journal::open_dir(dir.path()).unwrap();
    assert_eq!(reopened.read_head().unwrap(), 50);
    assert_eq!(reopened.read_tail().unwrap(), 1);
    for id in 1..=50 {
        assert_eq!(&reopened.load(id).unwrap()[..], b"hello, world");
    }
}

#[test]
fn test_concurrent_inserts_distinct_keys() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    Journal::create_dir(dir.path()).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let path = dir.path().to_path_buf();
            thread::spawn(move || {
                let journal = Journal::open_dir(path).unwrap();
                let store: Store<BranchTip> = Store::new(journal, StoreConfig::for_testing()).unwrap();
                store
                    .insert(BranchTip::new(format!("b{i:02}"), Uuid::new_v4()))
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let journal = Journal::open_dir(dir.path()).unwrap();
    assert_eq!(journal.read_head().unwrap(), 16);
    let store: Store<BranchTip> = Store::new(journal, StoreConfig::default()).unwrap();
    let names: Vec<String> = store.all().unwrap().into_iter().map(|b| b.name).collect();
    let want: Vec<String> = (0..16).map(|i| format!("b{i:02}")).collect();
    assert_eq!(names, want);
}

/// Storage on which every exclusive create loses.
struct Contended(MemStorage);

impl Storage for Contended {
    fn location(&self) -> &Path {
        self.0.location()
    }
    fn get(&self, name: &str) -> Result<Bytes> {
        self.0.get(name)
    }
    fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        self.0.put(name, data)
    }
    fn put_if_not_exists(&self, _: &str, _: &[u8]) -> Result<bool> {
        Ok(false)
    }
    fn delete(&self, name: &str) -> Result<()> {
        self.0.delete(name)
    }
    fn exists(&self, name: &str) -> Result<bool> {
        self.0.exists(name)
    }
    fn size(&self, name: &str) -> Result<u64> {
        self.0.size(name)
    }
    fn list(&self) -> Result<Vec<String>> {
        self.0.list()
    }
}

#[test]
fn test_retries_exceeded() {
    let journal = Journal::create(Arc::new(Contended(MemStorage::new()))).unwrap();
    let config = StoreConfig::for_testing().with_max_retries(3);
    let store: Store<PoolConfig> = Store::new(journal.clone(), config).unwrap();
    assert!(matches!(
        store.insert(PoolConfig::new("a")),
        Err(Error::RetriesExceeded(3))
    ));
    assert_eq!(journal.read_head().unwrap(), 0);
}

#[test]
fn test_open_missing_journal() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Journal::open_dir(dir.path().join("nope")),
        Err(Error::NoSuchJournal(_))
    ));
    assert!(matches!(
        Journal::open_dir(dir.path()),
        Err(Error::NoSuchJournal(_))
    ));
}
