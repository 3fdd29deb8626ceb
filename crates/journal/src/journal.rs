//! Append-only journal queue
//!
//! Layout within a [`Storage`] namespace:
//!
//! ```text
//! HEAD      base-10 ID of the newest entry (0 when empty)
//! TAIL      base-10 ID of the oldest entry (0 when empty)
//! 1.zng     entry 1
//! 2.zng     entry 2
//! ...
//! ```
//!
//! Entry `n + 1` is committed by exclusively creating `n+1.zng`; a writer
//! that loses the race gets [`Error::ConcurrentChange`]. `HEAD` is written
//! after the entry and may lag behind it, so readers probe forward from
//! `HEAD` to find the true head.

use crate::storage::{FileStorage, Storage};
use bytes::{Buf, Bytes};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};
use zed_core::{CancellationToken, Error, Result};

/// A journal entry ID. IDs start at 1 and increase by one per entry.
pub type Id = u64;

/// The ID before the first entry.
pub const NIL: Id = 0;

const HEAD: &str = "HEAD";
const TAIL: &str = "TAIL";

fn entry_name(id: Id) -> String {
    format!("{id}.zng")
}

/// An append-only sequence of opaque payloads.
#[derive(Clone)]
pub struct Journal {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("location", &self.storage.location())
            .finish()
    }
}

impl Journal {
    /// Initialize an empty journal. Fails if one already exists.
    pub fn create(storage: Arc<dyn Storage>) -> Result<Self> {
        if storage.exists(HEAD)? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("journal exists at {}", storage.location().display()),
            )
            .into());
        }
        storage.put(TAIL, NIL.to_string().as_bytes())?;
        storage.put(HEAD, NIL.to_string().as_bytes())?;
        debug!(target: "zed::journal", location = %storage.location().display(), "created journal");
        Ok(Journal { storage })
    }

    /// Open an existing journal.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        if !storage.exists(HEAD)? {
            return Err(Error::NoSuchJournal(storage.location().to_path_buf()));
        }
        Ok(Journal { storage })
    }

    /// Create a journal in directory `dir`.
    pub fn create_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::create(Arc::new(FileStorage::open(dir)?))
    }

    /// Open the journal in directory `dir`.
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::NoSuchJournal(dir.to_path_buf()));
        }
        Self::open(Arc::new(FileStorage::open(dir)?))
    }

    /// The underlying storage.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn read_id(&self, name: &str) -> Result<Id> {
        let bytes = match self.storage.get(name) {
            Ok(b) => b,
            Err(e) if e.is_not_found() => {
                return Err(Error::NoSuchJournal(self.storage.location().to_path_buf()))
            }
            Err(e) => return Err(e),
        };
        std::str::from_utf8(&bytes)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| Error::BadFormat(format!("journal {name} is not a decimal ID")))
    }

    /// The ID of the newest entry, or [`NIL`] when empty.
    pub fn read_head(&self) -> Result<Id> {
        let mut head = self.read_id(HEAD)?;
        while self.storage.exists(&entry_name(head + 1))? {
            trace!(target: "zed::journal", head, "HEAD is behind, probing forward");
            head += 1;
        }
        Ok(head)
    }

    /// The ID of the oldest entry, or [`NIL`] when empty.
    pub fn read_tail(&self) -> Result<Id> {
        let tail = self.read_id(TAIL)?;
        if tail == NIL && self.storage.exists(&entry_name(1))? {
            return Ok(1);
        }
        Ok(tail)
    }

    /// Append `payload` after the current head and return its ID.
    pub fn commit(&self, payload: &[u8]) -> Result<Id> {
        let head = self.read_head()?;
        self.commit_at(head, payload)
    }

    /// Append `payload` as entry `head + 1`. Returns
    /// [`Error::ConcurrentChange`] if that entry already exists.
    pub fn commit_at(&self, head: Id, payload: &[u8]) -> Result<Id> {
        let id = head + 1;
        if !self.storage.put_if_not_exists(&entry_name(id), payload)? {
            return Err(Error::ConcurrentChange);
        }
        if id == 1 {
            self.storage.put(TAIL, id.to_string().as_bytes())?;
        }
        self.storage.put(HEAD, id.to_string().as_bytes())?;
        debug!(target: "zed::journal", id, len = payload.len(), "committed journal entry");
        Ok(id)
    }

    /// Read one entry's payload.
    pub fn load(&self, id: Id) -> Result<Bytes> {
        self.storage.get(&entry_name(id))
    }

    /// A byte stream concatenating entries `from..=to`.
    pub fn open_reader(&self, to: Id, from: Id, cancel: CancellationToken) -> JournalReader {
        JournalReader {
            journal: self.clone(),
            next: from.max(1),
            end: to,
            current: Bytes::new(),
            cancel,
        }
    }
}

/// Reads a range of journal entries back to back, loading each on demand.
pub struct JournalReader {
    journal: Journal,
    next: Id,
    end: Id,
    current: Bytes,
    cancel: CancellationToken,
}

impl Read for JournalReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while !self.current.has_remaining() {
            if self.next > self.end {
                return Ok(0);
            }
            let loaded = zed_core::cancel::check(&self.cancel)
                .and_then(|()| self.journal.load(self.next));
            self.current = loaded.map_err(|e| match e {
                Error::Io(e) => e,
                e => io::Error::new(io::ErrorKind::Other, e),
            })?;
            self.next += 1;
        }
        let n = buf.len().min(self.current.remaining());
        self.current.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;

    #[test]
    fn test_create_and_open() {
        let storage: Arc<dyn Storage> = Arc::new(MemStorage::new());
        assert!(matches!(
            Journal::open(storage.clone()),
            Err(Error::NoSuchJournal(_))
        ));
        let j = Journal::create(storage.clone()).unwrap();
        assert_eq!(j.read_head().unwrap(), NIL);
        assert_eq!(j.read_tail().unwrap(), NIL);
        assert!(Journal::create(storage.clone()).is_err());
        assert!(Journal::open(storage).is_ok());
    }

    #[test]
    fn test_commit_advances_head_and_tail() {
        let j = Journal::create(Arc::new(MemStorage::new())).unwrap();
        assert_eq!(j.commit(b"a").unwrap(), 1);
        assert_eq!(j.commit(b"b").unwrap(), 2);
        assert_eq!(j.read_head().unwrap(), 2);
        assert_eq!(j.read_tail().unwrap(), 1);
        assert_eq!(&j.load(2).unwrap()[..], b"b");
    }

    #[test]
    fn test_commit_at_conflict() {
        let j = Journal::create(Arc::new(MemStorage::new())).unwrap();
        j.commit_at(NIL, b"winner").unwrap();
        assert!(matches!(
            j.commit_at(NIL, b"loser"),
            Err(Error::ConcurrentChange)
        ));
        assert_eq!(&j.load(1).unwrap()[..], b"winner");
    }

    #[test]
    fn test_head_probes_forward() {
        let storage = Arc::new(MemStorage::new());
        let j = Journal::create(storage.clone()).unwrap();
        j.commit(b"1").unwrap();
        // an entry whose HEAD update was lost
        storage.put("2.zng", b"2").unwrap();
        assert_eq!(j.read_head().unwrap(), 2);
        assert_eq!(j.commit(b"3").unwrap(), 3);
    }

    #[test]
    fn test_reader_concatenates() {
        let j = Journal::create(Arc::new(MemStorage::new())).unwrap();
        for p in ["ab", "", "cde"] {
            j.commit(p.as_bytes()).unwrap();
        }
        let mut out = String::new();
        j.open_reader(3, 1, CancellationToken::new())
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "abcde");

        let mut out = String::new();
        j.open_reader(NIL, NIL, CancellationToken::new())
            .read_to_string(&mut out)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_corrupt_head() {
        let storage = Arc::new(MemStorage::new());
        let j = Journal::create(storage.clone()).unwrap();
        storage.put("HEAD", b"twelve").unwrap();
        assert!(matches!(j.read_head(), Err(Error::BadFormat(_))));
    }
}
