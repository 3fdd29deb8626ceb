//! Keyed store over a journal
//!
//! Every journal entry of a store is one ZNG stream: a control message
//! naming the entry kind, then one or more envelopes (`Add`, `Update`,
//! `Delete`). Replaying the envelopes in ID order rebuilds a key-to-entry
//! table. Writers commit optimistically at the head they loaded and retry
//! when another writer got there first.

use crate::config::StoreConfig;
use crate::journal::{Id, Journal, NIL};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use zed_core::{from_value, to_value, CancellationToken, Context, Error, Result};

/// Control message encoding that names the entry kind of a store.
pub const KIND_ENCODING: u64 = 1;

/// A catalog entry with a string key.
pub trait Entry: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Entry kind tag, written to every journal entry.
    const KIND: &'static str;

    /// The key this entry is stored under.
    fn key(&self) -> String;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Envelope<E> {
    Add { entry: E },
    Update { entry: E },
    Delete { key: String },
}

struct State<E> {
    table: BTreeMap<String, E>,
    head: Id,
    loaded_at: Option<Instant>,
}

/// A map of entries persisted in a journal.
pub struct Store<E: Entry> {
    journal: Journal,
    config: StoreConfig,
    ctx: Arc<Context>,
    cancel: CancellationToken,
    state: RwLock<State<E>>,
}

impl<E: Entry> Store<E> {
    /// Bind a store to `journal`.
    pub fn new(journal: Journal, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Store {
            journal,
            config,
            ctx: Arc::new(Context::new()),
            cancel: CancellationToken::new(),
            state: RwLock::new(State {
                table: BTreeMap::new(),
                head: NIL,
                loaded_at: None,
            }),
        })
    }

    /// Check `cancel` between commit attempts and journal reads.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Whether the table should be reloaded before serving a read.
    pub fn stale(&self) -> bool {
        match self.state.read().loaded_at {
            Some(t) => t.elapsed() >= self.config.stale_after,
            None => true,
        }
    }

    /// Replay entries committed since the last load.
    pub fn load(&self) -> Result<()> {
        zed_core::cancel::check(&self.cancel)?;
        let head = self.journal.read_head()?;
        let mut state = self.state.write();
        if head < state.head {
            return Err(Error::BadFormat(format!(
                "journal head moved back from {} to {head}",
                state.head
            )));
        }
        if head > state.head {
            let from = state.head.max(self.journal.read_tail()?.max(1) - 1) + 1;
            let mut table = state.table.clone();
            let mut applied = 0usize;
            let input = self.journal.open_reader(head, from, self.cancel.clone());
            let mut reader = zed_zng::Reader::new(self.ctx.clone(), input);
            loop {
                let (value, control) = reader.read_payload()?;
                if let Some(c) = control {
                    if c.encoding == KIND_ENCODING && &c.bytes[..] != E::KIND.as_bytes() {
                        return Err(Error::BadFormat(format!(
                            "journal holds {:?} entries, not {:?}",
                            String::from_utf8_lossy(&c.bytes),
                            E::KIND
                        )));
                    }
                    continue;
                }
                let value = match value {
                    Some(v) => v,
                    None => break,
                };
                apply(&mut table, from_value(&value)?)?;
                applied += 1;
            }
            debug!(
                target: "zed::journal",
                kind = E::KIND,
                from,
                head,
                applied,
                "replayed journal"
            );
            state.table = table;
            state.head = head;
        }
        state.loaded_at = Some(Instant::now());
        Ok(())
    }

    fn refresh(&self) -> Result<()> {
        if self.stale() {
            self.load()?;
        }
        Ok(())
    }

    /// Every entry, ordered by key.
    pub fn all(&self) -> Result<Vec<E>> {
        self.refresh()?;
        Ok(self.state.read().table.values().cloned().collect())
    }

    /// The entry stored under `key`.
    pub fn lookup(&self, key: &str) -> Result<E> {
        self.refresh()?;
        self.state
            .read()
            .table
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NoSuchKey(key.to_string()))
    }

    /// Add an entry under a new key.
    pub fn insert(&self, entry: E) -> Result<()> {
        self.commit(|table| {
            let key = entry.key();
            if table.contains_key(&key) {
                return Err(Error::KeyExists(key));
            }
            Ok(vec![Envelope::Add {
                entry: entry.clone(),
            }])
        })
    }

    /// Replace the entry under an existing key.
    pub fn update(&self, entry: E) -> Result<()> {
        self.update_if(entry, |_| true)
    }

    /// Replace the entry under an existing key if `constraint` accepts the
    /// current one.
    pub fn update_if(&self, entry: E, constraint: impl Fn(&E) -> bool) -> Result<()> {
        let key = entry.key();
        self.commit(|table| {
            let current = table
                .get(&key)
                .ok_or_else(|| Error::NoSuchKey(key.clone()))?;
            if !constraint(current) {
                return Err(Error::Constraint(format!("update of {key:?} rejected")));
            }
            Ok(vec![Envelope::Update {
                entry: entry.clone(),
            }])
        })
    }

    /// Remove the entry under `key`.
    pub fn delete(&self, key: &str) -> Result<E> {
        self.delete_if(key, |_| true)
    }

    /// Remove the entry under `key` if `constraint` accepts it. Returns the
    /// removed entry.
    pub fn delete_if(&self, key: &str, constraint: impl Fn(&E) -> bool) -> Result<E> {
        let mut removed = None;
        self.commit(|table| {
            let current = table
                .get(key)
                .ok_or_else(|| Error::NoSuchKey(key.to_string()))?;
            if !constraint(current) {
                return Err(Error::Constraint(format!("delete of {key:?} rejected")));
            }
            removed = Some(current.clone());
            Ok(vec![Envelope::Delete {
                key: key.to_string(),
            }])
        })?;
        removed.ok_or_else(|| Error::NoSuchKey(key.to_string()))
    }

    /// Rename: remove `old_key` and add `entry` in one journal entry.
    pub fn move_entry(&self, old_key: &str, entry: E) -> Result<()> {
        let new_key = entry.key();
        self.commit(|table| {
            if !table.contains_key(old_key) {
                return Err(Error::NoSuchKey(old_key.to_string()));
            }
            if new_key != old_key && table.contains_key(&new_key) {
                return Err(Error::KeyExists(new_key.clone()));
            }
            Ok(vec![
                Envelope::Delete {
                    key: old_key.to_string(),
                },
                Envelope::Add {
                    entry: entry.clone(),
                },
            ])
        })
    }

    fn encode(&self, envelopes: &[Envelope<E>]) -> Result<Vec<u8>> {
        let mut w = zed_zng::Writer::new(Vec::new());
        w.write_control(KIND_ENCODING, E::KIND.as_bytes())?;
        for env in envelopes {
            w.write_value(&to_value(&self.ctx, env)?)?;
        }
        w.end_stream()?;
        w.into_inner()
    }

    /// Load, check the pre-condition against the current table, commit at
    /// the loaded head; retry on a lost race.
    fn commit<F>(&self, mut prepare: F) -> Result<()>
    where
        F: FnMut(&BTreeMap<String, E>) -> Result<Vec<Envelope<E>>>,
    {
        for attempt in 1..=self.config.max_retries {
            self.load()?;
            let (head, envelopes) = {
                let state = self.state.read();
                (state.head, prepare(&state.table)?)
            };
            let payload = self.encode(&envelopes)?;
            match self.journal.commit_at(head, &payload) {
                Ok(id) => {
                    debug!(target: "zed::journal", kind = E::KIND, id, attempt, "store commit");
                    // force the next read to replay, picking up our own entry
                    self.state.write().loaded_at = None;
                    return Ok(());
                }
                Err(Error::ConcurrentChange) => {
                    warn!(target: "zed::journal", kind = E::KIND, head, attempt, "lost commit race, retrying");
                    if !self.config.retry_backoff.is_zero() {
                        std::thread::sleep(self.config.retry_backoff);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::RetriesExceeded(self.config.max_retries))
    }
}

fn apply<E: Entry>(table: &mut BTreeMap<String, E>, env: Envelope<E>) -> Result<()> {
    match env {
        Envelope::Add { entry } => {
            let key = entry.key();
            if table.contains_key(&key) {
                return Err(Error::BadFormat(format!("journal adds existing key {key:?}")));
            }
            table.insert(key, entry);
        }
        Envelope::Update { entry } => {
            let key = entry.key();
            match table.get_mut(&key) {
                Some(slot) => *slot = entry,
                None => return Err(Error::BadFormat(format!("journal updates missing key {key:?}"))),
            }
        }
        Envelope::Delete { key } => {
            if table.remove(&key).is_none() {
                return Err(Error::BadFormat(format!("journal deletes missing key {key:?}")));
            }
        }
    }
    Ok(())
}
