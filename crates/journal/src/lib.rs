//! Append-only journal and keyed catalog store.
//!
//! A [`Journal`] is a numbered sequence of immutable entries with `HEAD`
//! and `TAIL` pointers, committed by exclusive create so that concurrent
//! writers (threads or processes) serialize without locks. A [`Store`]
//! layers a key-to-entry table on top: each journal entry carries ZNG
//! envelopes that add, update or delete one entry, and writes commit
//! optimistically with a bounded retry.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zed_journal::{Journal, MemStorage, PoolConfig, Store, StoreConfig};
//!
//! let journal = Journal::create(Arc::new(MemStorage::new()))?;
//! let pools: Store<PoolConfig> = Store::new(journal, StoreConfig::default())?;
//! pools.insert(PoolConfig::new("logs"))?;
//! assert_eq!(pools.lookup("logs")?.name, "logs");
//! # Ok::<(), zed_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod journal;
pub mod storage;
pub mod store;

pub use catalog::{BranchTip, Order, PoolConfig, SortKey};
pub use config::{ConfigError, StoreConfig};
pub use journal::{Id, Journal, JournalReader, NIL};
pub use storage::{FileStorage, MemStorage, Storage};
pub use store::{Entry, Store, KIND_ENCODING};
