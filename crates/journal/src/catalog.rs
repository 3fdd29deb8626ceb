//! Catalog entries kept in journal stores.

use crate::store::Entry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sort direction of a pool's sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// The key data in a pool is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Field paths, most significant first.
    pub keys: Vec<String>,
    /// Direction.
    pub order: Order,
}

impl SortKey {
    /// Sort on one field.
    pub fn new(key: impl Into<String>, order: Order) -> Self {
        SortKey {
            keys: vec![key.into()],
            order,
        }
    }
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::new("ts", Order::Desc)
    }
}

/// Configuration of one data pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Unique pool name; the store key.
    pub name: String,
    /// Stable identity that survives renames.
    pub id: Uuid,
    /// Sort order of data objects.
    pub sort_key: SortKey,
    /// Bytes between seek index entries.
    pub seek_stride: u64,
    /// Target size of data objects in bytes.
    pub threshold: u64,
}

/// Default seek index stride.
pub const DEFAULT_SEEK_STRIDE: u64 = 64 * 1024;

/// Default data object size.
pub const DEFAULT_THRESHOLD: u64 = 500 * 1024 * 1024;

impl PoolConfig {
    /// A pool with a fresh ID and default layout.
    pub fn new(name: impl Into<String>) -> Self {
        PoolConfig {
            name: name.into(),
            id: Uuid::new_v4(),
            sort_key: SortKey::default(),
            seek_stride: DEFAULT_SEEK_STRIDE,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Set the sort key (builder pattern).
    pub fn with_sort_key(mut self, sort_key: SortKey) -> Self {
        self.sort_key = sort_key;
        self
    }
}

impl Entry for PoolConfig {
    const KIND: &'static str = "pool";

    fn key(&self) -> String {
        self.name.clone()
    }
}

/// A branch name bound to the commit at its tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTip {
    /// Branch name; the store key.
    pub name: String,
    /// Commit at the tip.
    pub commit: Uuid,
}

impl BranchTip {
    /// Bind `name` to `commit`.
    pub fn new(name: impl Into<String>, commit: Uuid) -> Self {
        BranchTip {
            name: name.into(),
            commit,
        }
    }
}

impl Entry for BranchTip {
    const KIND: &'static str = "branch";

    fn key(&self) -> String {
        self.name.clone()
    }
}
