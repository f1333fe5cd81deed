//!
//! yoga_app storage module
//! -----------------------
//! Keyed entity stores used by the identity and participation layers.
//!
//! The core never queries storage directly; it only goes through the
//! `EntityStore` contract: `find`, `find_all`, `save`, `delete` and
//! `find_by_unique_key`. Each call is atomic on its own. Nothing here offers
//! multi-call transactions, so a find → mutate → save sequence from two
//! requests races and the last save wins.
//!
//! `MemoryStore` is the in-process implementation backed by a
//! `parking_lot::RwLock<BTreeMap>`; it is cheap to clone and shared through
//! `Arc` by the server state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

pub mod models;

pub use models::{User, YogaSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} with key '{key}' already exists")]
    Duplicate { kind: &'static str, key: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A row kept by an `EntityStore`.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Short label used in logs and error messages.
    const KIND: &'static str;

    fn id(&self) -> Option<i64>;
    fn assign_id(&mut self, id: i64);

    /// Secondary unique key (e.g. a login email). `None` means the entity has none.
    fn unique_key(&self) -> Option<&str> { None }

    /// Stamp creation/update times on save.
    fn touch(&mut self, _now: DateTime<Utc>) {}
}

pub trait EntityStore<E: Entity>: Send + Sync {
    fn find(&self, id: i64) -> Result<Option<E>, StoreError>;
    fn find_all(&self) -> Result<Vec<E>, StoreError>;
    /// Insert (when the entity has no id yet) or replace. Returns the stored row.
    fn save(&self, entity: E) -> Result<E, StoreError>;
    fn delete(&self, id: i64) -> Result<(), StoreError>;
    fn find_by_unique_key(&self, key: &str) -> Result<Option<E>, StoreError>;
}

pub type SharedEntityStore<E> = Arc<dyn EntityStore<E>>;

struct Table<E> {
    rows: BTreeMap<i64, E>,
    next_id: i64,
}

/// In-memory `EntityStore`. Ids start at 1 and are never reused.
#[derive(Clone)]
pub struct MemoryStore<E> {
    inner: Arc<RwLock<Table<E>>>,
}

impl<E: Entity> Default for MemoryStore<E> {
    fn default() -> Self { Self::new() }
}

impl<E: Entity> MemoryStore<E> {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Table { rows: BTreeMap::new(), next_id: 1 })) }
    }

    pub fn len(&self) -> usize { self.inner.read().rows.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl<E: Entity> EntityStore<E> for MemoryStore<E> {
    fn find(&self, id: i64) -> Result<Option<E>, StoreError> {
        Ok(self.inner.read().rows.get(&id).cloned())
    }

    fn find_all(&self) -> Result<Vec<E>, StoreError> {
        Ok(self.inner.read().rows.values().cloned().collect())
    }

    fn save(&self, mut entity: E) -> Result<E, StoreError> {
        let mut table = self.inner.write();
        if let Some(key) = entity.unique_key() {
            let clash = table.rows.values().any(|row| row.unique_key() == Some(key) && row.id() != entity.id());
            if clash {
                return Err(StoreError::Duplicate { kind: E::KIND, key: key.to_string() });
            }
        }
        let id = match entity.id() {
            Some(id) => {
                table.next_id = table.next_id.max(id.saturating_add(1));
                id
            }
            None => {
                let id = table.next_id;
                table.next_id += 1;
                entity.assign_id(id);
                id
            }
        };
        entity.touch(Utc::now());
        table.rows.insert(id, entity.clone());
        debug!(target: "yoga_app::storage", kind = E::KIND, id, "save");
        Ok(entity)
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let removed = self.inner.write().rows.remove(&id).is_some();
        debug!(target: "yoga_app::storage", kind = E::KIND, id, removed, "delete");
        Ok(())
    }

    fn find_by_unique_key(&self, key: &str) -> Result<Option<E>, StoreError> {
        Ok(self.inner.read().rows.values().find(|row| row.unique_key() == Some(key)).cloned())
    }
}
