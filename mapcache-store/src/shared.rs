//! Explicit shared handle over the process-wide entity store.
//!
//! Every consumer holds a clone of the same [`SharedStore`]; there is no
//! global. Reads are pull-based: consumers re-denormalize on their next read
//! and see whatever the latest accepted merge wrote.

use crate::entity_store::{EntityStore, StoredEntity};
use crate::freshness::{CacheRead, Freshness};
use crate::normalize::NormalizedPayload;
use crate::schema::Schema;
use mapcache_core::{EntityId, EntityKind, StoreError, Timestamp};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Read statistics for freshness-gated lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the store.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Entities currently cached.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cloneable handle to one entity store.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<EntityStore>>,
    counters: Arc<Counters>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: EntityStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
            counters: Arc::default(),
        }
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&EntityStore) -> R) -> Result<R, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&guard))
    }

    /// Run `f` under the write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut EntityStore) -> R) -> Result<R, StoreError> {
        let mut guard = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&mut guard))
    }

    pub fn merge(
        &self,
        kind: EntityKind,
        id: EntityId,
        data: Map<String, Value>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        self.write(|store| store.merge(kind, id, data, now))
    }

    pub fn merge_payload(&self, payload: NormalizedPayload, now: Timestamp) -> Result<usize, StoreError> {
        self.write(|store| store.merge_payload(payload, now))
    }

    pub fn remove(&self, kind: EntityKind, id: &EntityId) -> Result<Option<StoredEntity>, StoreError> {
        self.write(|store| store.remove(kind, id))
    }

    pub fn set_field(
        &self,
        kind: EntityKind,
        id: &EntityId,
        field: &str,
        value: Value,
    ) -> Result<bool, StoreError> {
        self.write(|store| store.set_field(kind, id, field, value))
    }

    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Result<Option<StoredEntity>, StoreError> {
        self.read(|store| store.get(kind, id).cloned())
    }

    pub fn denormalize(
        &self,
        kind: EntityKind,
        id: &EntityId,
        schema: &Schema,
    ) -> Result<Option<Value>, StoreError> {
        self.read(|store| store.denormalize(kind, id, schema))
    }

    pub fn view<T: serde::de::DeserializeOwned>(
        &self,
        kind: EntityKind,
        id: &EntityId,
    ) -> Result<Option<T>, StoreError> {
        self.read(|store| store.view(kind, id))?
    }

    /// Freshness-gated lookup: the denormalized entity if its cached copy
    /// satisfies `freshness`, counted as a hit; otherwise `None`, counted
    /// as a miss.
    pub fn lookup(
        &self,
        kind: EntityKind,
        id: &EntityId,
        schema: &Schema,
        freshness: Freshness,
        now: Timestamp,
    ) -> Result<Option<CacheRead<Value>>, StoreError> {
        let read = self.read(|store| {
            if store.is_fresh(kind, id, freshness, now) {
                store.read(kind, id, schema)
            } else {
                None
            }
        })?;

        let counter = if read.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(read)
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        let entry_count = self.read(|store| store.len() as u64)?;
        Ok(CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entry_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_clones_share_one_store() {
        let store = SharedStore::new();
        let other = store.clone();
        store
            .merge(EntityKind::User, EntityId::Num(1), object(json!({"id": 1})), Utc::now())
            .unwrap();
        assert!(other.get(EntityKind::User, &EntityId::Num(1)).unwrap().is_some());
    }

    #[test]
    fn test_lookup_counts_hits_and_misses() {
        let store = SharedStore::new();
        let now = Utc::now();
        let schema = Schema::standard();
        let freshness = Freshness::within(Duration::from_secs(60));
        store
            .merge(EntityKind::Challenge, EntityId::Num(42), object(json!({"id": 42})), now)
            .unwrap();

        let hit = store
            .lookup(EntityKind::Challenge, &EntityId::Num(42), &schema, freshness, now)
            .unwrap();
        assert_eq!(hit.unwrap().fetched_at(), now);

        let later = now + chrono::Duration::seconds(61);
        let miss = store
            .lookup(EntityKind::Challenge, &EntityId::Num(42), &schema, freshness, later)
            .unwrap();
        assert!(miss.is_none());

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_cache_stats_hit_rate_empty() {
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
