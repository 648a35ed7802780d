//! mapcache Store - Entity Normalizer and Denormalizer
//!
//! Holds the single source of truth for fetched domain objects:
//! payloads are normalized into flat per-kind tables, merged by key (one
//! live copy per kind and id), and reconstructed into nested views on demand
//! by resolving relation references through the store.

pub mod entity_store;
pub mod freshness;
pub mod normalize;
pub mod schema;
pub mod shared;

pub use entity_store::{EntityStore, StoredEntity, META_FIELD};
pub use freshness::{CacheRead, Freshness};
pub use normalize::{normalize, EntityTables, NormalizedPayload, NormalizedResult};
pub use schema::{Cardinality, Relation, Schema};
pub use shared::{CacheStats, SharedStore};

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::Utc;
    use mapcache_core::{EntityId, EntityKind};
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    fn arb_kind() -> impl Strategy<Value = EntityKind> {
        prop::sample::select(EntityKind::ALL.to_vec())
    }

    fn arb_fields() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-z]{1,8}", any::<i32>(), 0..6).prop_map(|fields| {
            fields
                .into_iter()
                .map(|(key, value)| (key, json!(value)))
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Repeated merges of one key leave exactly one copy holding the
        /// latest data and timestamp.
        #[test]
        fn prop_merge_overwrites_not_duplicates(
            kind in arb_kind(),
            id in any::<i64>(),
            first in arb_fields(),
            second in arb_fields(),
            gap_ms in 1i64..100_000,
        ) {
            let mut store = EntityStore::new();
            let t0 = Utc::now();
            let t1 = t0 + chrono::Duration::milliseconds(gap_ms);

            store.merge(kind, EntityId::Num(id), first, t0);
            store.merge(kind, EntityId::Num(id), second.clone(), t1);

            prop_assert_eq!(store.len(), 1);
            let stored = store.get(kind, &EntityId::Num(id)).unwrap();
            prop_assert_eq!(&stored.data, &second);
            prop_assert_eq!(stored.fetched_at, t1);
        }

        /// Denormalizing twice without an intervening merge yields equal
        /// results and leaves the store untouched.
        #[test]
        fn prop_denormalize_is_pure(
            task_id in 1i64..1000,
            challenge_id in 1i64..1000,
            comment_ids in prop::collection::vec(1i64..1000, 0..5),
            cache_parent in any::<bool>(),
        ) {
            let schema = Schema::standard();
            let now = Utc::now();
            let mut store = EntityStore::new();
            let raw = json!({"id": task_id, "parent": challenge_id, "comments": comment_ids});
            store.merge_payload(normalize(&raw, EntityKind::Task, &schema), now);
            if cache_parent {
                store.merge_payload(
                    normalize(&json!({"id": challenge_id, "name": "c"}), EntityKind::Challenge, &schema),
                    now,
                );
            }
            let before = store.len();

            let first = store.denormalize(EntityKind::Task, &EntityId::Num(task_id), &schema);
            let second = store.denormalize(EntityKind::Task, &EntityId::Num(task_id), &schema);

            prop_assert!(first.is_some());
            prop_assert_eq!(first, second);
            prop_assert_eq!(store.len(), before);
        }
    }
}
