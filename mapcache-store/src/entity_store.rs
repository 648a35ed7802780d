//! The flat entity store and its denormalizer.

use crate::freshness::{CacheRead, Freshness};
use crate::normalize::NormalizedPayload;
use crate::schema::{Cardinality, Schema};
use mapcache_core::{EntityId, EntityKey, EntityKind, StoreError, Timestamp};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

/// Key under which denormalized objects expose retrieval metadata.
pub const META_FIELD: &str = "_meta";

/// One cached entity with its retrieval timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntity {
    pub data: Map<String, Value>,
    pub fetched_at: Timestamp,
}

/// Fetched entities keyed by kind, then id. At most one copy per key.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    entities: HashMap<EntityKind, HashMap<EntityId, StoredEntity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entity at `(kind, id)`, stamping `fetched_at`.
    pub fn merge(&mut self, kind: EntityKind, id: EntityId, data: Map<String, Value>, now: Timestamp) {
        self.entities.entry(kind).or_default().insert(
            id,
            StoredEntity {
                data,
                fetched_at: now,
            },
        );
    }

    /// Merge every entity of a normalized payload. Returns how many were written.
    pub fn merge_payload(&mut self, payload: NormalizedPayload, now: Timestamp) -> usize {
        let mut written = 0;
        for (kind, table) in payload.entities {
            for (id, data) in table {
                self.merge(kind, id, data, now);
                written += 1;
            }
        }
        written
    }

    pub fn get(&self, kind: EntityKind, id: &EntityId) -> Option<&StoredEntity> {
        self.entities.get(&kind).and_then(|table| table.get(id))
    }

    pub fn contains(&self, kind: EntityKind, id: &EntityId) -> bool {
        self.get(kind, id).is_some()
    }

    pub fn fetched_at(&self, kind: EntityKind, id: &EntityId) -> Option<Timestamp> {
        self.get(kind, id).map(|entity| entity.fetched_at)
    }

    pub fn remove(&mut self, kind: EntityKind, id: &EntityId) -> Option<StoredEntity> {
        self.entities.get_mut(&kind).and_then(|table| table.remove(id))
    }

    /// Set a single field on a cached entity without touching `fetched_at`.
    /// Used to attach ancillary data (comments, actions) to a parent.
    /// Returns false when the entity is not cached.
    pub fn set_field(&mut self, kind: EntityKind, id: &EntityId, field: &str, value: Value) -> bool {
        match self.entities.get_mut(&kind).and_then(|table| table.get_mut(id)) {
            Some(entity) => {
                entity.data.insert(field.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Whether the cached copy satisfies `freshness` at `now`.
    pub fn is_fresh(&self, kind: EntityKind, id: &EntityId, freshness: Freshness, now: Timestamp) -> bool {
        self.fetched_at(kind, id)
            .map(|fetched_at| freshness.admits(fetched_at, now))
            .unwrap_or(false)
    }

    /// All cached entities of one kind, in no particular order.
    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = (&EntityId, &StoredEntity)> {
        self.entities.get(&kind).into_iter().flat_map(|table| table.iter())
    }

    /// Deserialize a cached entity's raw fields into a typed view. An
    /// entity whose fields do not fit the view is an error, not a miss.
    pub fn view<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        id: &EntityId,
    ) -> Result<Option<T>, StoreError> {
        let Some(entity) = self.get(kind, id) else {
            return Ok(None);
        };
        serde_json::from_value(Value::Object(entity.data.clone()))
            .map(Some)
            .map_err(|e| StoreError::MalformedEntity {
                kind,
                reason: format!("{id}: {e}"),
            })
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Reconstruct the nested view of `(kind, id)`, resolving every relation
    /// the schema names to the referenced entity, or `null` when that entity
    /// is not cached. Returns `None` when the root is not cached.
    ///
    /// An entity already being expanded higher up the current path is emitted
    /// as its bare id, so cyclic schemas terminate. The store is not modified.
    pub fn denormalize(&self, kind: EntityKind, id: &EntityId, schema: &Schema) -> Option<Value> {
        let mut path = HashSet::new();
        self.expand(kind, id, schema, &mut path)
    }

    /// Denormalize and wrap with the root's retrieval time.
    pub fn read(&self, kind: EntityKind, id: &EntityId, schema: &Schema) -> Option<CacheRead<Value>> {
        let fetched_at = self.fetched_at(kind, id)?;
        self.denormalize(kind, id, schema)
            .map(|value| CacheRead::from_cache(value, fetched_at))
    }

    fn expand(
        &self,
        kind: EntityKind,
        id: &EntityId,
        schema: &Schema,
        path: &mut HashSet<EntityKey>,
    ) -> Option<Value> {
        let stored = self.get(kind, id)?;
        let key = EntityKey::new(kind, id.clone());
        path.insert(key.clone());

        let mut object = stored.data.clone();
        for relation in schema.relations(kind) {
            let Some(value) = object.get(&relation.field) else {
                continue;
            };
            let resolved = match (relation.cardinality, value) {
                (Cardinality::Many, Value::Array(items)) => Value::Array(
                    items
                        .iter()
                        .map(|item| self.resolve(item, relation.target, schema, path))
                        .collect(),
                ),
                (_, other) => self.resolve(other, relation.target, schema, path),
            };
            object.insert(relation.field.clone(), resolved);
        }
        object.insert(
            META_FIELD.to_string(),
            json!({ "fetchedAt": stored.fetched_at.to_rfc3339() }),
        );

        path.remove(&key);
        Some(Value::Object(object))
    }

    fn resolve(
        &self,
        reference: &Value,
        target: EntityKind,
        schema: &Schema,
        path: &mut HashSet<EntityKey>,
    ) -> Value {
        // Embedded objects and nulls are not references.
        let Some(id) = EntityId::from_json(reference) else {
            return reference.clone();
        };
        if path.contains(&EntityKey::new(target, id.clone())) {
            return reference.clone();
        }
        self.expand(target, &id, schema, path).unwrap_or(Value::Null)
    }
}
