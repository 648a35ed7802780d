//! Flattening of fetched payloads into per-kind entity tables.

use crate::schema::{Cardinality, Schema};
use mapcache_core::{EntityId, EntityKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Entity tables produced by one normalization pass.
pub type EntityTables = BTreeMap<EntityKind, BTreeMap<EntityId, Map<String, Value>>>;

/// Top-level ids of a normalized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedResult {
    Single(EntityId),
    Many(Vec<EntityId>),
    /// The payload held no identifiable entity (null, `{}`, a scalar...).
    Empty,
}

/// A fetched payload split into flat entity tables plus the ids of the
/// top-level entities.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPayload {
    pub result: NormalizedResult,
    pub entities: EntityTables,
}

impl NormalizedPayload {
    pub fn empty() -> Self {
        Self {
            result: NormalizedResult::Empty,
            entities: BTreeMap::new(),
        }
    }

    /// The single top-level id, if the payload was one entity.
    pub fn result_id(&self) -> Option<&EntityId> {
        match &self.result {
            NormalizedResult::Single(id) => Some(id),
            _ => None,
        }
    }

    pub fn result_ids(&self) -> Vec<EntityId> {
        match &self.result {
            NormalizedResult::Single(id) => vec![id.clone()],
            NormalizedResult::Many(ids) => ids.clone(),
            NormalizedResult::Empty => Vec::new(),
        }
    }

    pub fn entity(&self, kind: EntityKind, id: &EntityId) -> Option<&Map<String, Value>> {
        self.entities.get(&kind).and_then(|table| table.get(id))
    }

    pub fn entity_count(&self) -> usize {
        self.entities.values().map(BTreeMap::len).sum()
    }
}

/// Normalize a raw payload whose top-level entities are of `kind`.
///
/// Objects without a usable `id` cannot be stored; at the top level they make
/// the result `Empty`, inside arrays they are dropped, and as relation values
/// they are left embedded.
pub fn normalize(raw: &Value, kind: EntityKind, schema: &Schema) -> NormalizedPayload {
    let mut entities = EntityTables::new();
    let result = match raw {
        Value::Object(object) => match normalize_object(object, kind, schema, &mut entities) {
            Some(id) => NormalizedResult::Single(id),
            None => NormalizedResult::Empty,
        },
        Value::Array(items) => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(object) => {
                        if let Some(id) = normalize_object(object, kind, schema, &mut entities) {
                            ids.push(id);
                        } else {
                            tracing::debug!(%kind, "Dropping array element without id");
                        }
                    }
                    other => tracing::debug!(%kind, value = %other, "Dropping non-object array element"),
                }
            }
            NormalizedResult::Many(ids)
        }
        _ => NormalizedResult::Empty,
    };

    NormalizedPayload { result, entities }
}

fn normalize_object(
    object: &Map<String, Value>,
    kind: EntityKind,
    schema: &Schema,
    entities: &mut EntityTables,
) -> Option<EntityId> {
    let id = object.get("id").and_then(EntityId::from_json)?;
    let mut flat = object.clone();

    for relation in schema.relations(kind) {
        let Some(value) = flat.get(&relation.field) else {
            continue;
        };
        let replaced = match (relation.cardinality, value) {
            (Cardinality::Many, Value::Array(items)) => Value::Array(
                items
                    .iter()
                    .map(|item| flatten_reference(item, relation.target, schema, entities))
                    .collect(),
            ),
            (_, other) => flatten_reference(other, relation.target, schema, entities),
        };
        flat.insert(relation.field.clone(), replaced);
    }

    let table = entities.entry(kind).or_default();
    match table.get_mut(&id) {
        // The same entity embedded twice in one payload: later fields win.
        Some(existing) => existing.extend(flat),
        None => {
            table.insert(id.clone(), flat);
        }
    }
    Some(id)
}

fn flatten_reference(
    value: &Value,
    target: EntityKind,
    schema: &Schema,
    entities: &mut EntityTables,
) -> Value {
    match value {
        Value::Object(nested) => match normalize_object(nested, target, schema, entities) {
            Some(id) => id.to_json(),
            None => value.clone(),
        },
        other => other.clone(),
    }
}
