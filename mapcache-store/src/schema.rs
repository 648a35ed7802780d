//! Relation schema registry.
//!
//! A schema says, per entity kind, which fields hold references to other
//! entities. Relations point at a target *kind*, not at a nested schema
//! value, so a registry may describe cyclic graphs (a user following users,
//! a task pointing back at its comments and the comments at the task).
//! Denormalization guards against revisits itself.

use mapcache_core::EntityKind;
use std::collections::HashMap;

/// How many entities a relation field refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// A reference-holding field on an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub field: String,
    pub target: EntityKind,
    pub cardinality: Cardinality,
}

/// Per-kind relation registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    relations: HashMap<EntityKind, Vec<Relation>>,
}

impl Schema {
    /// Empty registry: every kind is a leaf.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry for the mapping API's entity graph.
    pub fn standard() -> Self {
        Self::new()
            .one(EntityKind::Challenge, "parent", EntityKind::Project)
            .many(EntityKind::Challenge, "comments", EntityKind::Comment)
            .one(EntityKind::Task, "parent", EntityKind::Challenge)
            .many(EntityKind::Task, "comments", EntityKind::Comment)
            .one(EntityKind::Comment, "taskId", EntityKind::Task)
    }

    pub fn with_relation(
        mut self,
        kind: EntityKind,
        field: impl Into<String>,
        target: EntityKind,
        cardinality: Cardinality,
    ) -> Self {
        let field = field.into();
        let entry = self.relations.entry(kind).or_default();
        entry.retain(|relation| relation.field != field);
        entry.push(Relation {
            field,
            target,
            cardinality,
        });
        self
    }

    pub fn one(self, kind: EntityKind, field: impl Into<String>, target: EntityKind) -> Self {
        self.with_relation(kind, field, target, Cardinality::One)
    }

    pub fn many(self, kind: EntityKind, field: impl Into<String>, target: EntityKind) -> Self {
        self.with_relation(kind, field, target, Cardinality::Many)
    }

    pub fn relations(&self, kind: EntityKind) -> &[Relation] {
        self.relations.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schema_relations() {
        let schema = Schema::standard();
        let task = schema.relations(EntityKind::Task);
        assert_eq!(task.len(), 2);
        assert!(task
            .iter()
            .any(|r| r.field == "comments" && r.cardinality == Cardinality::Many));
        assert_eq!(schema.relations(EntityKind::Challenge).len(), 2);
        assert!(schema.relations(EntityKind::User).is_empty());
    }

    #[test]
    fn test_redefining_a_field_replaces_it() {
        let schema = Schema::new()
            .one(EntityKind::Task, "parent", EntityKind::Challenge)
            .one(EntityKind::Task, "parent", EntityKind::VirtualChallenge);
        let relations = schema.relations(EntityKind::Task);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].target, EntityKind::VirtualChallenge);
    }
}
