//! Entity kinds and store keys.

use crate::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator for the kinds of entity held in the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Challenge,
    VirtualChallenge,
    Project,
    Task,
    Comment,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Challenge,
        EntityKind::VirtualChallenge,
        EntityKind::Project,
        EntityKind::Task,
        EntityKind::Comment,
        EntityKind::User,
    ];

    /// Collection name used for this kind in normalized payloads.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Challenge => "challenges",
            Self::VirtualChallenge => "virtualChallenges",
            Self::Project => "projects",
            Self::Task => "tasks",
            Self::Comment => "comments",
            Self::User => "users",
        }
    }

    pub fn from_collection(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.collection() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Address of one entity in the store: kind first, then id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<EntityId>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
