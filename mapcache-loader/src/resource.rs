//! Per-resource load policies.
//!
//! A [`LoadableResource`] tells the loader which entity kind it caches,
//! where to fetch it from, how to tell a missing entity from a present one,
//! which error kinds to report, and which ancillary fetches to issue once
//! the entity itself has been accepted.

use crate::user::find_target_user;
use mapcache_core::{ChallengeView, EntityId, EntityKind, ErrorKind};
use mapcache_fetch::{routes, Endpoint};
use mapcache_store::{EntityStore, NormalizedPayload};
use serde_json::{Map, Value};

/// What to do with an ancillary response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpAction {
    /// Normalize as `kind` entities and merge them.
    Merge(EntityKind),
    /// Merge as `kind`, then store the resulting ids on the parent's `field`.
    MergeAndAttach { kind: EntityKind, field: &'static str },
    /// Copy `field` out of the response onto the parent. Array responses
    /// are searched for the element whose id matches the parent.
    Attach { field: &'static str },
    /// Store the whole response on the parent's `field`.
    AttachResponse { field: &'static str },
}

/// An ancillary fetch issued after its parent was accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUp {
    pub endpoint: Endpoint,
    pub action: FollowUpAction,
    /// Reported when the fetch fails. Never changes the parent's state.
    pub failure: ErrorKind,
}

pub trait LoadableResource: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn endpoint(&self, id: &EntityId) -> Endpoint;

    /// Reported when the server says the entity is deleted or absent.
    fn missing_error(&self) -> ErrorKind;

    /// Reported when the fetch itself fails.
    fn failure_error(&self) -> ErrorKind;

    /// Store id under which `requested` is cached, if it is.
    fn cached_id(&self, store: &EntityStore, requested: &EntityId) -> Option<EntityId> {
        store
            .contains(self.kind(), requested)
            .then(|| requested.clone())
    }

    /// Whether a normalized response means the entity does not exist: no
    /// top-level entity, a different entity, or one flagged `deleted`.
    fn is_missing(&self, payload: &NormalizedPayload, requested: &EntityId) -> bool {
        match payload.result_id() {
            Some(id) if id == requested => is_deleted(payload.entity(self.kind(), id)),
            _ => true,
        }
    }

    /// Ancillary fetches for a freshly accepted entity.
    fn follow_ups(&self, _id: &EntityId, _entity: &Map<String, Value>) -> Vec<FollowUp> {
        Vec::new()
    }
}

fn is_deleted(entity: Option<&Map<String, Value>>) -> bool {
    entity.map_or(true, |entity| {
        entity
            .get("deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    })
}

/// Challenges, with their project, comments, activity since creation and
/// action counts as follow-ups.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeResource;

impl LoadableResource for ChallengeResource {
    fn kind(&self) -> EntityKind {
        EntityKind::Challenge
    }

    fn endpoint(&self, id: &EntityId) -> Endpoint {
        routes::challenge(id)
    }

    fn missing_error(&self) -> ErrorKind {
        ErrorKind::ChallengeDoesNotExist
    }

    fn failure_error(&self) -> ErrorKind {
        ErrorKind::ChallengeFetchFailure
    }

    fn follow_ups(&self, id: &EntityId, entity: &Map<String, Value>) -> Vec<FollowUp> {
        let mut follow_ups = Vec::with_capacity(4);
        if let Some(project_id) = entity.get("parent").and_then(Value::as_i64) {
            follow_ups.push(FollowUp {
                endpoint: routes::project(&EntityId::Num(project_id)),
                action: FollowUpAction::Merge(EntityKind::Project),
                failure: ErrorKind::ProjectFetchFailure,
            });
        }
        follow_ups.push(FollowUp {
            endpoint: routes::challenge_comments(id),
            action: FollowUpAction::MergeAndAttach {
                kind: EntityKind::Comment,
                field: "comments",
            },
            failure: ErrorKind::CommentFetchFailure,
        });

        let created = serde_json::from_value::<ChallengeView>(Value::Object(entity.clone()))
            .ok()
            .and_then(|view| view.created_at());
        follow_ups.push(FollowUp {
            endpoint: routes::challenge_activity(id, created),
            action: FollowUpAction::AttachResponse { field: "activity" },
            failure: ErrorKind::ChallengeFetchFailure,
        });
        follow_ups.push(FollowUp {
            endpoint: routes::challenge_actions(id),
            action: FollowUpAction::Attach { field: "actions" },
            failure: ErrorKind::ChallengeFetchFailure,
        });
        follow_ups
    }
}

/// Tasks, with their comments as a follow-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskResource;

impl LoadableResource for TaskResource {
    fn kind(&self) -> EntityKind {
        EntityKind::Task
    }

    fn endpoint(&self, id: &EntityId) -> Endpoint {
        routes::task(id)
    }

    fn missing_error(&self) -> ErrorKind {
        ErrorKind::TaskDoesNotExist
    }

    fn failure_error(&self) -> ErrorKind {
        ErrorKind::TaskFetchFailure
    }

    fn follow_ups(&self, id: &EntityId, _entity: &Map<String, Value>) -> Vec<FollowUp> {
        vec![FollowUp {
            endpoint: routes::task_comments(id),
            action: FollowUpAction::MergeAndAttach {
                kind: EntityKind::Comment,
                field: "comments",
            },
            failure: ErrorKind::CommentFetchFailure,
        }]
    }
}

/// Projects. Missing and failed loads report the same error kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectResource;

impl LoadableResource for ProjectResource {
    fn kind(&self) -> EntityKind {
        EntityKind::Project
    }

    fn endpoint(&self, id: &EntityId) -> Endpoint {
        routes::project(id)
    }

    fn missing_error(&self) -> ErrorKind {
        ErrorKind::ProjectFetchFailure
    }

    fn failure_error(&self) -> ErrorKind {
        ErrorKind::ProjectFetchFailure
    }
}

/// How much of a user record to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserDetail {
    /// Full record with settings; only for oneself or super users.
    Settings,
    /// Public profile.
    #[default]
    Basic,
}

/// Users, addressed by id, OSM id or display name.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserResource {
    pub detail: UserDetail,
}

impl UserResource {
    pub fn new(detail: UserDetail) -> Self {
        Self { detail }
    }
}

impl LoadableResource for UserResource {
    fn kind(&self) -> EntityKind {
        EntityKind::User
    }

    fn endpoint(&self, id: &EntityId) -> Endpoint {
        match self.detail {
            UserDetail::Settings => routes::user_settings(id),
            UserDetail::Basic => routes::basic_user(id),
        }
    }

    fn missing_error(&self) -> ErrorKind {
        ErrorKind::UserNotFound
    }

    fn failure_error(&self) -> ErrorKind {
        ErrorKind::UserFetchFailure
    }

    fn cached_id(&self, store: &EntityStore, requested: &EntityId) -> Option<EntityId> {
        find_target_user(store, &requested.to_string())
    }

    /// The response is keyed by numeric id even when the request named the
    /// user, so any present, undeleted user counts.
    fn is_missing(&self, payload: &NormalizedPayload, _requested: &EntityId) -> bool {
        match payload.result_id() {
            Some(id) => is_deleted(payload.entity(EntityKind::User, id)),
            None => true,
        }
    }
}
