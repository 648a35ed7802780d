//! API routes used by the loaders.

use crate::endpoint::Endpoint;
use mapcache_core::{EntityId, Timestamp};

pub fn challenge(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/challenge/{}", id))
}

/// Per-status action counts for a challenge.
pub fn challenge_actions(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/data/challenge/{}", id))
}

pub fn challenge_comments(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/challenge/{}/comments", id))
}

/// Daily activity for a challenge, from `start` (a calendar day) onwards.
pub fn challenge_activity(id: &EntityId, start: Option<Timestamp>) -> Endpoint {
    Endpoint::get(format!("/data/challenge/{}/activity", id))
        .with_optional_param("start", start.map(|start| start.format("%Y-%m-%d")))
}

pub fn project(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/project/{}", id))
}

pub fn task(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/task/{}", id))
}

pub fn task_comments(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/task/{}/comments", id))
}

/// Cluster search; criteria travel as query parameters plus an optional
/// JSON body, so this is a PUT.
pub fn task_clusters() -> Endpoint {
    Endpoint::put("/taskCluster")
}

/// Full user record including settings. Only available for the requesting
/// user or to super users.
pub fn user_settings(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/user/{}", id))
}

/// Public profile of any user, addressed by id, OSM id or display name.
pub fn basic_user(id: &EntityId) -> Endpoint {
    Endpoint::get(format!("/user/{}/public", id))
}
