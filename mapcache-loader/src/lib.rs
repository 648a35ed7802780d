//! mapcache Loader - Freshness-Gated Loading
//!
//! Decides, on every context change, whether to serve a cached entity,
//! fetch it, or do nothing; applies accepted responses to the shared store;
//! and reports `{data, isLoading, notFound}` back to the consumer. Built on
//! top of it: the task-cluster feed, challenge sessions, and target-user
//! lookup.

pub mod clusters;
pub mod context;
pub mod loader;
pub mod resource;
pub mod session;
pub mod state;
pub mod user;

pub use clusters::{
    BoundingBox, ClusterCriteria, ClusterFeed, ClusterReceipt, ClusterRequest, ClusterSet,
    PendingClusters, CHALLENGE_EXCLUDE_LOCAL, CHALLENGE_INCLUDE_LOCAL,
};
pub use context::LoaderContext;
pub use loader::FreshnessGatedLoader;
pub use resource::{
    ChallengeResource, FollowUp, FollowUpAction, LoadableResource, ProjectResource, TaskResource,
    UserDetail, UserResource,
};
pub use session::{ChallengeSession, SessionView};
pub use state::{LoadDecision, LoadReport, LoadState, PendingFetch};
pub use user::{find_target_user, normalize_avatar_url, TargetUser, TargetUserLookup};

/// Loader for the challenge identity in the route.
pub type ChallengeLoader = FreshnessGatedLoader<ChallengeResource>;
/// Loader for the task identity in the route.
pub type TaskLoader = FreshnessGatedLoader<TaskResource>;
/// Loader for a project addressed directly.
pub type ProjectLoader = FreshnessGatedLoader<ProjectResource>;
