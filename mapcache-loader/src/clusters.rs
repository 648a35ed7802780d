//! Task-cluster feed.
//!
//! The map shows one set of task clusters at a time. That set is a single
//! sequenced slot: every request gets a fetch token and a response older
//! than the last accepted one is dropped, so a slow query for an old map
//! position cannot replace the clusters for the current one. Panning
//! triggers go through a leading-edge debounce gate.

use crate::context::LoaderContext;
use mapcache_core::{ChallengeIdentity, ChallengeStatus, ErrorKind, TaskCluster, Timestamp, TransportError};
use mapcache_fetch::{routes, Admission, DebounceGate, Endpoint, FetchToken, SlotKey};
use serde_json::{json, Value};
use std::fmt;

/// `cLocal` value excluding local challenges.
pub const CHALLENGE_EXCLUDE_LOCAL: i64 = 0;
/// `cLocal` value including local challenges.
pub const CHALLENGE_INCLUDE_LOCAL: i64 = 1;

const CLUSTER_SLOT: &str = "taskClusters";

/// Map bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

/// Search criteria for a cluster request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterCriteria {
    pub bounding_box: Option<BoundingBox>,
    /// Free-text search.
    pub search_query: Option<String>,
    /// Challenge-name search.
    pub challenge_search: Option<String>,
    pub saved_challenges_only: bool,
    /// Limit to enabled challenges and projects when browsing without a
    /// challenge. Defaults to true.
    pub only_enabled: Option<bool>,
    pub challenge_statuses: Vec<ChallengeStatus>,
    /// Include global challenges.
    pub global: bool,
    pub task_property_search: Option<Value>,
}

impl ClusterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bounding_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }

    pub fn with_search_query(mut self, query: impl Into<String>) -> Self {
        self.search_query = Some(query.into());
        self
    }

    pub fn with_challenge_search(mut self, query: impl Into<String>) -> Self {
        self.challenge_search = Some(query.into());
        self
    }

    pub fn with_saved_challenges_only(mut self, saved_only: bool) -> Self {
        self.saved_challenges_only = saved_only;
        self
    }

    pub fn with_only_enabled(mut self, only_enabled: bool) -> Self {
        self.only_enabled = Some(only_enabled);
        self
    }

    pub fn with_challenge_statuses(mut self, statuses: Vec<ChallengeStatus>) -> Self {
        self.challenge_statuses = statuses;
        self
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn with_task_property_search(mut self, search: Value) -> Self {
        self.task_property_search = Some(search);
        self
    }

    /// Render into the cluster endpoint for `challenge_id`.
    ///
    /// Without a challenge the search is limited: enabled challenges and
    /// projects only (unless disabled), and no local challenges when
    /// limited to enabled ones.
    pub fn endpoint(&self, challenge_id: Option<i64>, points: u32) -> Endpoint {
        let mut endpoint = routes::task_clusters()
            .with_param("points", points)
            .with_optional_param("cid", challenge_id)
            .with_optional_param("bounds", self.bounding_box)
            .with_optional_param("sq", self.search_query.as_deref())
            .with_optional_param("cs", self.challenge_search.as_deref());
        if self.saved_challenges_only {
            endpoint = endpoint.with_param("onlySaved", true);
        }

        if challenge_id.is_none() {
            let only_enabled = self.only_enabled.unwrap_or(true);
            if !self.challenge_statuses.is_empty() {
                let statuses: Vec<String> = self
                    .challenge_statuses
                    .iter()
                    .map(|status| i64::from(*status).to_string())
                    .collect();
                endpoint = endpoint.with_param("cStatus", statuses.join(","));
            }
            let local = if only_enabled {
                CHALLENGE_EXCLUDE_LOCAL
            } else {
                CHALLENGE_INCLUDE_LOCAL
            };
            endpoint = endpoint
                .with_param("ce", only_enabled)
                .with_param("pe", only_enabled)
                .with_param("cg", self.global)
                .with_param("cLocal", local);
        }

        match &self.task_property_search {
            Some(search) => endpoint.with_body(json!({ "taskPropertySearch": search })),
            None => endpoint,
        }
    }
}

/// One cluster request: whose clusters, and which.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterRequest {
    pub challenge: Option<ChallengeIdentity>,
    pub criteria: ClusterCriteria,
    /// Fetch even when cluster requests are disabled by config.
    pub override_disable: bool,
}

impl ClusterRequest {
    pub fn for_challenge(challenge: ChallengeIdentity) -> Self {
        Self {
            challenge: Some(challenge),
            ..Self::default()
        }
    }

    pub fn browsing(criteria: ClusterCriteria) -> Self {
        Self {
            criteria,
            ..Self::default()
        }
    }
}

/// Contents of the cluster slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClusterSet {
    pub challenge_id: Option<i64>,
    pub is_virtual: bool,
    pub clusters: Vec<TaskCluster>,
    pub token: Option<FetchToken>,
    pub received_at: Option<Timestamp>,
}

impl ClusterSet {
    pub fn is_for(&self, challenge: ChallengeIdentity) -> bool {
        self.challenge_id == Some(challenge.id) && self.is_virtual == challenge.is_virtual
    }
}

/// A cluster fetch that has been issued a token.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingClusters {
    pub token: FetchToken,
    pub request: ClusterRequest,
    pub endpoint: Endpoint,
}

/// What happened to a cluster response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterReceipt {
    /// Replaced the slot with this many clusters.
    Applied(usize),
    /// Older than the slot's last accepted response.
    Discarded,
    /// The fetch failed; the slot is unchanged.
    Failed,
}

pub struct ClusterFeed {
    ctx: LoaderContext,
    slot: SlotKey,
    current: ClusterSet,
    gate: DebounceGate<ClusterRequest>,
}

impl ClusterFeed {
    pub fn new(ctx: LoaderContext) -> Self {
        let gate = DebounceGate::new(ctx.config.cluster_debounce);
        Self {
            ctx,
            slot: SlotKey::named(CLUSTER_SLOT),
            current: ClusterSet::default(),
            gate,
        }
    }

    pub fn current(&self) -> &ClusterSet {
        &self.current
    }

    /// The slot contents, only if they belong to `challenge`.
    pub fn clusters_for(&self, challenge: ChallengeIdentity) -> Option<&ClusterSet> {
        self.current.is_for(challenge).then_some(&self.current)
    }

    /// Issue a token for `request`. `None` when cluster requests are
    /// disabled.
    pub fn prepare(&self, request: ClusterRequest) -> Option<PendingClusters> {
        if !self.ctx.config.clusters_enabled && !request.override_disable {
            tracing::debug!("Task cluster requests disabled");
            return None;
        }
        let endpoint = request.criteria.endpoint(
            request.challenge.map(|challenge| challenge.id),
            self.ctx.config.cluster_points,
        );
        Some(PendingClusters {
            token: self.ctx.sequencer.issue_token(),
            request,
            endpoint,
        })
    }

    /// Apply a cluster response if its token is not stale.
    pub fn receive(
        &mut self,
        pending: PendingClusters,
        result: Result<Value, TransportError>,
    ) -> ClusterReceipt {
        let PendingClusters {
            token,
            request,
            endpoint,
        } = pending;
        // A failure leaves the slot's token where it was, so an older
        // request that still succeeds can fill the slot.
        let response = match result {
            Ok(response) => response,
            Err(error) if self.ctx.sequencer.admits(&self.slot, &token) => {
                tracing::warn!(%endpoint, %error, "Task cluster fetch failed");
                self.ctx.errors.report(ErrorKind::ClusterFetchFailure);
                return ClusterReceipt::Failed;
            }
            Err(error) => {
                tracing::debug!(%endpoint, %error, "Ignoring failure of superseded cluster fetch");
                return ClusterReceipt::Discarded;
            }
        };
        if !self.ctx.sequencer.accept(&self.slot, &token) {
            return ClusterReceipt::Discarded;
        }

        let clusters = parse_clusters(response);
        let count = clusters.len();
        self.current = ClusterSet {
            challenge_id: request.challenge.map(|challenge| challenge.id),
            is_virtual: request.challenge.is_some_and(|challenge| challenge.is_virtual),
            clusters,
            token: Some(token),
            received_at: Some(self.ctx.now()),
        };
        ClusterReceipt::Applied(count)
    }

    /// Fetch immediately, bypassing the debounce gate.
    pub async fn fetch(&mut self, request: ClusterRequest) -> Option<ClusterReceipt> {
        let pending = self.prepare(request)?;
        let result = self.ctx.transport.execute(&pending.endpoint).await;
        Some(self.receive(pending, result))
    }

    /// Fetch through the debounce gate. A request inside the window is held
    /// and only goes out from a later [`Self::flush`].
    pub async fn request(&mut self, request: ClusterRequest) -> Option<ClusterReceipt> {
        match self.gate.trigger(request, self.ctx.now()) {
            Admission::Fire(request) => self.fetch(request).await,
            Admission::Deferred => None,
        }
    }

    /// Send the held request once the debounce window has lapsed.
    pub async fn flush(&mut self) -> Option<ClusterReceipt> {
        let request = self.gate.flush(self.ctx.now())?;
        self.fetch(request).await
    }

    /// When a held request becomes flushable.
    pub fn flush_deadline(&self) -> Option<Timestamp> {
        self.gate.deadline()
    }

    /// Empty the slot and drop any held request. The next response is
    /// accepted whatever its token.
    pub fn clear(&mut self) {
        self.current = ClusterSet::default();
        self.gate.reset();
        self.ctx.sequencer.forget(&self.slot);
    }
}

/// Anything but an array yields no clusters. Elements that do not look like
/// clusters are skipped.
fn parse_clusters(response: Value) -> Vec<TaskCluster> {
    let Value::Array(items) = response else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(cluster) => Some(cluster),
            Err(error) => {
                tracing::debug!(%error, "Skipping malformed task cluster");
                None
            }
        })
        .collect()
}
