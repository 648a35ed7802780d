//! Challenge session: the challenge being browsed or administered, plus its
//! task clusters.

use crate::clusters::{ClusterFeed, ClusterReceipt, ClusterRequest, ClusterSet};
use crate::context::LoaderContext;
use crate::loader::FreshnessGatedLoader;
use crate::resource::ChallengeResource;
use crate::state::LoadReport;
use mapcache_core::{ChallengeIdentity, ChallengeView, EntityId, EntityKind, RouteParams};

/// What a session consumer renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionView {
    pub challenge: Option<ChallengeIdentity>,
    pub load: LoadReport,
    /// Clusters, only when they belong to `challenge`.
    pub clusters: Option<ClusterSet>,
}

pub struct ChallengeSession {
    ctx: LoaderContext,
    loader: FreshnessGatedLoader<ChallengeResource>,
    clusters: ClusterFeed,
    include_tasks: bool,
    identity: Option<ChallengeIdentity>,
}

impl ChallengeSession {
    /// With `include_tasks`, opening a usable challenge also fetches its
    /// task clusters.
    pub fn new(ctx: LoaderContext, include_tasks: bool) -> Self {
        Self {
            loader: FreshnessGatedLoader::new(ChallengeResource, ctx.clone()),
            clusters: ClusterFeed::new(ctx.clone()),
            ctx,
            include_tasks,
            identity: None,
        }
    }

    pub fn identity(&self) -> Option<ChallengeIdentity> {
        self.identity
    }

    pub fn loader(&self) -> &FreshnessGatedLoader<ChallengeResource> {
        &self.loader
    }

    pub fn clusters(&self) -> &ClusterFeed {
        &self.clusters
    }

    /// For panning and filter changes on the session's map.
    pub fn clusters_mut(&mut self) -> &mut ClusterFeed {
        &mut self.clusters
    }

    /// Follow the challenge named by the current route.
    pub async fn navigate(&mut self, params: &RouteParams) -> SessionView {
        self.open(params.challenge_identity()).await
    }

    pub async fn open(&mut self, identity: Option<ChallengeIdentity>) -> SessionView {
        self.identity = identity;
        let Some(challenge) = identity else {
            self.loader.clear();
            return self.view();
        };

        if challenge.is_virtual {
            // Virtual challenges are assembled client side and never fetched.
            self.loader.clear();
            if self.include_tasks {
                self.start_clusters(challenge).await;
            }
            return self.view();
        }

        let report = self.loader.load(Some(EntityId::Num(challenge.id))).await;
        if self.include_tasks && !report.is_loading && report.data.is_some() {
            if self.has_usable_status(challenge.id) {
                self.start_clusters(challenge).await;
            } else {
                tracing::debug!(challenge_id = challenge.id, "Challenge not usable; skipping task clusters");
            }
        }
        self.view()
    }

    /// Current view, re-read from the store.
    pub fn view(&self) -> SessionView {
        let Some(challenge) = self.identity else {
            return SessionView::default();
        };

        let load = if challenge.is_virtual {
            let data = self
                .ctx
                .store
                .denormalize(
                    EntityKind::VirtualChallenge,
                    &EntityId::Num(challenge.id),
                    &self.ctx.schema,
                )
                .unwrap_or_else(|error| {
                    tracing::warn!(%error, "Could not read entity store");
                    None
                });
            LoadReport::loaded(data)
        } else {
            self.loader.report()
        };

        SessionView {
            challenge: Some(challenge),
            load,
            clusters: self.clusters.clusters_for(challenge).cloned(),
        }
    }

    fn has_usable_status(&self, challenge_id: i64) -> bool {
        match self
            .ctx
            .store
            .view::<ChallengeView>(EntityKind::Challenge, &EntityId::Num(challenge_id))
        {
            Ok(Some(view)) => view.has_usable_status(),
            Ok(None) => false,
            Err(error) => {
                tracing::warn!(%error, "Could not read entity store");
                false
            }
        }
    }

    async fn start_clusters(&mut self, challenge: ChallengeIdentity) {
        if self.clusters.clusters_for(challenge).is_some() {
            return;
        }
        if let Some(ClusterReceipt::Failed) = self
            .clusters
            .fetch(ClusterRequest::for_challenge(challenge))
            .await
        {
            tracing::debug!(challenge_id = challenge.id, "Task clusters unavailable");
        }
    }
}
