//! Freshness-gated loader.
//!
//! On every context change the loader decides whether to serve the cached
//! copy, issue a fetch, or do nothing:
//!
//! 1. No identity: drop whatever was loaded and stop.
//! 2. A cached copy younger than the freshness threshold is adopted as is.
//! 3. Otherwise, unless a fetch for the same identity is already
//!    outstanding, a token is issued and the fetch goes out.
//! 4. The response is applied only if the sequencer accepts its token for
//!    the entity's slot; an accepted response for the current identity moves
//!    the state to loaded, not found or failed. A transport failure is
//!    only checked against the slot and never advances it, so an older
//!    request that later succeeds is still applied.
//!
//! Deciding and completing are split ([`FreshnessGatedLoader::begin`] and
//! [`FreshnessGatedLoader::complete`]) so a caller can keep several fetches
//! in flight and complete them in whatever order they arrive.
//! [`FreshnessGatedLoader::load`] does both for the common case.

use crate::context::LoaderContext;
use crate::resource::{FollowUp, FollowUpAction, LoadableResource};
use crate::state::{LoadDecision, LoadReport, LoadState, PendingFetch};
use futures_util::future::join_all;
use mapcache_core::{parse_numeric_id, EntityId, EntityKind, TransportError};
use mapcache_fetch::{FetchToken, SlotKey};
use mapcache_store::normalize;
use serde_json::Value;

pub struct FreshnessGatedLoader<R> {
    resource: R,
    ctx: LoaderContext,
    state: LoadState,
    /// Identity the consumer currently wants.
    current: Option<EntityId>,
    /// Store id the current identity resolved to. Differs from `current`
    /// only for resources addressed by alias, such as users by name.
    resolved: Option<EntityId>,
}

impl<R: LoadableResource> FreshnessGatedLoader<R> {
    pub fn new(resource: R, ctx: LoaderContext) -> Self {
        Self {
            resource,
            ctx,
            state: LoadState::Idle,
            current: None,
            resolved: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn current_identity(&self) -> Option<&EntityId> {
        self.current.as_ref()
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn context(&self) -> &LoaderContext {
        &self.ctx
    }

    /// Decide what a context change to `identity` requires.
    pub fn begin(&mut self, identity: Option<EntityId>) -> LoadDecision {
        let Some(identity) = identity else {
            if self.current.is_some() {
                tracing::debug!(kind = %self.resource.kind(), "Identity cleared");
            }
            self.clear();
            return LoadDecision::Cleared(self.report());
        };

        if self.current.as_ref() == Some(&identity) && self.state.is_terminal() {
            return LoadDecision::Terminal(self.report());
        }

        self.current = Some(identity.clone());
        if let Some((stored_id, data)) = self.fresh_copy(&identity) {
            self.resolved = Some(stored_id);
            self.state = LoadState::Loaded { identity };
            return LoadDecision::Cached(LoadReport::loaded(Some(data)));
        }

        if self.state.is_loading_identity(&identity) {
            return LoadDecision::AlreadyLoading(self.report());
        }

        // A stale copy, if any, is shown while the fetch is out.
        self.resolved = self.cached_id(&identity);
        let token = self.ctx.sequencer.issue_token();
        let endpoint = self.resource.endpoint(&identity);
        tracing::debug!(
            kind = %self.resource.kind(),
            %identity,
            %token,
            %endpoint,
            "Issuing fetch"
        );
        self.state = LoadState::Loading {
            identity: identity.clone(),
            token,
        };
        LoadDecision::Fetch(PendingFetch {
            identity,
            token,
            endpoint,
        })
    }

    /// Apply the result of a fetch issued by [`Self::begin`].
    pub async fn complete(
        &mut self,
        pending: PendingFetch,
        result: Result<Value, TransportError>,
    ) -> LoadReport {
        let PendingFetch {
            identity,
            token,
            endpoint,
        } = pending;
        let kind = self.resource.kind();

        let slot = SlotKey::entity(kind, &identity);
        let is_current = self.current.as_ref() == Some(&identity);

        // Transport failures are checked against the slot without advancing
        // it; only an answer from the server moves the slot on.
        let raw = match result {
            Err(error) if !error.is_not_found() => {
                if !self.ctx.sequencer.admits(&slot, &token) {
                    tracing::debug!(%kind, %identity, %token, "Ignoring failure of superseded fetch");
                    return self.report();
                }
                tracing::warn!(%kind, %identity, %endpoint, %error, "Fetch failed");
                if is_current {
                    self.fail(identity);
                } else {
                    self.ctx.errors.report(self.resource.failure_error());
                }
                return self.report();
            }
            _ if !self.ctx.sequencer.accept(&slot, &token) => return self.report(),
            Ok(raw) => raw,
            Err(_) => {
                self.mark_missing(identity, is_current);
                return self.report();
            }
        };

        let payload = normalize(&raw, kind, &self.ctx.schema);
        if self.resource.is_missing(&payload, &identity) {
            self.mark_missing(identity, is_current);
            return self.report();
        }

        let stored_id = payload.result_id().cloned().unwrap_or_else(|| identity.clone());
        if let Err(error) = self.ctx.store.merge_payload(payload, self.ctx.now()) {
            tracing::warn!(%kind, %identity, %error, "Could not merge response");
            if is_current {
                self.fail(identity);
            }
            return self.report();
        }

        if is_current {
            self.resolved = Some(stored_id.clone());
            self.state = LoadState::Loaded { identity };
        }

        if self.ctx.config.follow_ups_enabled {
            self.run_follow_ups(&stored_id).await;
        }
        self.report()
    }

    /// Begin and, when needed, perform the fetch.
    pub async fn load(&mut self, identity: Option<EntityId>) -> LoadReport {
        match self.begin(identity) {
            LoadDecision::Fetch(pending) => {
                let result = self.ctx.transport.execute(&pending.endpoint).await;
                self.complete(pending, result).await
            }
            LoadDecision::Cleared(report)
            | LoadDecision::Cached(report)
            | LoadDecision::AlreadyLoading(report)
            | LoadDecision::Terminal(report) => report,
        }
    }

    /// Load from a raw route parameter; unparsable input means no identity.
    pub async fn load_param(&mut self, raw: Option<&str>) -> LoadReport {
        self.load(parse_numeric_id(raw).map(EntityId::Num)).await
    }

    /// Leave a terminal state and load the current identity again.
    pub async fn retry(&mut self) -> LoadReport {
        if self.state.is_terminal() {
            self.state = LoadState::Idle;
        }
        let identity = self.current.clone();
        self.load(identity).await
    }

    pub fn clear(&mut self) {
        self.state = LoadState::Idle;
        self.current = None;
        self.resolved = None;
    }

    /// Current tuple, re-read from the store.
    pub fn report(&self) -> LoadReport {
        match &self.state {
            LoadState::Idle => LoadReport::empty(),
            LoadState::Loading { .. } => LoadReport::loading(self.current_data()),
            LoadState::Loaded { .. } => LoadReport::loaded(self.current_data()),
            LoadState::NotFound { .. } => LoadReport::not_found(),
            LoadState::Failed { .. } => LoadReport::failed(),
        }
    }

    fn current_data(&self) -> Option<Value> {
        let id = self.resolved.as_ref()?;
        match self
            .ctx
            .store
            .denormalize(self.resource.kind(), id, &self.ctx.schema)
        {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(%error, "Could not read entity store");
                None
            }
        }
    }

    fn cached_id(&self, identity: &EntityId) -> Option<EntityId> {
        match self
            .ctx
            .store
            .read(|store| self.resource.cached_id(store, identity))
        {
            Ok(id) => id,
            Err(error) => {
                tracing::warn!(%error, "Could not read entity store");
                None
            }
        }
    }

    fn fresh_copy(&self, identity: &EntityId) -> Option<(EntityId, Value)> {
        let stored_id = self.cached_id(identity)?;
        let now = self.ctx.now();
        let read = self
            .ctx
            .store
            .lookup(
                self.resource.kind(),
                &stored_id,
                &self.ctx.schema,
                self.ctx.freshness(),
                now,
            )
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "Could not read entity store");
                None
            })?;
        tracing::debug!(
            kind = %self.resource.kind(),
            id = %stored_id,
            age_ms = read.age(now).as_millis() as u64,
            "Serving cached copy"
        );
        Some((stored_id, read.into_value()))
    }

    fn mark_missing(&mut self, identity: EntityId, is_current: bool) {
        let kind = self.resource.kind();
        if let Some(stored_id) = self.cached_id(&identity) {
            if let Err(error) = self.ctx.store.remove(kind, &stored_id) {
                tracing::warn!(%kind, %identity, %error, "Could not drop deleted entity");
            }
        }
        if !is_current {
            return;
        }

        let already_reported = self.state == LoadState::NotFound {
            identity: identity.clone(),
        };
        tracing::warn!(%kind, %identity, "Entity does not exist");
        self.resolved = None;
        self.state = LoadState::NotFound { identity };
        if !already_reported {
            self.ctx.errors.report(self.resource.missing_error());
        }
    }

    fn fail(&mut self, identity: EntityId) {
        let already_reported = self.state == LoadState::Failed {
            identity: identity.clone(),
        };
        self.resolved = None;
        self.state = LoadState::Failed { identity };
        if !already_reported {
            self.ctx.errors.report(self.resource.failure_error());
        }
    }

    async fn run_follow_ups(&self, parent: &EntityId) {
        let kind = self.resource.kind();
        let entity = match self.ctx.store.get(kind, parent) {
            Ok(Some(entity)) => entity,
            Ok(None) => return,
            Err(error) => {
                tracing::warn!(%error, "Could not read entity store");
                return;
            }
        };

        let follow_ups = self.resource.follow_ups(parent, &entity.data);
        if follow_ups.is_empty() {
            return;
        }

        let ctx = &self.ctx;
        let responses = join_all(follow_ups.into_iter().map(|follow_up| async move {
            let token = ctx.sequencer.issue_token();
            let result = ctx.transport.execute(&follow_up.endpoint).await;
            (follow_up, token, result)
        }))
        .await;

        for (follow_up, token, result) in responses {
            apply_follow_up(ctx, kind, parent, follow_up, token, result);
        }
    }
}

fn apply_follow_up(
    ctx: &LoaderContext,
    parent_kind: EntityKind,
    parent: &EntityId,
    follow_up: FollowUp,
    token: FetchToken,
    result: Result<Value, TransportError>,
) {
    let FollowUp {
        endpoint,
        action,
        failure,
    } = follow_up;
    let slot = SlotKey::named(endpoint.to_string());
    let response = match result {
        Ok(response) => response,
        Err(error) => {
            if ctx.sequencer.admits(&slot, &token) {
                tracing::warn!(%parent_kind, %parent, %endpoint, %error, "Ancillary fetch failed");
                ctx.errors.report(failure);
            }
            return;
        }
    };
    if !ctx.sequencer.accept(&slot, &token) {
        return;
    }

    let now = ctx.now();
    let applied = match action {
        FollowUpAction::Merge(kind) => ctx
            .store
            .merge_payload(normalize(&response, kind, &ctx.schema), now)
            .map(|_| ()),
        FollowUpAction::MergeAndAttach { kind, field } => {
            let payload = normalize(&response, kind, &ctx.schema);
            let ids: Vec<Value> = payload.result_ids().iter().map(EntityId::to_json).collect();
            ctx.store.write(|store| {
                store.merge_payload(payload, now);
                store.set_field(parent_kind, parent, field, Value::Array(ids));
            })
        }
        FollowUpAction::Attach { field } => match extract_field(&response, parent, field) {
            Some(value) => ctx
                .store
                .set_field(parent_kind, parent, field, value)
                .map(|_| ()),
            None => {
                tracing::debug!(%endpoint, field, "Ancillary response lacks field");
                Ok(())
            }
        },
        FollowUpAction::AttachResponse { field } => ctx
            .store
            .set_field(parent_kind, parent, field, response)
            .map(|_| ()),
    };

    if let Err(error) = applied {
        tracing::warn!(%parent_kind, %parent, %endpoint, %error, "Could not apply ancillary response");
    }
}

fn extract_field(response: &Value, parent: &EntityId, field: &str) -> Option<Value> {
    match response {
        Value::Array(items) => items
            .iter()
            .find(|item| item.get("id").and_then(EntityId::from_json).as_ref() == Some(parent))
            .and_then(|item| item.get(field))
            .cloned(),
        Value::Object(object) => object.get(field).cloned(),
        _ => None,
    }
}
