//! Target-user lookup.
//!
//! Profile pages name a user by internal id, OSM id or display name. The
//! cached user matching that name is the target; with no name the current
//! user is. Settings-level records are only fetched for oneself or by super
//! users, and a lookup restricted to super users fetches nothing for anyone
//! else.

use crate::context::LoaderContext;
use crate::loader::FreshnessGatedLoader;
use crate::resource::{UserDetail, UserResource};
use crate::state::LoadReport;
use mapcache_core::{EntityId, EntityKind, UserView};
use mapcache_store::{EntityStore, StoredEntity};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Find the cached user `requested` refers to. Matches numeric id first,
/// then OSM id, then display name ignoring case.
pub fn find_target_user(store: &EntityStore, requested: &str) -> Option<EntityId> {
    let numeric = requested.trim().parse::<i64>().ok();
    let osm_profile = |entity: &StoredEntity| entity.data.get("osmProfile").cloned();

    let by = |matches: &dyn Fn(&EntityId, &StoredEntity) -> bool| {
        store
            .entities_of(EntityKind::User)
            .find(|(id, entity)| matches(id, entity))
            .map(|(id, _)| id.clone())
    };

    by(&|id, _| numeric.is_some() && id.as_i64() == numeric)
        .or_else(|| {
            by(&|_, entity| {
                numeric.is_some()
                    && osm_profile(entity)
                        .and_then(|profile| profile.get("id").and_then(Value::as_i64))
                        == numeric
            })
        })
        .or_else(|| {
            let wanted = requested.to_lowercase();
            by(&|_, entity| {
                osm_profile(entity)
                    .and_then(|profile| {
                        profile
                            .get("displayName")
                            .and_then(Value::as_str)
                            .map(str::to_lowercase)
                    })
                    .unwrap_or_default()
                    == wanted
            })
        })
}

/// Drop the `s` size parameter from an avatar URL so callers can pick their
/// own size. Remaining parameters come back sorted by key. URLs without a
/// query, or that do not parse, are returned unchanged.
pub fn normalize_avatar_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    if url.query().is_none() {
        return raw.to_string();
    }

    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "s")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    kept.sort();
    url.query_pairs_mut().clear().extend_pairs(kept);
    url.to_string()
}

fn with_normalized_avatar(mut user: Value) -> Value {
    let avatar = user
        .pointer("/osmProfile/avatarURL")
        .and_then(Value::as_str)
        .map(normalize_avatar_url);
    if let (Some(avatar), Some(profile)) = (avatar, user.get_mut("osmProfile")) {
        profile["avatarURL"] = Value::String(avatar);
    }
    user
}

/// Target user as shown to the consumer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetUser {
    pub target_user: Option<Value>,
    pub showing_user_id: Option<String>,
    #[serde(flatten)]
    pub load: LoadReport,
}

/// Loads and resolves the target user for a profile view.
pub struct TargetUserLookup {
    ctx: LoaderContext,
    settings: FreshnessGatedLoader<UserResource>,
    basic: FreshnessGatedLoader<UserResource>,
    limit_to_super_users: bool,
}

impl TargetUserLookup {
    pub fn new(ctx: LoaderContext, limit_to_super_users: bool) -> Self {
        Self {
            settings: FreshnessGatedLoader::new(UserResource::new(UserDetail::Settings), ctx.clone()),
            basic: FreshnessGatedLoader::new(UserResource::new(UserDetail::Basic), ctx.clone()),
            ctx,
            limit_to_super_users,
        }
    }

    /// Load the user named by `requested` on behalf of `current_user`.
    pub async fn load(&mut self, current_user: Option<&UserView>, requested: Option<&str>) -> TargetUser {
        let requested = requested.filter(|name| !name.trim().is_empty());
        let is_super_user = current_user.is_some_and(|user| user.is_super_user);

        if self.limit_to_super_users && !is_super_user {
            tracing::debug!(?requested, "Target user lookup restricted to super users");
            return TargetUser {
                target_user: current_user.and_then(|user| self.current_user_value(user)),
                ..TargetUser::default()
            };
        }

        let Some(requested) = requested else {
            self.settings.clear();
            self.basic.clear();
            return TargetUser {
                target_user: current_user.and_then(|user| self.current_user_value(user)),
                ..TargetUser::default()
            };
        };

        let is_self = current_user.is_some_and(|user| user.id.to_string() == requested);
        let identity = match requested.trim().parse::<i64>() {
            Ok(id) => EntityId::Num(id),
            Err(_) => EntityId::from(requested),
        };
        let load = if current_user.is_some() && (is_self || is_super_user) {
            self.settings.load(Some(identity)).await
        } else {
            self.basic.load(Some(identity)).await
        };

        let target_user = match self.ctx.store.read(|store| find_target_user(store, requested)) {
            Ok(Some(id)) => self
                .ctx
                .store
                .denormalize(EntityKind::User, &id, &self.ctx.schema)
                .ok()
                .flatten()
                .map(with_normalized_avatar),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(%error, "Could not read entity store");
                None
            }
        };

        TargetUser {
            target_user,
            showing_user_id: Some(requested.to_string()),
            load,
        }
    }

    /// The current user's cached record, or the given view when the store
    /// does not hold one.
    fn current_user_value(&self, user: &UserView) -> Option<Value> {
        let cached = self
            .ctx
            .store
            .denormalize(EntityKind::User, &EntityId::Num(user.id), &self.ctx.schema)
            .ok()
            .flatten();
        cached
            .or_else(|| serde_json::to_value(user).ok())
            .map(with_normalized_avatar)
    }
}
