//! Load state machine and the report handed to consumers.

use mapcache_core::EntityId;
use mapcache_fetch::{Endpoint, FetchToken};
use serde::Serialize;
use serde_json::Value;

/// Per-consumer load state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing requested, or the identity was cleared.
    #[default]
    Idle,
    /// A fetch for `identity` is outstanding.
    Loading { identity: EntityId, token: FetchToken },
    Loaded { identity: EntityId },
    /// The server said the entity is deleted or absent. Terminal.
    NotFound { identity: EntityId },
    /// The fetch failed. Terminal.
    Failed { identity: EntityId },
}

impl LoadState {
    pub fn identity(&self) -> Option<&EntityId> {
        match self {
            Self::Idle => None,
            Self::Loading { identity, .. }
            | Self::Loaded { identity }
            | Self::NotFound { identity }
            | Self::Failed { identity } => Some(identity),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Whether no further fetch happens without an explicit retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Failed { .. })
    }

    /// Whether a fetch for `identity` is already in flight.
    pub fn is_loading_identity(&self, identity: &EntityId) -> bool {
        matches!(self, Self::Loading { identity: current, .. } if current == identity)
    }
}

/// What a consumer sees after every state transition.
///
/// `not_found` is set for both terminal states; `failed` additionally marks
/// a transport failure as opposed to a deleted or absent entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub data: Option<Value>,
    pub is_loading: bool,
    pub not_found: bool,
    pub failed: bool,
}

impl LoadReport {
    /// `{data: null, isLoading: false, notFound: false}`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn loaded(data: Option<Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    pub fn loading(data: Option<Value>) -> Self {
        Self {
            data,
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn not_found() -> Self {
        Self {
            not_found: true,
            ..Self::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            not_found: true,
            failed: true,
            ..Self::default()
        }
    }
}

/// A fetch the loader decided to issue but has not performed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFetch {
    pub identity: EntityId,
    pub token: FetchToken,
    pub endpoint: Endpoint,
}

/// Outcome of [`crate::FreshnessGatedLoader::begin`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadDecision {
    /// No usable identity; prior state was dropped.
    Cleared(LoadReport),
    /// A fresh cached copy was adopted.
    Cached(LoadReport),
    /// A fetch for this identity is already outstanding.
    AlreadyLoading(LoadReport),
    /// The identity previously ended in a terminal state.
    Terminal(LoadReport),
    /// The caller must execute this fetch and hand the result to `complete`.
    Fetch(PendingFetch),
}

impl LoadDecision {
    pub fn pending(&self) -> Option<&PendingFetch> {
        match self {
            Self::Fetch(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn issues_fetch(&self) -> bool {
        self.pending().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapcache_fetch::FetchSequencer;

    #[test]
    fn test_state_predicates() {
        let token = FetchSequencer::new().issue_token();
        let loading = LoadState::Loading {
            identity: EntityId::Num(1),
            token,
        };
        assert!(loading.is_loading());
        assert!(loading.is_loading_identity(&EntityId::Num(1)));
        assert!(!loading.is_loading_identity(&EntityId::Num(2)));
        assert!(!loading.is_terminal());

        let failed = LoadState::Failed {
            identity: EntityId::Num(1),
        };
        assert!(failed.is_terminal());
        assert_eq!(failed.identity(), Some(&EntityId::Num(1)));
        assert_eq!(LoadState::Idle.identity(), None);
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let value = serde_json::to_value(LoadReport::not_found()).unwrap();
        assert_eq!(value["notFound"], true);
        assert_eq!(value["isLoading"], false);
        assert!(value["data"].is_null());
    }
}
