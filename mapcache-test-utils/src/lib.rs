//! mapcache Test Utilities
//!
//! Centralized test infrastructure for the mapcache workspace:
//! - A scripted mock transport that records every request
//! - An error sink that records reports
//! - JSON fixtures shaped like the mapping API's payloads
//! - Proptest generators

pub use mapcache_core::{
    CacheConfig, ChallengeIdentity, Clock, EntityId, EntityKind, ErrorKind, ErrorSink,
    ManualClock, RouteParams, Timestamp, TransportError,
};
pub use mapcache_fetch::{Endpoint, Method, Transport};
pub use mapcache_store::{Schema, SharedStore};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

type Scripted = Result<Value, TransportError>;

#[derive(Debug, Default)]
struct MockState {
    responses: HashMap<String, VecDeque<Scripted>>,
    calls: Vec<Endpoint>,
}

/// Transport answering from per-path scripts.
///
/// Responses queued for a path are consumed in order; the last one is
/// sticky and keeps answering. A path with no script answers 404.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for `path`.
    pub fn respond(&self, path: impl Into<String>, body: Value) -> &Self {
        self.push(path.into(), Ok(body));
        self
    }

    /// Queue a failure for `path`.
    pub fn fail(&self, path: impl Into<String>, error: TransportError) -> &Self {
        self.push(path.into(), Err(error));
        self
    }

    /// Queue an HTTP status failure for `path`.
    pub fn fail_status(&self, path: impl Into<String>, status: u16) -> &Self {
        self.fail(
            path,
            TransportError::Status {
                status,
                body: String::new(),
            },
        )
    }

    fn push(&self, path: String, response: Scripted) {
        let mut state = self.lock();
        state.responses.entry(path).or_default().push_back(response);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every request executed so far, in order.
    pub fn calls(&self) -> Vec<Endpoint> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Number of requests made to `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.lock().calls.iter().filter(|call| call.path == path).count()
    }

    pub fn last_call(&self) -> Option<Endpoint> {
        self.lock().calls.last().cloned()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, endpoint: &Endpoint) -> Result<Value, TransportError> {
        let mut state = self.lock();
        state.calls.push(endpoint.clone());
        let queue = state.responses.get_mut(&endpoint.path);
        match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Ok(Value::Null)),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(Value::Null)),
            None => Err(TransportError::Status {
                status: 404,
                body: format!("no script for {}", endpoint.path),
            }),
        }
    }
}

// ============================================================================
// RECORDING ERROR SINK
// ============================================================================

/// Error sink that keeps every report for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingErrorSink {
    reports: Arc<Mutex<Vec<ErrorKind>>>,
}

impl RecordingErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<ErrorKind> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.reports().into_iter().filter(|k| *k == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.reports().is_empty()
    }
}

impl ErrorSink for RecordingErrorSink {
    fn report(&self, kind: ErrorKind) {
        tracing::debug!(error_kind = %kind, "Recorded error report");
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(kind);
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! JSON payloads shaped like the mapping API's responses.

    use serde_json::{json, Value};

    pub fn challenge(id: i64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "status": 3,
            "enabled": true,
            "created": "2024-03-05T17:45:00.000Z",
        })
    }

    pub fn challenge_in_project(id: i64, name: &str, project_id: i64) -> Value {
        let mut challenge = challenge(id, name);
        challenge["parent"] = json!(project_id);
        challenge
    }

    pub fn challenge_with_status(id: i64, status: i64) -> Value {
        let mut challenge = challenge(id, "status fixture");
        challenge["status"] = json!(status);
        challenge
    }

    pub fn deleted_challenge(id: i64) -> Value {
        let mut challenge = challenge(id, "gone");
        challenge["deleted"] = json!(true);
        challenge
    }

    pub fn project(id: i64, name: &str) -> Value {
        json!({"id": id, "name": name, "displayName": name, "enabled": true})
    }

    /// Per-status action counts as served for one challenge.
    pub fn challenge_actions(challenge_id: i64) -> Value {
        json!([{
            "id": challenge_id,
            "actions": {"total": 10, "available": 4, "fixed": 6}
        }])
    }

    /// Daily activity rows for one challenge.
    pub fn challenge_activity(challenge_id: i64) -> Value {
        json!([
            {"date": "2024-03-05", "challengeId": challenge_id, "status": 1, "count": 4},
            {"date": "2024-03-06", "challengeId": challenge_id, "status": 5, "count": 2},
        ])
    }

    pub fn task(id: i64, challenge_id: i64) -> Value {
        json!({
            "id": id,
            "name": format!("task-{}", id),
            "parent": challenge_id,
            "status": 0,
        })
    }

    pub fn deleted_task(id: i64, challenge_id: i64) -> Value {
        let mut task = task(id, challenge_id);
        task["deleted"] = json!(true);
        task
    }

    pub fn comment(id: i64, task_id: i64, text: &str) -> Value {
        json!({
            "id": id,
            "taskId": task_id,
            "comment": text,
            "osm_username": "mapper",
        })
    }

    pub fn user(id: i64, osm_id: i64, display_name: &str) -> Value {
        json!({
            "id": id,
            "osmProfile": {
                "id": osm_id,
                "displayName": display_name,
                "avatarURL": format!("https://www.gravatar.com/avatar/{}?s=100&d=mm", osm_id),
            },
            "isSuperUser": false,
        })
    }

    pub fn super_user(id: i64, osm_id: i64, display_name: &str) -> Value {
        let mut user = user(id, osm_id, display_name);
        user["isSuperUser"] = json!(true);
        user
    }

    pub fn cluster(cluster_id: i64, challenge_id: i64, num_points: i64) -> Value {
        json!({
            "clusterId": cluster_id,
            "numPoints": num_points,
            "point": {"lat": 47.6 + cluster_id as f64, "lng": -122.3},
            "challengeIds": [challenge_id],
        })
    }

    pub fn clusters(challenge_id: i64, count: i64) -> Value {
        Value::Array(
            (1..=count)
                .map(|n| cluster(n, challenge_id, n * 3))
                .collect(),
        )
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for mapcache types.

    use super::*;
    use proptest::prelude::*;

    /// Generate any entity kind.
    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        prop::sample::select(EntityKind::ALL.to_vec())
    }

    /// Generate a positive numeric entity id.
    pub fn arb_numeric_id() -> impl Strategy<Value = EntityId> {
        (1i64..1_000_000).prop_map(EntityId::Num)
    }

    /// Generate a string entity id (user names and the like).
    pub fn arb_key_id() -> impl Strategy<Value = EntityId> {
        "[a-z][a-z0-9_]{0,15}".prop_map(EntityId::Key)
    }

    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        prop_oneof![arb_numeric_id(), arb_key_id()]
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_default()
        })
    }

    /// Route parameter values: valid ids, prefixed garbage, or junk.
    pub fn arb_route_value() -> impl Strategy<Value = String> {
        prop_oneof![
            (1i64..100_000).prop_map(|n| n.to_string()),
            (1i64..100_000).prop_map(|n| format!("{}abc", n)),
            "[a-zA-Z]{0,6}",
            Just(String::new()),
        ]
    }

    /// A loadable challenge payload.
    pub fn arb_challenge_payload() -> impl Strategy<Value = Value> {
        (1i64..100_000, "[A-Za-z ]{1,20}", 0i64..7).prop_map(|(id, name, status)| {
            let mut challenge = fixtures::challenge(id, &name);
            challenge["status"] = serde_json::json!(status);
            challenge
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapcache_fetch::routes;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_sticky_last_response() {
        let transport = MockTransport::new();
        transport
            .respond("/challenge/1", json!({"id": 1, "v": 1}))
            .respond("/challenge/1", json!({"id": 1, "v": 2}));

        let endpoint = routes::challenge(&EntityId::Num(1));
        assert_eq!(transport.execute(&endpoint).await.unwrap()["v"], 1);
        assert_eq!(transport.execute(&endpoint).await.unwrap()["v"], 2);
        assert_eq!(transport.execute(&endpoint).await.unwrap()["v"], 2);
        assert_eq!(transport.calls_to("/challenge/1"), 3);
    }

    #[tokio::test]
    async fn test_mock_transport_unscripted_is_404() {
        let transport = MockTransport::new();
        let err = transport
            .execute(&routes::task(&EntityId::Num(9)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingErrorSink::new();
        sink.report(ErrorKind::TaskDoesNotExist);
        sink.report(ErrorKind::TaskDoesNotExist);
        sink.report(ErrorKind::UserNotFound);
        assert_eq!(sink.count(ErrorKind::TaskDoesNotExist), 2);
        assert_eq!(sink.reports().len(), 3);
    }
}
