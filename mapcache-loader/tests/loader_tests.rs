//! Freshness-gated loader behavior against a scripted transport.

use mapcache_core::{CacheConfig, EntityId, EntityKind, ErrorKind, ManualClock, TransportError};
use mapcache_loader::{
    ChallengeResource, FreshnessGatedLoader, LoadDecision, LoadReport, LoadState, LoaderContext,
    TaskResource,
};
use mapcache_test_utils::{fixtures, MockTransport, RecordingErrorSink};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    transport: MockTransport,
    sink: RecordingErrorSink,
    clock: ManualClock,
    ctx: LoaderContext,
}

fn harness() -> Harness {
    harness_with(CacheConfig::default())
}

fn harness_with(config: CacheConfig) -> Harness {
    let transport = MockTransport::new();
    let sink = RecordingErrorSink::new();
    let clock = ManualClock::starting_now();
    let ctx = LoaderContext::new(Arc::new(transport.clone()))
        .with_error_sink(Arc::new(sink.clone()))
        .with_clock(Arc::new(clock.clone()))
        .with_config(config);
    Harness {
        transport,
        sink,
        clock,
        ctx,
    }
}

fn challenge_42(h: &Harness) {
    h.transport
        .respond("/challenge/42", fixtures::challenge(42, "Foo"))
        .respond("/challenge/42/comments", json!([fixtures::comment(5, 700, "nice")]))
        .respond("/data/challenge/42/activity", fixtures::challenge_activity(42))
        .respond("/data/challenge/42", fixtures::challenge_actions(42));
}

#[tokio::test]
async fn load_challenge_from_empty_cache() {
    let h = harness();
    challenge_42(&h);
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    let report = loader.load(Some(EntityId::Num(42))).await;

    let data = report.data.expect("challenge loaded");
    assert_eq!(data["id"], 42);
    assert_eq!(data["name"], "Foo");
    assert!(data["_meta"]["fetchedAt"].is_string());
    assert!(!report.is_loading);
    assert!(!report.not_found);
    assert_eq!(h.transport.calls_to("/challenge/42"), 1);
    assert_eq!(
        loader.state(),
        &LoadState::Loaded {
            identity: EntityId::Num(42)
        }
    );
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn challenge_actions_and_project_follow_ups() {
    let h = harness();
    h.transport
        .respond("/challenge/42", fixtures::challenge_in_project(42, "Foo", 3))
        .respond("/project/3", fixtures::project(3, "Roads"))
        .respond("/data/challenge/42", fixtures::challenge_actions(42));
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    let data = loader.load(Some(EntityId::Num(42))).await.data.unwrap();

    assert_eq!(data["parent"]["name"], "Roads");
    assert_eq!(data["actions"]["total"], 10);
    assert_eq!(h.transport.calls_to("/project/3"), 1);
}

#[tokio::test]
async fn challenge_comments_and_activity_follow_ups() {
    let h = harness();
    challenge_42(&h);
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    let data = loader.load(Some(EntityId::Num(42))).await.data.unwrap();

    assert_eq!(h.transport.calls_to("/challenge/42/comments"), 1);
    let activity_call = h
        .transport
        .calls()
        .into_iter()
        .find(|call| call.path == "/data/challenge/42/activity")
        .expect("activity requested");
    assert_eq!(activity_call.param("start"), Some("2024-03-05"));

    let comments = data["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["comment"], "nice");
    assert!(h.ctx.store.get(EntityKind::Comment, &EntityId::Num(5)).unwrap().is_some());
    assert_eq!(data["activity"], fixtures::challenge_activity(42));
    assert_eq!(data["actions"]["total"], 10);
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn rapid_navigation_back_serves_fresh_cache() {
    let h = harness();
    challenge_42(&h);
    h.transport
        .respond("/challenge/43", fixtures::challenge(43, "Bar"))
        .respond("/data/challenge/43", fixtures::challenge_actions(43));
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    loader.load(Some(EntityId::Num(42))).await;
    h.clock.advance(Duration::from_millis(200));
    loader.load(Some(EntityId::Num(43))).await;
    h.clock.advance(Duration::from_millis(200));

    let report = match loader.begin(Some(EntityId::Num(42))) {
        LoadDecision::Cached(report) => report,
        other => panic!("expected cached copy, got {:?}", other),
    };
    assert_eq!(report.data.unwrap()["name"], "Foo");
    assert_eq!(h.transport.calls_to("/challenge/42"), 1);
}

#[tokio::test]
async fn stale_cache_is_refetched() {
    let h = harness();
    challenge_42(&h);
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    loader.load(Some(EntityId::Num(42))).await;
    h.clock.advance(Duration::from_secs(61));
    loader.clear();

    let decision = loader.begin(Some(EntityId::Num(42)));
    assert!(decision.issues_fetch());
    // The stale copy is shown while the refetch is out.
    let report = loader.report();
    assert!(report.is_loading);
    assert_eq!(report.data.unwrap()["name"], "Foo");
}

#[tokio::test]
async fn out_of_order_response_does_not_clobber_newer() {
    let h = harness();
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone().with_config(
        CacheConfig::default().with_follow_ups(false),
    ));

    let first = loader.begin(Some(EntityId::Num(42))).pending().cloned().unwrap();
    let _other = loader.begin(Some(EntityId::Num(43))).pending().cloned().unwrap();
    let second = loader.begin(Some(EntityId::Num(42))).pending().cloned().unwrap();
    assert!(first.token < second.token);

    let report = loader
        .complete(second, Ok(fixtures::challenge(42, "Newer")))
        .await;
    assert_eq!(report.data.as_ref().unwrap()["name"], "Newer");

    let report = loader
        .complete(first, Ok(fixtures::challenge(42, "Older")))
        .await;
    assert_eq!(report.data.unwrap()["name"], "Newer");

    let stored = h.ctx.store.get(EntityKind::Challenge, &EntityId::Num(42)).unwrap().unwrap();
    assert_eq!(stored.data["name"], "Newer");
}

#[tokio::test]
async fn failed_newer_fetch_leaves_older_success_applicable() {
    let h = harness_with(CacheConfig::default().with_follow_ups(false));
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let older = loader.begin(Some(EntityId::Num(7))).pending().cloned().unwrap();
    loader.clear();
    let newer = loader.begin(Some(EntityId::Num(7))).pending().cloned().unwrap();
    assert!(older.token < newer.token);

    let report = loader
        .complete(
            newer,
            Err(TransportError::Network {
                reason: "timed out".to_string(),
            }),
        )
        .await;
    assert!(report.failed);
    assert_eq!(h.sink.reports(), vec![ErrorKind::TaskFetchFailure]);

    let report = loader.complete(older, Ok(fixtures::task(7, 42))).await;
    assert_eq!(report.data.unwrap()["id"], 7);
    assert_eq!(
        loader.state(),
        &LoadState::Loaded {
            identity: EntityId::Num(7)
        }
    );
    let stored = h.ctx.store.get(EntityKind::Task, &EntityId::Num(7)).unwrap();
    assert_eq!(stored.unwrap().data["name"], "task-7");
}

#[tokio::test]
async fn failure_superseded_by_newer_success_is_ignored() {
    let h = harness_with(CacheConfig::default().with_follow_ups(false));
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let older = loader.begin(Some(EntityId::Num(7))).pending().cloned().unwrap();
    loader.clear();
    let newer = loader.begin(Some(EntityId::Num(7))).pending().cloned().unwrap();

    let report = loader.complete(newer, Ok(fixtures::task(7, 42))).await;
    assert!(report.data.is_some());

    let report = loader
        .complete(
            older,
            Err(TransportError::Network {
                reason: "timed out".to_string(),
            }),
        )
        .await;
    assert!(report.data.is_some());
    assert!(!report.failed);
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn failure_for_previous_identity_is_reported_without_state_change() {
    let h = harness_with(CacheConfig::default().with_follow_ups(false));
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let old = loader.begin(Some(EntityId::Num(1))).pending().cloned().unwrap();
    loader.begin(Some(EntityId::Num(2)));
    loader
        .complete(
            old,
            Err(TransportError::Decode {
                reason: "truncated body".to_string(),
            }),
        )
        .await;

    assert!(loader.state().is_loading_identity(&EntityId::Num(2)));
    assert_eq!(h.sink.reports(), vec![ErrorKind::TaskFetchFailure]);
}

#[tokio::test]
async fn duplicate_triggers_coalesce() {
    let h = harness();
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let first = loader.begin(Some(EntityId::Num(7)));
    assert!(first.issues_fetch());
    let again = loader.begin(Some(EntityId::Num(7)));
    assert!(matches!(again, LoadDecision::AlreadyLoading(ref report) if report.is_loading));
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test]
async fn response_for_previous_identity_is_merged_without_state_change() {
    let h = harness_with(CacheConfig::default().with_follow_ups(false));
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let old = loader.begin(Some(EntityId::Num(1))).pending().cloned().unwrap();
    loader.begin(Some(EntityId::Num(2)));
    loader.complete(old, Ok(fixtures::task(1, 42))).await;

    assert!(loader.state().is_loading_identity(&EntityId::Num(2)));
    assert!(h.ctx.store.get(EntityKind::Task, &EntityId::Num(1)).unwrap().is_some());
}

#[tokio::test]
async fn unparsable_identity_clears_previous_state() {
    let h = harness();
    h.transport.respond("/challenge/45", fixtures::challenge(45, "Baz"));
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    let report = loader.load_param(Some("45")).await;
    assert!(report.data.is_some());
    let calls = h.transport.call_count();

    let report = loader.load_param(Some("NaN")).await;
    assert_eq!(report, LoadReport::empty());
    assert_eq!(loader.state(), &LoadState::Idle);
    assert_eq!(loader.current_identity(), None);
    assert_eq!(h.transport.call_count(), calls);
}

#[tokio::test]
async fn deleted_task_is_terminal_and_reported_once() {
    let h = harness();
    h.transport.respond("/task/7", fixtures::deleted_task(7, 42));
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let report = loader.load(Some(EntityId::Num(7))).await;
    assert_eq!(report, LoadReport::not_found());
    assert!(report.data.is_none());
    assert_eq!(h.sink.count(ErrorKind::TaskDoesNotExist), 1);

    let again = loader.load(Some(EntityId::Num(7))).await;
    assert!(again.not_found);
    assert_eq!(h.transport.calls_to("/task/7"), 1);
    assert_eq!(h.sink.reports(), vec![ErrorKind::TaskDoesNotExist]);
    // No comments are fetched for a task that does not exist.
    assert_eq!(h.transport.calls_to("/task/7/comments"), 0);
}

#[tokio::test]
async fn deleted_response_drops_cached_copy() {
    let h = harness_with(CacheConfig::default().with_follow_ups(false));
    h.transport
        .respond("/task/7", fixtures::task(7, 42))
        .respond("/task/7", fixtures::deleted_task(7, 42));
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    loader.load(Some(EntityId::Num(7))).await;
    assert!(h.ctx.store.get(EntityKind::Task, &EntityId::Num(7)).unwrap().is_some());

    h.clock.advance(Duration::from_secs(120));
    let report = loader.load(Some(EntityId::Num(7))).await;
    assert!(report.not_found);
    assert!(h.ctx.store.get(EntityKind::Task, &EntityId::Num(7)).unwrap().is_none());
}

#[tokio::test]
async fn not_found_status_and_retry() {
    let h = harness_with(CacheConfig::default().with_follow_ups(false));
    h.transport
        .fail_status("/challenge/9", 404)
        .respond("/challenge/9", fixtures::challenge(9, "Back"));
    let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    let report = loader.load(Some(EntityId::Num(9))).await;
    assert!(report.not_found);
    assert!(!report.failed);
    assert_eq!(h.sink.count(ErrorKind::ChallengeDoesNotExist), 1);

    let report = loader.retry().await;
    assert_eq!(report.data.unwrap()["name"], "Back");
    assert_eq!(h.transport.calls_to("/challenge/9"), 2);
}

#[tokio::test]
async fn transport_failure_is_terminal_failed() {
    let h = harness();
    h.transport.fail(
        "/task/3",
        TransportError::Network {
            reason: "connection reset".to_string(),
        },
    );
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let report = loader.load(Some(EntityId::Num(3))).await;
    assert!(report.failed);
    assert!(report.not_found);
    assert_eq!(
        loader.state(),
        &LoadState::Failed {
            identity: EntityId::Num(3)
        }
    );
    assert_eq!(h.sink.reports(), vec![ErrorKind::TaskFetchFailure]);

    loader.load(Some(EntityId::Num(3))).await;
    assert_eq!(h.transport.calls_to("/task/3"), 1);
}

#[tokio::test]
async fn task_comments_are_merged_and_attached() {
    let h = harness();
    h.transport
        .respond("/task/7", fixtures::task(7, 42))
        .respond(
            "/task/7/comments",
            json!([fixtures::comment(1, 7, "looks good"), fixtures::comment(2, 7, "fixed")]),
        );
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let data = loader.load(Some(EntityId::Num(7))).await.data.unwrap();

    let comments = data["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["comment"], "looks good");
    // The task is already being expanded, so the back-reference stays an id.
    assert_eq!(comments[0]["taskId"], 7);
    // Parent challenge is not cached.
    assert!(data["parent"].is_null());
    assert!(h.ctx.store.get(EntityKind::Comment, &EntityId::Num(2)).unwrap().is_some());
}

#[tokio::test]
async fn ancillary_failure_keeps_parent_loaded() {
    let h = harness();
    h.transport
        .respond("/task/7", fixtures::task(7, 42))
        .fail_status("/task/7/comments", 500);
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    let report = loader.load(Some(EntityId::Num(7))).await;

    assert!(report.data.is_some());
    assert!(!report.not_found);
    assert_eq!(h.sink.reports(), vec![ErrorKind::CommentFetchFailure]);
}

#[tokio::test]
async fn follow_ups_can_be_disabled() {
    let h = harness_with(CacheConfig::default().with_follow_ups(false));
    h.transport.respond("/task/7", fixtures::task(7, 42));
    let mut loader = FreshnessGatedLoader::new(TaskResource, h.ctx.clone());

    loader.load(Some(EntityId::Num(7))).await;
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test]
async fn consumers_share_one_store() {
    let h = harness();
    challenge_42(&h);
    let mut first = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());
    let mut second = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());

    first.load(Some(EntityId::Num(42))).await;
    let decision = second.begin(Some(EntityId::Num(42)));

    assert!(matches!(decision, LoadDecision::Cached(_)));
    let stats = h.ctx.store.stats().unwrap();
    assert_eq!(stats.hits, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A cached copy younger than the threshold never triggers a fetch;
    /// an older one always does.
    #[test]
    fn prop_freshness_gate(age_ms in 0u64..120_000) {
        let h = harness();
        h.ctx
            .store
            .merge(
                EntityKind::Challenge,
                EntityId::Num(42),
                fixtures::challenge(42, "Foo").as_object().cloned().unwrap(),
                h.ctx.now(),
            )
            .unwrap();
        h.clock.advance(Duration::from_millis(age_ms));

        let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());
        let decision = loader.begin(Some(EntityId::Num(42)));

        if age_ms < 60_000 {
            prop_assert!(matches!(decision, LoadDecision::Cached(_)));
        } else {
            prop_assert!(decision.issues_fetch());
        }
        prop_assert_eq!(h.transport.call_count(), 0);
    }

    /// Any unparsable route value after a successful load leaves the loader
    /// idle without touching the network.
    #[test]
    fn prop_invalid_identity_clears(raw in "[a-zA-Z ]{0,8}") {
        let h = harness();
        let mut loader = FreshnessGatedLoader::new(ChallengeResource, h.ctx.clone());
        h.ctx
            .store
            .merge(
                EntityKind::Challenge,
                EntityId::Num(45),
                fixtures::challenge(45, "Baz").as_object().cloned().unwrap(),
                h.ctx.now(),
            )
            .unwrap();
        prop_assert!(matches!(loader.begin(Some(EntityId::Num(45))), LoadDecision::Cached(_)));

        let decision = loader.begin(mapcache_core::parse_numeric_id(Some(&raw)).map(EntityId::Num));
        prop_assert_eq!(decision, LoadDecision::Cleared(LoadReport::empty()));
        prop_assert_eq!(loader.state(), &LoadState::Idle);
        prop_assert_eq!(h.transport.call_count(), 0);
    }
}
