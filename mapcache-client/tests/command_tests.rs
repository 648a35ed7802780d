//! Commands run end to end against a scripted transport.

use mapcache_client::Command;
use mapcache_core::{CacheConfig, ManualClock};
use mapcache_loader::LoaderContext;
use mapcache_test_utils::{fixtures, MockTransport};
use std::sync::Arc;

fn context(transport: &MockTransport) -> LoaderContext {
    LoaderContext::new(Arc::new(transport.clone()))
        .with_clock(Arc::new(ManualClock::starting_now()))
        .with_config(CacheConfig::default().with_follow_ups(false))
}

fn command(raw: &[&str]) -> Command {
    Command::parse(raw.iter().map(|s| s.to_string())).unwrap()
}

#[tokio::test]
async fn challenge_command_reports_data() {
    let transport = MockTransport::new();
    transport.respond("/challenge/42", fixtures::challenge(42, "Foo"));

    let output = command(&["challenge", "42"]).run(context(&transport)).await.unwrap();

    assert_eq!(output["data"]["name"], "Foo");
    assert_eq!(output["isLoading"], false);
    assert_eq!(output["notFound"], false);
}

#[tokio::test]
async fn missing_task_reports_not_found() {
    let transport = MockTransport::new();
    transport.fail_status("/task/7", 404);

    let output = command(&["task", "7"]).run(context(&transport)).await.unwrap();

    assert!(output["data"].is_null());
    assert_eq!(output["notFound"], true);
}

#[tokio::test]
async fn project_command_loads_project() {
    let transport = MockTransport::new();
    transport.respond("/project/3", fixtures::project(3, "Roads"));

    let output = command(&["project", "3"]).run(context(&transport)).await.unwrap();

    assert_eq!(output["data"]["displayName"], "Roads");
    assert_eq!(transport.calls_to("/project/3"), 1);
}

#[tokio::test]
async fn clusters_command_includes_challenge_and_clusters() {
    let transport = MockTransport::new();
    transport
        .respond("/challenge/42", fixtures::challenge(42, "Foo"))
        .respond("/taskCluster", fixtures::clusters(42, 2));

    let output = command(&["clusters", "42"]).run(context(&transport)).await.unwrap();

    assert_eq!(output["challenge"]["data"]["id"], 42);
    assert_eq!(output["clusters"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unparsable_challenge_id_makes_no_request() {
    let transport = MockTransport::new();

    let output = command(&["challenge", "abc"]).run(context(&transport)).await.unwrap();

    assert!(output["data"].is_null());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn user_command_uses_public_profile() {
    let transport = MockTransport::new();
    transport.respond("/user/9/public", fixtures::user(9, 900, "Mapper"));

    let output = command(&["user", "9"]).run(context(&transport)).await.unwrap();

    assert_eq!(output["targetUser"]["id"], 9);
    assert_eq!(transport.calls_to("/user/9/public"), 1);
}
