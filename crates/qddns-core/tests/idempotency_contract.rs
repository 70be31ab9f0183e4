//! Contract tests for change detection and the last-IP invariants
//!
//! Constraints verified:
//! - the provider is never called with an IP equal to the last pushed one
//! - the last pushed IP advances only after a successful provider call,
//!   so a failed update is retried on the next tick with no extra state

mod common;

use common::*;
use qddns_core::UpdateEngine;
use std::net::IpAddr;

#[tokio::test]
async fn same_resolved_ip_across_ticks_updates_once() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("a", "192.0.2.10");
    fetcher.answer("b", "192.0.2.10");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    for _ in 0..5 {
        engine.run_once().await;
    }

    assert_eq!(
        provider.update_call_count(),
        1,
        "expected 1 update over 5 identical ticks, got {}",
        provider.update_call_count()
    );
}

#[tokio::test]
async fn failed_update_leaves_last_ip_stale_and_retries() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("a", "192.0.2.10");
    fetcher.answer("b", "192.0.2.10");

    let provider = CountingProvider::new();
    provider.set_failing(true);
    let config = config_with_sources(&["a", "b"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    // Provider down: the attempt fails and must not advance last_ip.
    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 1);
    assert_eq!(engine.last_ip(), None);

    // Provider back: the very next tick retries the same change.
    provider.set_failing(false);
    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 2);
    assert_eq!(engine.last_ip(), Some("192.0.2.10"));

    // And once applied, further ticks are no-ops.
    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 2);
}

#[tokio::test]
async fn ip_change_triggers_exactly_one_more_update() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("a", "192.0.2.10");
    fetcher.answer("b", "192.0.2.10");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher.clone()),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    engine.run_once().await;
    assert_eq!(engine.last_ip(), Some("192.0.2.10"));

    // The public IP moves.
    fetcher.answer("a", "198.51.100.4");
    fetcher.answer("b", "198.51.100.4");

    engine.run_once().await;
    engine.run_once().await;

    assert_eq!(provider.update_call_count(), 2);
    assert_eq!(
        provider.pushed(),
        vec![
            "192.0.2.10".parse::<IpAddr>().unwrap(),
            "198.51.100.4".parse::<IpAddr>().unwrap(),
        ]
    );
    assert_eq!(engine.last_ip(), Some("198.51.100.4"));
}

#[tokio::test]
async fn undetermined_cycle_does_not_clear_last_ip() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("a", "192.0.2.10");
    fetcher.answer("b", "192.0.2.10");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher.clone()),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    engine.run_once().await;
    assert_eq!(engine.last_ip(), Some("192.0.2.10"));

    // All sources go dark for a cycle.
    fetcher.fail("a", "down");
    fetcher.fail("b", "down");
    engine.run_once().await;
    assert_eq!(engine.last_ip(), Some("192.0.2.10"));

    // Sources recover with the old answer: still nothing to push.
    fetcher.answer("a", "192.0.2.10");
    fetcher.answer("b", "192.0.2.10");
    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 1);
}
