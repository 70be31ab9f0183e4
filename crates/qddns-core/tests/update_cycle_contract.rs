//! Contract tests for the resolve → change-detect → update cycle
//!
//! Each test drives the engine tick by tick via `run_once`, so there is no
//! timing involved and the outcomes are fully deterministic.

mod common;

use common::*;
use qddns_core::UpdateEngine;
use std::net::IpAddr;

#[tokio::test]
async fn majority_is_pushed_then_idempotent() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("bilibili", "1.2.3.4");
    fetcher.answer("cloudflare-trace", "1.2.3.4");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["bilibili", "cloudflare-trace"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher.clone()),
        Box::new(provider.clone()),
        &config,
    )
    .expect("engine construction succeeds");

    // First tick: two sources agree, record is pushed once.
    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 1);
    assert_eq!(provider.pushed(), vec!["1.2.3.4".parse::<IpAddr>().unwrap()]);
    assert_eq!(engine.last_ip(), Some("1.2.3.4"));

    // Second tick with identical answers: fast path, no provider call.
    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 1);
    assert_eq!(engine.last_ip(), Some("1.2.3.4"));
}

#[tokio::test]
async fn majority_overrules_higher_priority_dissenter() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("a", "5.5.5.5");
    fetcher.answer("b", "9.9.9.9");
    fetcher.answer("c", "9.9.9.9");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b", "c"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    engine.run_once().await;
    assert_eq!(provider.pushed(), vec!["9.9.9.9".parse::<IpAddr>().unwrap()]);
}

#[tokio::test]
async fn three_way_disagreement_trusts_first_listed_source() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("a", "1.1.1.1");
    fetcher.answer("b", "2.2.2.2");
    fetcher.answer("c", "3.3.3.3");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b", "c"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    engine.run_once().await;
    assert_eq!(provider.pushed(), vec!["1.1.1.1".parse::<IpAddr>().unwrap()]);
    assert_eq!(engine.last_ip(), Some("1.1.1.1"));
}

#[tokio::test]
async fn single_surviving_source_is_trusted() {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail("a", "timeout");
    fetcher.answer("b", "203.0.113.7");
    fetcher.fail("c", "rate limited");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b", "c"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    engine.run_once().await;
    assert_eq!(
        provider.pushed(),
        vec!["203.0.113.7".parse::<IpAddr>().unwrap()]
    );
}

#[tokio::test]
async fn undetermined_cycle_makes_no_provider_call() {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail("a", "connection refused");
    fetcher.fail("b", "dns failure");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher.clone()),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 0);
    assert_eq!(engine.last_ip(), None);
    // Every source was still asked.
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn agreed_garbage_never_reaches_the_provider() {
    let fetcher = ScriptedFetcher::new();
    fetcher.answer("a", "not-an-ip");
    fetcher.answer("b", "not-an-ip");

    let provider = CountingProvider::new();
    let config = config_with_sources(&["a", "b"]);

    let (mut engine, _events) = UpdateEngine::new(
        Box::new(fetcher),
        Box::new(provider.clone()),
        &config,
    )
    .unwrap();

    engine.run_once().await;
    assert_eq!(provider.update_call_count(), 0);
    assert_eq!(engine.last_ip(), None);
}
