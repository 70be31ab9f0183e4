//! Test doubles and common utilities for engine contract tests
//!
//! The doubles are handle-cloneable: all interesting state sits behind an
//! Arc, so a test can keep one handle for assertions after boxing another
//! into the engine.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use qddns_core::config::{CloudflareCredentials, DdnsConfig, IpSourceSpec, SourceFormat};
use qddns_core::error::{Error, FetchError};
use qddns_core::traits::{DnsProvider, IpFamily, IpFetcher, UpdateOutcome};

/// A fetcher whose per-source answers are scripted by the test.
///
/// Sources without a script entry fail with a network error, which is how
/// a down endpoint looks to the resolver.
#[derive(Clone, Default)]
pub struct ScriptedFetcher {
    answers: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful answer for `source`
    pub fn answer(&self, source: &str, ip: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(source.to_string(), Ok(ip.to_string()));
    }

    /// Script a network failure for `source`
    pub fn fail(&self, source: &str, message: &str) {
        self.answers
            .lock()
            .unwrap()
            .insert(source.to_string(), Err(message.to_string()));
    }

    /// Total number of fetch() invocations across all sources
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        source: &IpSourceSpec,
        _family: Option<IpFamily>,
    ) -> Result<String, FetchError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().get(&source.name) {
            Some(Ok(ip)) => Ok(ip.clone()),
            Some(Err(message)) => Err(FetchError::network(&source.name, message)),
            None => Err(FetchError::network(&source.name, "unscripted source")),
        }
    }
}

/// A DNS provider double that counts calls and records pushed IPs.
#[derive(Clone)]
pub struct CountingProvider {
    update_call_count: Arc<AtomicUsize>,
    pushed: Arc<Mutex<Vec<IpAddr>>>,
    failing: Arc<AtomicBool>,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self {
            update_call_count: Arc::new(AtomicUsize::new(0)),
            pushed: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent update_record() calls fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    /// IPs handed to update_record(), in call order
    pub fn pushed(&self) -> Vec<IpAddr> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsProvider for CountingProvider {
    async fn update_record(&self, ip: IpAddr) -> Result<UpdateOutcome, Error> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::provider("counting", "scripted failure"));
        }
        self.pushed.lock().unwrap().push(ip);
        Ok(UpdateOutcome::Updated { previous: None })
    }

    fn provider_name(&self) -> &'static str {
        "counting"
    }
}

/// Build a minimal valid config over the given source names.
pub fn config_with_sources(names: &[&str]) -> DdnsConfig {
    DdnsConfig {
        provider: "cloudflare".to_string(),
        domain: "example.com".to_string(),
        subdomain: "www".to_string(),
        record_type: "auto".to_string(),
        log_level: "info".to_string(),
        log_file: String::new(),
        ip_sources: names
            .iter()
            .map(|name| IpSourceSpec {
                name: name.to_string(),
                url: format!("https://{name}.invalid/ip"),
                format: SourceFormat::Text,
                json_path: None,
            })
            .collect(),
        update_interval_minutes: 5,
        cloudflare: Some(CloudflareCredentials {
            api_token: "test-token".to_string(),
            zone_id: String::new(),
        }),
        aliyun: None,
        tencentcloud: None,
    }
}
