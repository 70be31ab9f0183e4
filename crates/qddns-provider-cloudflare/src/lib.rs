// # Cloudflare DNS Provider
//
// Upserts one DNS record via the Cloudflare API v4.
//
// ## Behavior
//
// - zone ID comes from the configuration, or is discovered once per call
//   via `GET /zones?name=<domain>`
// - candidate records are listed with `GET /zones/:id/dns_records?name=&type=`
// - an exact content match short-circuits to a no-op success
// - same-name records with a different value are overwritten in place (PUT),
//   preserving their TTL and proxied flag; nothing is ever duplicated
// - with no record present one is created (POST, TTL 60, unproxied)
// - the record type (A/AAAA) is derived from the pushed IP through the
//   record-type classifier, honoring the configured override
//
// No retries, no backoff, no caching, no background tasks: a failure is
// returned to the engine, whose next tick retries naturally.
//
// ## Security
//
// The API token never appears in logs; the Debug implementation redacts it.
//
// ## Dry-Run Mode
//
// With `DDNS_MODE=dry-run` in the environment the provider performs all
// lookups but skips mutations, logging what it would have sent.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

use qddns_core::config::DdnsConfig;
use qddns_core::record;
use qddns_core::traits::{DnsProvider, DnsProviderFactory, UpdateOutcome};
use qddns_core::{Error, Result};

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// HTTP timeout for API requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL used when creating a record that did not exist yet
const CREATE_TTL: u32 = 60;

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Deserialize, Clone)]
struct DnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: u32,
    #[serde(default)]
    proxied: Option<bool>,
}

/// Cloudflare DNS provider, bound to one record at construction.
pub struct CloudflareProvider {
    /// API token with Zone:DNS:Edit permission; never logged
    api_token: String,

    /// Zone ID, or None to discover it from the domain
    zone_id: Option<String>,

    /// Zone apex domain used for zone discovery
    domain: String,

    /// Fully qualified record name being managed
    fqdn: String,

    /// Record type override from the configuration
    record_type: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// When true, perform lookups but skip mutations
    dry_run: bool,
}

// The API token must not leak through Debug output.
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("fqdn", &self.fqdn)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider for `fqdn` inside `domain`'s zone.
    ///
    /// `zone_id` skips zone discovery when given; `record_type` is the
    /// configured override handed to the classifier on every update.
    pub fn new(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        domain: impl Into<String>,
        fqdn: impl Into<String>,
        record_type: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            api_token: api_token.into(),
            zone_id,
            domain: domain.into(),
            fqdn: fqdn.into(),
            record_type: record_type.into(),
            client,
            dry_run,
        }
    }

    /// Map an unsuccessful API status to the error taxonomy
    fn status_error(status: reqwest::StatusCode, context: &str, body: String) -> Error {
        match status.as_u16() {
            401 | 403 => Error::auth(format!(
                "{context}: invalid API token or insufficient permissions (status {status})"
            )),
            404 => Error::not_found(format!("{context} (status {status})")),
            429 => Error::rate_limited(format!("{context}: retry later (status {status})")),
            500..=599 => Error::provider(
                "cloudflare",
                format!("{context}: server error (transient): {status} - {body}"),
            ),
            _ => Error::provider("cloudflare", format!("{context}: {status} - {body}")),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned + Default>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("{context}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, context, body));
        }

        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("{context}: bad response: {e}")))?;

        if !envelope.success {
            return Err(Error::provider(
                "cloudflare",
                format!("{context}: API reported failure"),
            ));
        }

        envelope
            .result
            .ok_or_else(|| Error::provider("cloudflare", format!("{context}: empty result")))
    }

    async fn send_mutation(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<()> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("{context}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, context, body));
        }

        Ok(())
    }

    /// Resolve the zone ID, preferring the configured one
    async fn zone_id(&self) -> Result<String> {
        if let Some(ref zone_id) = self.zone_id {
            tracing::debug!("using configured zone ID");
            return Ok(zone_id.clone());
        }

        let url = format!("{}/zones?name={}", CLOUDFLARE_API_BASE, self.domain);
        let zones: Vec<Zone> = self.get_json(&url, "zone lookup").await?;

        zones
            .into_iter()
            .find(|zone| zone.name == self.domain)
            .map(|zone| zone.id)
            .ok_or_else(|| Error::not_found(format!("zone not found for domain {}", self.domain)))
    }

    /// List same-name records of the given type
    async fn list_records(&self, zone_id: &str, dns_type: &str) -> Result<Vec<DnsRecord>> {
        let url = format!(
            "{}/zones/{}/dns_records?name={}&type={}",
            CLOUDFLARE_API_BASE, zone_id, self.fqdn, dns_type
        );
        self.get_json(&url, "record lookup").await
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn update_record(&self, ip: IpAddr) -> Result<UpdateOutcome> {
        let value = ip.to_string();
        let dns_type = record::kind_for(&value, &self.record_type)
            .dns_type()
            .ok_or_else(|| Error::provider("cloudflare", format!("not an IP literal: {value}")))?;

        tracing::info!(
            "cloudflare: upserting {} {} -> {}{}",
            dns_type,
            self.fqdn,
            value,
            if self.dry_run { " [dry-run]" } else { "" }
        );

        let zone_id = self.zone_id().await?;
        let records = self.list_records(&zone_id, dns_type).await?;

        // Exact match means there is nothing to do.
        if records
            .iter()
            .any(|r| r.record_type == dns_type && r.name == self.fqdn && r.content == value)
        {
            tracing::info!("cloudflare: record already up to date: {} -> {}", self.fqdn, value);
            return Ok(UpdateOutcome::Unchanged);
        }

        let stale: Vec<DnsRecord> = records
            .into_iter()
            .filter(|r| r.record_type == dns_type && r.name == self.fqdn)
            .collect();

        if !stale.is_empty() {
            let previous = stale.first().and_then(|r| r.content.parse().ok());
            for old in &stale {
                let url = format!(
                    "{}/zones/{}/dns_records/{}",
                    CLOUDFLARE_API_BASE, zone_id, old.id
                );
                let payload = serde_json::json!({
                    "type": dns_type,
                    "name": self.fqdn,
                    "content": value,
                    "ttl": old.ttl,
                    "proxied": old.proxied,
                });

                if self.dry_run {
                    tracing::info!("cloudflare: would PUT {} with {}", url, payload);
                    continue;
                }

                self.send_mutation(self.client.put(&url).json(&payload), "record update")
                    .await?;
                tracing::info!(
                    "cloudflare: updated record {} -> {} (was {})",
                    self.fqdn,
                    value,
                    old.content
                );
            }
            return Ok(UpdateOutcome::Updated { previous });
        }

        // No record with this name yet, create one.
        let url = format!("{}/zones/{}/dns_records", CLOUDFLARE_API_BASE, zone_id);
        let payload = serde_json::json!({
            "type": dns_type,
            "name": self.fqdn,
            "content": value,
            "ttl": CREATE_TTL,
            "proxied": false,
        });

        if self.dry_run {
            tracing::info!("cloudflare: would POST {} with {}", url, payload);
            return Ok(UpdateOutcome::Created);
        }

        self.send_mutation(self.client.post(&url).json(&payload), "record creation")
            .await
            .map_err(|e| {
                Error::provider("cloudflare", format!("record missing and creation failed: {e}"))
            })?;

        tracing::info!("cloudflare: created record {} -> {}", self.fqdn, value);
        Ok(UpdateOutcome::Created)
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers from the configuration
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &DdnsConfig) -> Result<Box<dyn DnsProvider>> {
        let creds = config
            .cloudflare
            .as_ref()
            .ok_or_else(|| Error::config("cloudflare credentials are not configured"))?;

        if creds.api_token.is_empty() {
            return Err(Error::config("cloudflare API token is required"));
        }

        let zone_id = if creds.zone_id.is_empty() {
            None
        } else {
            Some(creds.zone_id.clone())
        };

        let dry_run = std::env::var("DDNS_MODE").unwrap_or_default().to_lowercase() == "dry-run";
        if dry_run {
            tracing::warn!("cloudflare provider in dry-run mode, no changes will be made");
        }

        Ok(Box::new(CloudflareProvider::new(
            creds.api_token.clone(),
            zone_id,
            config.domain.clone(),
            config.fqdn(),
            config.record_type.clone(),
            dry_run,
        )))
    }
}

/// Register the Cloudflare provider with a registry
pub fn register(registry: &qddns_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
