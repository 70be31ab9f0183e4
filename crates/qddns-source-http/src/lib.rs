// # HTTP Source Fetcher
//
// Executes one network fetch against one configured IP discovery source
// and extracts the IP string by the source's format rule.
//
// ## Behavior
//
// - one bounded GET per call (10 second timeout), no retries, no caching
// - extraction is a pure function of the body, unit tested below
// - an explicit network family pins the request to IPv4 or IPv6 transport
//   by binding the client's local address; useful when a record-type
//   override means only one family's answer is acceptable
//
// Failures never carry further than the current resolution cycle: the
// resolver logs them and treats the source as abstaining.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use qddns_core::config::{IpSourceSpec, SourceFormat};
use qddns_core::error::FetchError;
use qddns_core::traits::{IpFamily, IpFetcher};

/// Per-request timeout for source fetches
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based source fetcher.
///
/// Holds three clients differing only in local-address binding: unpinned,
/// IPv4-pinned and IPv6-pinned. Clients are cheap handles around a shared
/// connection pool and building them once up front keeps `fetch` free of
/// setup work.
pub struct HttpFetcher {
    client: reqwest::Client,
    client_v4: reqwest::Client,
    client_v6: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout
    pub fn new() -> Self {
        Self {
            client: build_client(None),
            client_v4: build_client(Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED))),
            client_v6: build_client(Some(IpAddr::V6(Ipv6Addr::UNSPECIFIED))),
        }
    }

    fn client_for(&self, family: Option<IpFamily>) -> &reqwest::Client {
        match family {
            None => &self.client,
            Some(IpFamily::V4) => &self.client_v4,
            Some(IpFamily::V6) => &self.client_v6,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(local_address: Option<IpAddr>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().timeout(FETCH_TIMEOUT);
    if let Some(addr) = local_address {
        builder = builder.local_address(addr);
    }
    builder.build().unwrap_or_default()
}

#[async_trait]
impl IpFetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &IpSourceSpec,
        family: Option<IpFamily>,
    ) -> Result<String, FetchError> {
        tracing::debug!("fetching {} ({})", source.name, source.url);

        let response = self
            .client_for(family)
            .get(&source.url)
            .send()
            .await
            .map_err(|e| FetchError::network(&source.name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::network(
                &source.name,
                format!("HTTP status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::network(&source.name, e.to_string()))?;

        extract_ip(&source.name, &body, source.format, source.json_path.as_deref())
    }
}

/// Extract the IP string from a response body according to the format rule.
///
/// - `text`: the whole body, trimmed
/// - `trace`: the remainder of the first line starting with `ip=`
/// - `json`: the string at `json_path` (dot-separated object keys)
fn extract_ip(
    source: &str,
    body: &str,
    format: SourceFormat,
    json_path: Option<&str>,
) -> Result<String, FetchError> {
    match format {
        SourceFormat::Text => {
            let ip = body.trim();
            if ip.is_empty() {
                Err(FetchError::EmptyResponse {
                    source_name: source.to_string(),
                })
            } else {
                Ok(ip.to_string())
            }
        }
        SourceFormat::Trace => body
            .lines()
            .find_map(|line| line.strip_prefix("ip="))
            .map(str::to_string)
            .ok_or_else(|| FetchError::PatternNotFound {
                source_name: source.to_string(),
            }),
        SourceFormat::Json => {
            // A body that is not JSON at all is indistinguishable from a
            // non-object root: the walk fails at the first segment.
            let root: Value = serde_json::from_str(body).unwrap_or(Value::Null);
            let path = json_path.unwrap_or("");
            let mut value = &root;
            for segment in path.split('.') {
                match value.as_object() {
                    Some(map) => {
                        value = map.get(segment).unwrap_or(&Value::Null);
                    }
                    None => {
                        return Err(FetchError::PathError {
                            source_name: source.to_string(),
                            segment: segment.to_string(),
                        });
                    }
                }
            }
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| FetchError::NotAString {
                    source_name: source.to_string(),
                })
        }
    }
}
