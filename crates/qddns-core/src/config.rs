//! Configuration types for the DDNS system
//!
//! The configuration is a single YAML file loaded once at startup and never
//! hot-reloaded. The order of `ip_sources` matters: it is the trust-priority
//! ranking the consensus resolver falls back to when sources disagree.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::Error;

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// DNS provider backend to use (e.g. "cloudflare", "aliyun")
    pub provider: String,

    /// Zone apex domain (e.g. "example.com")
    pub domain: String,

    /// Subdomain to keep updated; empty means the apex itself
    #[serde(default)]
    pub subdomain: String,

    /// Record type override: "a", "aaaa" or "auto".
    ///
    /// Unrecognized values fall back to auto-detection from the pushed IP;
    /// this is deliberately not a validation error.
    #[serde(default = "default_record_type")]
    pub record_type: String,

    /// Log verbosity ("trace" .. "error"); unknown values fall back to "info"
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log destination; empty means console
    #[serde(default)]
    pub log_file: String,

    /// Ordered list of IP discovery sources (first = most trusted)
    pub ip_sources: Vec<IpSourceSpec>,

    /// Tick period of the update loop
    pub update_interval_minutes: u64,

    /// Cloudflare credentials (required iff provider = "cloudflare")
    #[serde(default)]
    pub cloudflare: Option<CloudflareCredentials>,

    /// Aliyun credentials (required iff provider = "aliyun")
    #[serde(default)]
    pub aliyun: Option<AliyunCredentials>,

    /// Tencent Cloud credentials (parsed for forward compatibility;
    /// no adapter is registered for this provider yet)
    #[serde(default)]
    pub tencentcloud: Option<TencentCloudCredentials>,
}

/// One IP discovery endpoint and how to read its response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpSourceSpec {
    /// Unique name; doubles as the priority key in the resolver
    pub name: String,

    /// URL to GET
    pub url: String,

    /// Response format rule ("type" is accepted as a legacy key)
    #[serde(alias = "type")]
    pub format: SourceFormat,

    /// Dot-separated path into the JSON object tree (format = json only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
}

/// Response format of an IP discovery endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Body is a JSON object; the IP sits at `json_path`
    Json,
    /// Line-oriented body with one `ip=<addr>` line (cdn-cgi/trace style)
    Trace,
    /// Body is the address itself, modulo surrounding whitespace
    Text,
}

/// Cloudflare API credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudflareCredentials {
    /// API token with Zone:DNS:Edit permission
    pub api_token: String,
    /// Zone ID; empty or absent means auto-discover from the domain
    #[serde(default)]
    pub zone_id: String,
}

/// Aliyun (AliDNS) API credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliyunCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    /// RPC endpoint; empty means the default public endpoint
    #[serde(default)]
    pub endpoint: String,
}

/// Tencent Cloud API credentials (reserved)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TencentCloudCredentials {
    pub secret_id: String,
    pub secret_key: String,
}

impl DdnsConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| Error::config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Everything rejected here is fatal: the update loop must not start on
    /// a configuration that cannot possibly work. Soft knobs (record_type,
    /// log_level) are deliberately fail-open and not checked.
    pub fn validate(&self) -> Result<(), Error> {
        if self.domain.is_empty() {
            return Err(Error::config("domain must not be empty"));
        }

        if self.ip_sources.is_empty() {
            return Err(Error::config("at least one ip_sources entry is required"));
        }

        if self.update_interval_minutes == 0 {
            return Err(Error::config("update_interval_minutes must be > 0"));
        }

        let mut names = HashSet::new();
        for source in &self.ip_sources {
            if source.name.is_empty() {
                return Err(Error::config("ip source name must not be empty"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate ip source name: {}",
                    source.name
                )));
            }
            if source.url.is_empty() {
                return Err(Error::config(format!(
                    "ip source {} has an empty url",
                    source.name
                )));
            }
            if source.format == SourceFormat::Json
                && source.json_path.as_deref().unwrap_or("").is_empty()
            {
                return Err(Error::config(format!(
                    "ip source {} uses format json but has no json_path",
                    source.name
                )));
            }
        }

        match self.provider.as_str() {
            "cloudflare" => {
                let creds = self.cloudflare.as_ref().ok_or_else(|| {
                    Error::config("provider is cloudflare but no cloudflare block is configured")
                })?;
                if creds.api_token.is_empty() {
                    return Err(Error::config("cloudflare.api_token must not be empty"));
                }
            }
            "aliyun" => {
                let creds = self.aliyun.as_ref().ok_or_else(|| {
                    Error::config("provider is aliyun but no aliyun block is configured")
                })?;
                if creds.access_key_id.is_empty() || creds.access_key_secret.is_empty() {
                    return Err(Error::config(
                        "aliyun.access_key_id and aliyun.access_key_secret must not be empty",
                    ));
                }
            }
            // Unknown names (including the reserved "tencentcloud") are
            // rejected by the provider registry at startup.
            _ => {}
        }

        Ok(())
    }

    /// Fully qualified record name: `subdomain.domain`, or the bare domain
    /// when no subdomain is configured
    pub fn fqdn(&self) -> String {
        if self.subdomain.is_empty() {
            self.domain.clone()
        } else {
            format!("{}.{}", self.subdomain, self.domain)
        }
    }
}

/// Commented starter configuration, written by the daemon when the
/// configured path does not exist yet.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"provider: "cloudflare"

domain: "example.com"
subdomain: "www"

# a | aaaa | auto
record_type: "auto"

log_level: "info"
log_file: ""

# Ordered by trust: when sources disagree with no majority, the first
# responding source in this list wins.
ip_sources:
  - name: "bilibili"
    url: "https://api.live.bilibili.com/xlive/web-room/v1/index/getIpInfo"
    format: "json"
    json_path: "data.addr"
  - name: "cloudflare"
    url: "https://www.cloudflare-cn.com/cdn-cgi/trace"
    format: "trace"
  - name: "ipify"
    url: "https://api.ipify.org"
    format: "text"

update_interval_minutes: 5

cloudflare:
  api_token: "YOUR_CLOUDFLARE_API_TOKEN"
  zone_id: ""
aliyun:
  access_key_id: "YOUR_ALIYUN_ACCESS_KEY_ID"
  access_key_secret: "YOUR_ALIYUN_ACCESS_KEY_SECRET"
  endpoint: "alidns.aliyuncs.com"
"#;

/// Write the starter configuration to `path`
pub fn write_default_config(path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .map_err(|e| Error::config(format!("cannot write {}: {}", path.display(), e)))
}

fn default_record_type() -> String {
    "auto".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
