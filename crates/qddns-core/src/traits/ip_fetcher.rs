// # IP Fetcher Trait
//
// Defines the interface for querying one public-IP discovery endpoint.
//
// ## Implementations
//
// - HTTP-based: `qddns-source-http` crate
//
// Fetchers are **observers**, not decision-makers. They perform exactly one
// bounded network request per call and report a raw IP string or a typed
// failure; voting, change detection and scheduling are owned by the core.
// They must not retry (the next tick is the retry), must not cache, and
// must not spawn tasks.

use async_trait::async_trait;

use crate::config::IpSourceSpec;
use crate::error::FetchError;

/// Network family a fetch can be pinned to.
///
/// Pinning matters when a record-type override forces A or AAAA: a
/// dual-stack host would otherwise happily report its v6 address to a
/// source that is supposed to feed an A record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

/// Trait for IP source fetcher implementations
///
/// One call performs one bounded-timeout request against `source.url` and
/// extracts the IP string according to `source.format`. A hung endpoint
/// must cost at most the fetcher's own timeout, never block the process.
#[async_trait]
pub trait IpFetcher: Send + Sync {
    /// Fetch the public IP as reported by one source.
    ///
    /// `family` optionally pins the transport to IPv4 or IPv6; `None`
    /// leaves the choice to the OS.
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: the raw IP string as extracted from the response
    /// - `Err(FetchError)`: this source abstains for the current cycle
    async fn fetch(
        &self,
        source: &IpSourceSpec,
        family: Option<IpFamily>,
    ) -> Result<String, FetchError>;
}
