// # DNS Provider Trait
//
// Defines the interface for upserting one DNS record via a provider API.
//
// ## Implementations
//
// - Cloudflare: `qddns-provider-cloudflare` crate
// - Aliyun: `qddns-provider-aliyun` crate
//
// A provider instance is bound to a single record (fqdn + configured
// record-type override) at construction time; the engine only ever hands it
// the new IP. Implementations must be:
//
// - **Idempotent**: if the record already holds the target value, calling
//   again is a no-op success. A record with the same name but a different
//   value is overwritten in place, never duplicated. A missing record is
//   created.
// - **Stateless and single-shot**: no retries, no backoff, no caching, no
//   background tasks. On failure they return an error and the engine's next
//   tick retries naturally.
//
// The record type (A/AAAA) is derived from the IP being pushed via the
// record-type classifier, not fixed per provider.

use async_trait::async_trait;
use std::net::IpAddr;

/// Result of a DNS upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// An existing record was overwritten in place
    Updated {
        /// The value the record held before
        previous: Option<IpAddr>,
    },
    /// Record already held the target value (no-op)
    Unchanged,
    /// No record existed; one was created
    Created,
}

/// Trait for DNS provider implementations
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Upsert the managed record to point at `ip`.
    ///
    /// # Idempotency
    ///
    /// Calling this repeatedly with the same IP must succeed and change
    /// nothing after the first successful call.
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateOutcome)`: what the upsert did
    /// - `Err(Error)`: the update did not take effect; the caller must not
    ///   consider the IP applied
    async fn update_record(&self, ip: IpAddr) -> Result<UpdateOutcome, crate::Error>;

    /// Provider name for logging/registry purposes (e.g. "cloudflare")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a provider instance bound to the record described by `config`
    ///
    /// Fails with a configuration error when the credential block for this
    /// provider is missing or incomplete.
    fn create(&self, config: &crate::config::DdnsConfig)
    -> Result<Box<dyn DnsProvider>, crate::Error>;
}
