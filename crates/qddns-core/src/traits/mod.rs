//! Trait definitions for external collaborators
//!
//! Two seams separate the decision logic from the network: `IpFetcher`
//! (asking one discovery endpoint for the public IP) and `DnsProvider`
//! (upserting one DNS record). Everything behind these traits is plumbing.

pub mod dns_provider;
pub mod ip_fetcher;

pub use dns_provider::{DnsProvider, DnsProviderFactory, UpdateOutcome};
pub use ip_fetcher::{IpFamily, IpFetcher};
