// # qddns-core
//
// Core library for the quorum-based DDNS updater.
//
// ## Architecture Overview
//
// - **IpFetcher**: trait for querying one public-IP discovery endpoint
// - **DnsProvider**: trait for upserting one DNS record via a provider API
// - **ConsensusResolver**: reconciles the answers of several independent
//   sources into a single trusted IP (majority vote with priority fallback)
// - **UpdateEngine**: the scheduler loop that resolves on a fixed interval
//   and pushes to the provider only when the trusted IP changed
// - **ProviderRegistry**: plugin-based registry for DNS provider backends
//
// ## Design Principles
//
// 1. **Separation of Concerns**: decision logic lives here, network I/O in
//    the fetcher/provider crates
// 2. **Deterministic Resolution**: the election over an observation set is a
//    pure function of the configured source order
// 3. **Single Owner of State**: the last pushed IP belongs to the engine's
//    scheduler task, nothing else

pub mod config;
pub mod consensus;
pub mod engine;
pub mod error;
pub mod record;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{DdnsConfig, IpSourceSpec, SourceFormat};
pub use consensus::{ConsensusResolver, ObservationSet};
pub use engine::UpdateEngine;
pub use error::{Error, FetchError, Result};
pub use record::RecordKind;
pub use registry::ProviderRegistry;
pub use traits::{DnsProvider, IpFamily, IpFetcher, UpdateOutcome};
