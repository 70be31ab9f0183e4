//! Plugin-based provider registry
//!
//! DNS provider backends register a factory under their name; the daemon
//! looks the configured name up at startup. An unknown name is a fatal
//! configuration error raised before the update loop starts. There is no
//! hardcoded if-else chain over providers anywhere in the core.
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new();
//! qddns_provider_cloudflare::register(&registry);
//! qddns_provider_aliyun::register(&registry);
//!
//! let provider = registry.create_provider(&config)?;
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::DdnsConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};

/// Registry of DNS provider factories, keyed by provider name.
///
/// Interior mutability with RwLock so registration and lookup can share a
/// reference; registration happens once at startup.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory under `name`
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap();
        providers.insert(name.into(), factory);
    }

    /// Create the provider selected by `config.provider`.
    ///
    /// # Errors
    ///
    /// `Error::Config` when the name is not registered (the fatal
    /// unsupported-provider startup error) or when the factory rejects the
    /// credential block.
    pub fn create_provider(&self, config: &DdnsConfig) -> Result<Box<dyn DnsProvider>> {
        let providers = self.providers.read().unwrap();

        let factory = providers.get(config.provider.as_str()).ok_or_else(|| {
            Error::config(format!(
                "unsupported provider: {} (supported: {})",
                config.provider,
                {
                    let mut names: Vec<&str> = providers.keys().map(String::as_str).collect();
                    names.sort_unstable();
                    names.join(", ")
                }
            ))
        })?;

        factory.create(config)
    }

    /// List all registered provider names
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap();
        providers.keys().cloned().collect()
    }

    /// Check if a provider name is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap();
        providers.contains_key(name)
    }
}
