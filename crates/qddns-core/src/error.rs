//! Error types for the DDNS system
//!
//! Two layers: `FetchError` covers everything that can go wrong while asking
//! one IP discovery source, and is always recoverable (the source abstains
//! for that cycle). `Error` covers the rest of the system; only `Config`
//! variants are fatal.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single IP source fetch.
///
/// Never fatal: the resolver logs it and treats the source as abstaining
/// for the current cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure or non-2xx response
    #[error("source {source_name}: network error: {message}")]
    Network {
        /// Name of the source descriptor
        source_name: String,
        /// Underlying cause
        message: String,
    },

    /// `text` format: body was empty after trimming
    #[error("source {source_name}: empty response")]
    EmptyResponse { source_name: String },

    /// `trace` format: no line with the `ip=` prefix
    #[error("source {source_name}: no ip= line in trace response")]
    PatternNotFound { source_name: String },

    /// `json` format: a path segment did not resolve to an object
    #[error("source {source_name}: json path segment '{segment}' is not an object")]
    PathError { source_name: String, segment: String },

    /// `json` format: the terminal value is not a string
    #[error("source {source_name}: json path value is not a string")]
    NotAString { source_name: String },
}

impl FetchError {
    /// Create a network error for a source
    pub fn network(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            source_name: source.into(),
            message: message.into(),
        }
    }
}

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// A single source fetch failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Configuration errors (fatal: the update loop must not start)
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP-level errors from provider APIs
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failed against a provider API
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Provider-side rate limiting
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found (and creation not possible)
    #[error("not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
