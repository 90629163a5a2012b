//! Fetcher configuration
//!
//! Holds the tunables shared by the fetcher and the transport. Defaults match
//! the behaviour expected from a plain JSON API client: five minute cache,
//! JSON bodies, no request timeout.

use std::time::Duration;

/// Default time-to-live for cached responses (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Content type attached to requests that carry a body
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Configuration for a `CachedFetcher` and its transport
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// How long a cached response is considered fresh
    pub ttl: Duration,
    /// Content type sent with a body when the caller did not set one
    pub default_content_type: String,
    /// Overall request timeout, if any
    pub timeout: Option<Duration>,
    /// User agent reported by the reqwest transport
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            timeout: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetcherConfig {
    /// Returns the config with a different cache TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the config with a request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
