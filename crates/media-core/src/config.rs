use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound on automatic retries per session.
pub const MAX_AUTO_RETRY_LIMIT: u32 = 10;

/// Upper bound on any single automatic-retry delay.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before the automatic retry that follows `retry_count` earlier ones.
pub fn retry_delay(base: Duration, retry_count: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry_count))
        .min(MAX_RETRY_BACKOFF)
}

/// Configuration for a media engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Origin serving static files and the product media endpoints.
    pub origin: String,
    /// Route external image URLs through the same-origin proxy endpoint.
    pub proxy_external_images: bool,
    /// Budget for one load attempt before it is abandoned as a timeout.
    pub load_timeout: Duration,
    /// Budget for the diagnostic HEAD probe after a failed load.
    pub probe_timeout: Duration,
    /// HTTP client timeout for render fetches.
    pub request_timeout: Duration,
    /// Automatic retries of timeouts and unclassified failures (default: 0).
    pub auto_retry_limit: u32,
    /// Base backoff for automatic retries (doubled each attempt).
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8000".to_string(),
            proxy_external_images: true,
            load_timeout: Duration::from_millis(5000),
            probe_timeout: Duration::from_millis(5000),
            request_timeout: Duration::from_secs(10),
            auto_retry_limit: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_proxy_external_images(mut self, enabled: bool) -> Self {
        self.proxy_external_images = enabled;
        self
    }

    pub fn with_load_timeout(mut self, ms: u64) -> Self {
        self.load_timeout = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_probe_timeout(mut self, ms: u64) -> Self {
        self.probe_timeout = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.request_timeout = Duration::from_millis(ms.max(1));
        self
    }

    pub fn with_auto_retry_limit(mut self, limit: u32) -> Self {
        self.auto_retry_limit = limit.min(MAX_AUTO_RETRY_LIMIT);
        self
    }

    pub fn with_retry_backoff(mut self, ms: u64) -> Self {
        self.retry_backoff = Duration::from_millis(ms);
        self
    }

    /// Retry limit actually applied, even for a deserialized config that
    /// bypassed the builder.
    pub fn effective_retry_limit(&self) -> u32 {
        self.auto_retry_limit.min(MAX_AUTO_RETRY_LIMIT)
    }

    pub fn endpoints(&self) -> EndpointConfig {
        EndpointConfig {
            origin: self.origin.trim_end_matches('/').to_string(),
            proxy_external_images: self.proxy_external_images,
        }
    }
}

/// The subset of configuration needed to turn a media source into a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub origin: String,
    pub proxy_external_images: bool,
}
