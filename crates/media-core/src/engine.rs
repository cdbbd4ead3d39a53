use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::cache::{MemorySuccessCache, SuccessCache};
use crate::config::{retry_delay, EndpointConfig, EngineConfig};
use crate::kind::AssetKind;
use crate::machine::{AssetSession, LoadStateMachine, SessionContext};
use crate::probe::{AssetProbe, ErrorClassifier, HttpProbe};
use crate::render::{AssetRenderer, HttpRenderer};
use crate::source::{self, ProductMedia, ResolvedMedia};
use crate::stats::EngineStats;

/// Per-mount overrides of the engine configuration.
///
/// A compact thumbnail and a full viewer on the same engine can use
/// different load budgets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountOptions {
    pub load_timeout: Option<Duration>,
}

impl MountOptions {
    pub fn with_load_timeout(mut self, ms: u64) -> Self {
        self.load_timeout = Some(Duration::from_millis(ms.max(1)));
        self
    }
}

/// Entry point tying resolution, the success cache and asset sessions
/// together. Construct once and share behind an `Arc`.
pub struct MediaEngine {
    config: EngineConfig,
    endpoints: EndpointConfig,
    cache: Arc<dyn SuccessCache>,
    renderer: Arc<dyn AssetRenderer>,
    classifier: ErrorClassifier,
    stats: Arc<EngineStats>,
    created_at: DateTime<Utc>,
}

impl MediaEngine {
    pub fn new(
        config: EngineConfig,
        cache: Arc<dyn SuccessCache>,
        renderer: Arc<dyn AssetRenderer>,
        probe: Arc<dyn AssetProbe>,
    ) -> Self {
        let endpoints = config.endpoints();
        info!(origin = %endpoints.origin, "Media engine initialised");
        Self {
            endpoints,
            config,
            cache,
            renderer,
            classifier: ErrorClassifier::new(probe),
            stats: Arc::new(EngineStats::new()),
            created_at: Utc::now(),
        }
    }

    /// Engine with HTTP rendering and probing and an in-memory cache.
    pub fn from_config(config: EngineConfig) -> Self {
        let client = HttpProbe::build_client(config.request_timeout);
        let renderer = Arc::new(HttpRenderer::with_client(client.clone()));
        let probe = Arc::new(HttpProbe::from_config_with_client(&config, client));
        Self::new(config, Arc::new(MemorySuccessCache::new()), renderer, probe)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }

    pub fn cache(&self) -> &Arc<dyn SuccessCache> {
        &self.cache
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn resolve(&self, product: &ProductMedia) -> ResolvedMedia {
        source::resolve(product)
    }

    pub fn request_url(&self, resolved: &ResolvedMedia) -> Option<String> {
        resolved.request_url(&self.endpoints)
    }

    /// Resolve `product` and mount a session for its asset.
    ///
    /// Returns `None` when the product has no media at all.
    pub fn mount(&self, product: &ProductMedia) -> Option<AssetSession> {
        let resolved = self.resolve(product);
        self.mount_resolved(&resolved)
    }

    pub fn mount_resolved(&self, resolved: &ResolvedMedia) -> Option<AssetSession> {
        self.mount_resolved_with(resolved, MountOptions::default())
    }

    pub fn mount_resolved_with(
        &self,
        resolved: &ResolvedMedia,
        options: MountOptions,
    ) -> Option<AssetSession> {
        match self.request_url(resolved) {
            Some(url) => Some(self.mount_url_with(url, resolved.kind, options)),
            None => {
                debug!("No media source to mount");
                None
            }
        }
    }

    pub fn mount_url(&self, url: impl Into<String>, kind: AssetKind) -> AssetSession {
        self.mount_url_with(url, kind, MountOptions::default())
    }

    pub fn mount_url_with(
        &self,
        url: impl Into<String>,
        kind: AssetKind,
        options: MountOptions,
    ) -> AssetSession {
        let machine = LoadStateMachine::new(url, Arc::clone(&self.cache));
        AssetSession::spawn(machine, self.session_context(kind, options))
    }

    /// Upper bound on how long a fresh session takes to settle, including
    /// automatic retries and the diagnostic probe.
    pub fn settle_budget(&self) -> Duration {
        self.settle_budget_with(MountOptions::default())
    }

    pub fn settle_budget_with(&self, options: MountOptions) -> Duration {
        let limit = self.config.effective_retry_limit();
        let load_timeout = options.load_timeout.unwrap_or(self.config.load_timeout);
        let backoff = (0..limit)
            .map(|i| retry_delay(self.config.retry_backoff, i))
            .fold(Duration::ZERO, Duration::saturating_add);
        load_timeout
            .saturating_add(self.config.probe_timeout)
            .saturating_mul(limit + 1)
            .saturating_add(backoff)
            .saturating_add(Duration::from_secs(1))
    }

    fn session_context(&self, kind: AssetKind, options: MountOptions) -> SessionContext {
        SessionContext {
            renderer: Arc::clone(&self.renderer),
            classifier: self.classifier.clone(),
            kind,
            load_timeout: options.load_timeout.unwrap_or(self.config.load_timeout),
            auto_retry_limit: self.config.effective_retry_limit(),
            retry_backoff: self.config.retry_backoff,
            stats: Arc::clone(&self.stats),
        }
    }
}
