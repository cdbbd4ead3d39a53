use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::canonical::canonicalize;

/// Record of asset URLs that have loaded successfully at least once.
///
/// Implementations key every operation by the canonical form of the URL, so
/// callers may pass URLs carrying cache-busting parameters. The cache never
/// stores asset bytes.
pub trait SuccessCache: Send + Sync {
    fn mark_loaded(&self, url: &str);

    fn has_loaded(&self, url: &str) -> bool;

    fn invalidate(&self, url: &str);

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded in-memory success cache. Entries live until invalidated.
#[derive(Debug, Default)]
pub struct MemorySuccessCache {
    entries: DashMap<String, DateTime<Utc>>,
}

impl MemorySuccessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the canonical form of `url` was first verified.
    pub fn verified_at(&self, url: &str) -> Option<DateTime<Utc>> {
        self.entries.get(&canonicalize(url)).map(|e| *e.value())
    }
}

impl SuccessCache for MemorySuccessCache {
    fn mark_loaded(&self, url: &str) {
        let key = canonicalize(url);
        self.entries.entry(key).or_insert_with(Utc::now);
    }

    fn has_loaded(&self, url: &str) -> bool {
        self.entries.contains_key(&canonicalize(url))
    }

    fn invalidate(&self, url: &str) {
        let key = canonicalize(url);
        if self.entries.remove(&key).is_some() {
            debug!(url = %key, "Invalidated success cache entry");
        }
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
