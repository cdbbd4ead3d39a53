use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::ErrorKind;

/// Engine-wide counters, shared by every session.
#[derive(Debug, Default)]
pub struct EngineStats {
    mounts: AtomicU64,
    cache_hits: AtomicU64,
    loads: AtomicU64,
    retries: AtomicU64,
    probes: AtomicU64,
    not_found: AtomicU64,
    invalid_format: AtomicU64,
    timeouts: AtomicU64,
    unknown: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub mounts: u64,
    pub cache_hits: u64,
    pub loads: u64,
    pub retries: u64,
    pub probes: u64,
    pub not_found: u64,
    pub invalid_format: u64,
    pub timeouts: u64,
    pub unknown: u64,
}

impl StatsSnapshot {
    pub fn errors(&self, kind: ErrorKind) -> u64 {
        match kind {
            ErrorKind::NotFound => self.not_found,
            ErrorKind::InvalidFormat => self.invalid_format,
            ErrorKind::Timeout => self.timeouts,
            ErrorKind::Unknown => self.unknown,
        }
    }
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_mount(&self) {
        self.mounts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::NotFound => &self.not_found,
            ErrorKind::InvalidFormat => &self.invalid_format,
            ErrorKind::Timeout => &self.timeouts,
            ErrorKind::Unknown => &self.unknown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            mounts: self.mounts.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            invalid_format: self.invalid_format.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
        }
    }
}
