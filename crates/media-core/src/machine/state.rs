use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cache::SuccessCache;
use crate::canonical::{canonicalize, with_param, MOUNT_PARAM, RETRY_PARAM, TIME_PARAM};
use crate::error::{ErrorKind, TransitionError};
use crate::render::FailureReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Error,
}

impl LoadStatus {
    pub fn can_transition_to(self, target: LoadStatus) -> bool {
        matches!(
            (self, target),
            (LoadStatus::Idle, LoadStatus::Loading)
                | (LoadStatus::Idle, LoadStatus::Loaded)
                | (LoadStatus::Loading, LoadStatus::Loaded)
                | (LoadStatus::Loading, LoadStatus::Error)
                | (LoadStatus::Loading, LoadStatus::Loading)
                | (LoadStatus::Loaded, LoadStatus::Loading)
                | (LoadStatus::Error, LoadStatus::Loading)
        )
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Snapshot of one asset's load lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadState {
    pub status: LoadStatus,
    pub error_kind: Option<ErrorKind>,
    pub retry_count: u32,
    pub resolved_url: String,
    /// A diagnostic probe is refining `error_kind`.
    #[serde(default)]
    pub probing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl LoadState {
    /// Loaded, or failed with no classification pending.
    pub fn is_settled(&self) -> bool {
        match self.status {
            LoadStatus::Loaded => true,
            LoadStatus::Error => !self.probing,
            LoadStatus::Idle | LoadStatus::Loading => false,
        }
    }

    pub fn retry_allowed(&self) -> bool {
        self.status == LoadStatus::Error && self.error_kind.is_some_and(ErrorKind::allows_retry)
    }
}

/// What the driver must do after mounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The asset was verified earlier; nothing to fetch.
    Loaded,
    /// Fetch and render this URL under a fresh timer.
    Load { url: String },
}

/// Per-asset state container.
///
/// Every mutation goes through one of the transition methods below; each
/// rejects events that are invalid for the current status.
pub struct LoadStateMachine {
    state: LoadState,
    canonical_url: String,
    cache: Arc<dyn SuccessCache>,
}

impl LoadStateMachine {
    pub fn new(url: impl Into<String>, cache: Arc<dyn SuccessCache>) -> Self {
        let url = url.into();
        Self {
            canonical_url: canonicalize(&url),
            state: LoadState {
                status: LoadStatus::Idle,
                error_kind: None,
                retry_count: 0,
                resolved_url: url,
                probing: false,
                failure: None,
            },
            cache,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn status(&self) -> LoadStatus {
        self.state.status
    }

    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    fn guard(&self, target: LoadStatus, event: &'static str) -> Result<(), TransitionError> {
        if self.state.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.state.status,
                event,
            })
        }
    }

    /// Leave `Idle`.
    ///
    /// The success cache is consulted first: a URL verified earlier jumps
    /// straight to `Loaded` without starting a timer or touching the network.
    pub fn mount(&mut self) -> Result<Step, TransitionError> {
        if self.state.status != LoadStatus::Idle {
            return Err(TransitionError {
                from: self.state.status,
                event: "mount",
            });
        }

        if self.cache.has_loaded(&self.canonical_url) {
            debug!(url = %self.canonical_url, "Success cache hit, skipping load");
            self.state.status = LoadStatus::Loaded;
            return Ok(Step::Loaded);
        }

        let url = with_param(
            &self.state.resolved_url,
            MOUNT_PARAM,
            &Utc::now().timestamp_millis().to_string(),
        );
        self.state.resolved_url = url.clone();
        self.state.status = LoadStatus::Loading;
        trace!(url = %url, "Loading asset");
        Ok(Step::Load { url })
    }

    /// The rendering primitive reported success.
    pub fn succeed(&mut self) -> Result<(), TransitionError> {
        if self.state.status != LoadStatus::Loading {
            return Err(TransitionError {
                from: self.state.status,
                event: "succeed",
            });
        }
        self.state.status = LoadStatus::Loaded;
        self.state.error_kind = None;
        self.state.failure = None;
        self.cache.mark_loaded(&self.canonical_url);
        Ok(())
    }

    /// The rendering primitive reported failure. The kind starts as
    /// `Unknown` with a probe pending.
    pub fn fail(&mut self, reason: FailureReason) -> Result<(), TransitionError> {
        self.guard(LoadStatus::Error, "fail")?;
        self.state.status = LoadStatus::Error;
        self.state.error_kind = Some(ErrorKind::Unknown);
        self.state.failure = Some(reason);
        self.state.probing = true;
        Ok(())
    }

    /// Neither signal arrived before the timer elapsed.
    pub fn time_out(&mut self) -> Result<(), TransitionError> {
        self.guard(LoadStatus::Error, "time out")?;
        self.state.status = LoadStatus::Error;
        self.state.error_kind = Some(ErrorKind::Timeout);
        self.state.failure = None;
        self.state.probing = false;
        Ok(())
    }

    /// Apply the classifier's verdict to a failure that is still being probed.
    pub fn refine(&mut self, kind: ErrorKind) -> Result<(), TransitionError> {
        if self.state.status != LoadStatus::Error || !self.state.probing {
            return Err(TransitionError {
                from: self.state.status,
                event: "refine",
            });
        }
        self.state.error_kind = Some(kind);
        self.state.probing = false;
        Ok(())
    }

    /// Re-enter `Loading` with a fresh cache-busting URL.
    ///
    /// A URL that was previously marked loaded is invalidated first, so that
    /// the cache cannot mask a regression.
    pub fn retry(&mut self) -> Result<String, TransitionError> {
        if self.state.status == LoadStatus::Idle {
            return Err(TransitionError {
                from: self.state.status,
                event: "retry",
            });
        }

        if self.cache.has_loaded(&self.canonical_url) {
            self.cache.invalidate(&self.canonical_url);
        }

        self.state.retry_count = self.state.retry_count.saturating_add(1);
        let busted = with_param(
            &self.state.resolved_url,
            RETRY_PARAM,
            &self.state.retry_count.to_string(),
        );
        let busted = with_param(&busted, TIME_PARAM, &Utc::now().timestamp_millis().to_string());

        self.state.resolved_url = busted.clone();
        self.state.status = LoadStatus::Loading;
        self.state.error_kind = None;
        self.state.failure = None;
        self.state.probing = false;
        debug!(url = %busted, retry_count = self.state.retry_count, "Retrying asset load");
        Ok(busted)
    }
}
