//! Diagnostic probing of failed asset URLs.
//!
//! A render failure is first reported as [`ErrorKind::Unknown`]; the
//! [`ErrorClassifier`] then issues a header-only request against the same URL
//! and refines the kind from the response.

mod http;

pub use http::HttpProbe;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;
use crate::kind::AssetKind;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Network error probing {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("Timeout probing {url}")]
    Timeout { url: String },
}

/// Status line and content type of a probe response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
}

impl ProbeResponse {
    pub fn new(status: u16, content_type: Option<&str>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
        }
    }

    /// Media type without parameters, lowercased.
    pub fn mime(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

/// Trait for issuing header-only requests against asset URLs.
#[async_trait]
pub trait AssetProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}

fn is_fallback_body(mime: &str) -> bool {
    mime == "text/html" || mime == "application/json"
}

fn matches_kind(mime: &str, expected: AssetKind) -> bool {
    match expected {
        AssetKind::Image | AssetKind::Unknown => mime.starts_with("image/"),
        AssetKind::Document => {
            mime == "application/pdf"
                || mime == "application/msword"
                || mime.starts_with("application/vnd.openxmlformats-officedocument.")
        }
    }
}

/// Map a probe result to an error kind.
///
/// An unreachable URL is treated as missing.
pub fn classify_probe(result: &Result<ProbeResponse, ProbeError>, expected: AssetKind) -> ErrorKind {
    let response = match result {
        Ok(r) => r,
        Err(_) => return ErrorKind::NotFound,
    };

    if response.status == 404 {
        return ErrorKind::NotFound;
    }

    let mime = response.mime();
    if mime.as_deref().is_some_and(is_fallback_body) {
        return ErrorKind::NotFound;
    }

    let success = (200..300).contains(&response.status);
    if success && mime.as_deref().is_some_and(|m| matches_kind(m, expected)) {
        return ErrorKind::InvalidFormat;
    }

    ErrorKind::Unknown
}

/// Refines failed loads into a specific [`ErrorKind`].
#[derive(Clone)]
pub struct ErrorClassifier {
    probe: Arc<dyn AssetProbe>,
}

impl ErrorClassifier {
    pub fn new(probe: Arc<dyn AssetProbe>) -> Self {
        Self { probe }
    }

    pub async fn classify(&self, failed_url: &str, expected: AssetKind) -> ErrorKind {
        let result = self.probe.probe(failed_url).await;
        let kind = classify_probe(&result, expected);
        match &result {
            Ok(r) => debug!(
                url = failed_url,
                status = r.status,
                content_type = r.content_type.as_deref().unwrap_or(""),
                %kind,
                "Classified failed asset"
            ),
            Err(e) => debug!(url = failed_url, error = %e, %kind, "Probe failed"),
        }
        kind
    }
}
