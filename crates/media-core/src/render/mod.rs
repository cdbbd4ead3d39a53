mod http;

pub use http::HttpRenderer;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::kind::AssetKind;

/// Why the rendering primitive rejected an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Status(u16),
    Network(String),
    Decode(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Network(reason) => write!(f, "network: {}", reason),
            Self::Decode(reason) => write!(f, "decode: {}", reason),
        }
    }
}

/// Result of one attempt to fetch and decode an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Success,
    Failure(FailureReason),
}

/// Adapter around whatever actually fetches and decodes assets.
///
/// Implementations report every failure as a [`RenderOutcome::Failure`]; they
/// never enforce the load timeout themselves.
#[async_trait]
pub trait AssetRenderer: Send + Sync {
    async fn render(&self, url: &str, kind: AssetKind) -> RenderOutcome;
}
