use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{AssetRenderer, FailureReason, RenderOutcome};
use crate::kind::AssetKind;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Renderer that downloads the asset and checks that it decodes.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(crate::probe::HttpProbe::build_client(timeout))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        Self::new(config.request_timeout)
    }
}

impl Default for HttpRenderer {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Check that `body` renders as `kind`.
///
/// Images go through the `image` decoders, with SVG accepted as-is. The only
/// document format rendered is PDF: Word, spreadsheet, presentation and text
/// files classify as documents but fail here, and the probe then settles
/// them as `InvalidFormat` (or `Unknown` when the mime is not a document mime).
fn decode(body: &[u8], kind: AssetKind) -> Result<(), FailureReason> {
    if kind.renders_as_image() {
        if is_svg(body) {
            return Ok(());
        }
        image::load_from_memory(body)
            .map(|_| ())
            .map_err(|e| FailureReason::Decode(e.to_string()))
    } else if body.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(FailureReason::Decode(
            "missing PDF header; only PDF documents render".into(),
        ))
    }
}

fn is_svg(body: &[u8]) -> bool {
    let head = &body[..body.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && trimmed.contains("<svg"))
}

#[async_trait]
impl AssetRenderer for HttpRenderer {
    async fn render(&self, url: &str, kind: AssetKind) -> RenderOutcome {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return RenderOutcome::Failure(FailureReason::Network(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url, status = status.as_u16(), "Asset fetch returned error status");
            return RenderOutcome::Failure(FailureReason::Status(status.as_u16()));
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return RenderOutcome::Failure(FailureReason::Network(e.to_string())),
        };

        match decode(&body, kind) {
            Ok(()) => RenderOutcome::Success,
            Err(reason) => {
                debug!(url, %kind, %reason, "Asset failed to decode");
                RenderOutcome::Failure(reason)
            }
        }
    }
}
