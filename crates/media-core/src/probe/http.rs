use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::warn;

use super::{AssetProbe, ProbeError, ProbeResponse};

/// HEAD-request probe backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(Self::build_client(timeout), timeout)
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        Self::new(config.probe_timeout)
    }

    pub fn from_config_with_client(config: &crate::config::EngineConfig, client: Client) -> Self {
        Self::with_client(client, config.probe_timeout)
    }

    pub fn build_client(timeout: Duration) -> Client {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(20)
            .gzip(true)
            .build()
            .expect("Failed to build HTTP client")
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl AssetProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let response = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!(url, "Asset probe timed out");
                    ProbeError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    warn!(url, error = %e, "Asset probe network error");
                    ProbeError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_type,
        })
    }
}
