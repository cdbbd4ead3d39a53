//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//!
//! [engine]
//! origin = "https://shop.example.com"
//! proxy_external_images = true
//! load_timeout_ms = 5000
//! probe_timeout_ms = 3000
//! auto_retry_limit = 1
//! retry_backoff_ms = 250
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use media_core::{EngineConfig, MAX_AUTO_RETRY_LIMIT, MAX_RETRY_BACKOFF};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

/// Engine overrides. Anything left out keeps the engine default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    pub origin: Option<String>,
    pub proxy_external_images: Option<bool>,
    pub load_timeout_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub auto_retry_limit: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut c = EngineConfig::default();
        if let Some(ref origin) = self.origin {
            c = c.with_origin(origin.as_str());
        }
        if let Some(v) = self.proxy_external_images {
            c = c.with_proxy_external_images(v);
        }
        if let Some(v) = self.load_timeout_ms {
            c = c.with_load_timeout(v);
        }
        if let Some(v) = self.probe_timeout_ms {
            c = c.with_probe_timeout(v);
        }
        if let Some(v) = self.request_timeout_ms {
            c = c.with_request_timeout(v);
        }
        if let Some(v) = self.auto_retry_limit {
            c = c.with_auto_retry_limit(v);
        }
        if let Some(v) = self.retry_backoff_ms {
            c = c.with_retry_backoff(v);
        }
        c
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(ref origin) = self.engine.origin {
            validate_origin(origin)?;
        }

        let timeouts = [
            ("load_timeout_ms", self.engine.load_timeout_ms),
            ("probe_timeout_ms", self.engine.probe_timeout_ms),
            ("request_timeout_ms", self.engine.request_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == Some(0) {
                return Err(format!("{} must be greater than zero", name));
            }
        }

        if let Some(limit) = self.engine.auto_retry_limit {
            if limit > MAX_AUTO_RETRY_LIMIT {
                return Err(format!(
                    "auto_retry_limit {} exceeds the maximum of {}",
                    limit, MAX_AUTO_RETRY_LIMIT
                ));
            }
        }
        if let Some(ms) = self.engine.retry_backoff_ms {
            if u128::from(ms) > MAX_RETRY_BACKOFF.as_millis() {
                return Err(format!(
                    "retry_backoff_ms {} exceeds the maximum of {}",
                    ms,
                    MAX_RETRY_BACKOFF.as_millis()
                ));
            }
        }

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}

/// Origin must be an absolute http(s) URL.
pub fn validate_origin(origin: &str) -> Result<(), String> {
    let parsed =
        url::Url::parse(origin).map_err(|e| format!("Invalid origin URL: {} ({})", origin, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("Origin must use http or https: {}", origin));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parse_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.log_format, "pretty");

        let engine = config.engine.to_engine_config();
        assert_eq!(engine.origin, "http://127.0.0.1:8000");
        assert_eq!(engine.load_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[server]
listen = "127.0.0.1:9090"
log_format = "json"

[engine]
origin = "https://shop.example.com/"
proxy_external_images = false
load_timeout_ms = 3000
probe_timeout_ms = 1500
request_timeout_ms = 8000
auto_retry_limit = 2
retry_backoff_ms = 250
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.listen.port(), 9090);
        assert_eq!(config.server.log_format, "json");

        let engine = config.engine.to_engine_config();
        assert_eq!(engine.origin, "https://shop.example.com");
        assert!(!engine.proxy_external_images);
        assert_eq!(engine.load_timeout, Duration::from_millis(3000));
        assert_eq!(engine.probe_timeout, Duration::from_millis(1500));
        assert_eq!(engine.request_timeout, Duration::from_millis(8000));
        assert_eq!(engine.auto_retry_limit, 2);
        assert_eq!(engine.retry_backoff, Duration::from_millis(250));
    }

    #[test]
    fn validate_rejects_bad_origin() {
        let toml = r#"
[engine]
origin = "not a url"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Invalid origin URL"), "{}", err);
    }

    #[test]
    fn validate_rejects_non_http_origin() {
        let toml = r#"
[engine]
origin = "ftp://files.example.com"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("http or https"), "{}", err);
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let toml = r#"
[engine]
probe_timeout_ms = 0
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("probe_timeout_ms"), "{}", err);
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let toml = r#"
[server]
log_format = "xml"
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("Invalid log_format"), "{}", err);
    }

    #[test]
    fn validate_rejects_unbounded_retries() {
        let toml = r#"
[engine]
auto_retry_limit = 4294967295
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("auto_retry_limit"), "{}", err);
    }

    #[test]
    fn validate_rejects_huge_backoff() {
        let toml = r#"
[engine]
retry_backoff_ms = 86400000
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.contains("retry_backoff_ms"), "{}", err);
    }
}
