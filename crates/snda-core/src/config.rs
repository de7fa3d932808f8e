//! Configuration for the storage client

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub transfer: TransferSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("SNDA_ENDPOINT") {
            config.connection.endpoint = endpoint;
        }
        if let Ok(region) = std::env::var("SNDA_REGION") {
            config.connection.region = region;
        }
        if let Ok(https) = std::env::var("SNDA_HTTPS") {
            config.connection.https = https != "false";
        }
        if let Ok(rate) = std::env::var("SNDA_BYTES_PER_SECOND") {
            if let Ok(r) = rate.parse() {
                config.connection.bytes_per_second = Some(r);
            }
        }
        if let Ok(key) = std::env::var("SNDA_ACCESS_KEY") {
            config.credentials.access_key = Some(key);
        }
        if let Ok(secret) = std::env::var("SNDA_SECRET_KEY") {
            config.credentials.secret_key = Some(secret);
        }
        if let Ok(concurrency) = std::env::var("SNDA_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                config.transfer.concurrency = c;
            }
        }
        if let Ok(level) = std::env::var("SNDA_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.connection.endpoint.is_empty() {
            return Err(crate::Error::Config("endpoint must not be empty".into()));
        }
        if self.connection.max_per_route == 0 || self.connection.max_total == 0 {
            return Err(crate::Error::Config(
                "connection pool sizes must be at least 1".into(),
            ));
        }
        if self.transfer.concurrency == 0 {
            return Err(crate::Error::Config(
                "transfer concurrency must be at least 1".into(),
            ));
        }
        if self.transfer.max_attempts == 0 {
            return Err(crate::Error::Config(
                "transfer max_attempts must be at least 1".into(),
            ));
        }
        if self.connection.bytes_per_second == Some(0) {
            return Err(crate::Error::Config(
                "bytes_per_second must be positive when set".into(),
            ));
        }
        Ok(())
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> String {
        let endpoint = self.connection.endpoint.trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if self.connection.https {
            format!("https://{}", endpoint)
        } else {
            format!("http://{}", endpoint)
        }
    }
}

/// HTTP connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub endpoint: String,
    pub region: String,
    pub https: bool,
    /// Path-style addressing (`endpoint/bucket/key`)
    pub path_style: bool,
    pub connect_timeout_ms: u64,
    /// Per-request socket timeout; also bounds how long a cancelled
    /// transfer waits for its in-flight parts.
    pub socket_timeout_ms: u64,
    /// Idle connections kept per host
    pub max_per_route: usize,
    /// Requests open at once across the whole client
    pub max_total: usize,
    /// Byte-level transfer rate cap shared by all requests
    pub bytes_per_second: Option<u64>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::DEFAULT_ENDPOINT.to_string(),
            region: crate::DEFAULT_REGION.to_string(),
            https: false,
            path_style: true,
            connect_timeout_ms: 10_000,
            socket_timeout_ms: 60_000,
            max_per_route: 32,
            max_total: 128,
            bytes_per_second: None,
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Multipart transfer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Parts in flight at once
    pub concurrency: usize,
    /// Objects at least this large go through multipart upload
    pub multipart_threshold: u64,
    pub part_size: u64,
    /// Attempts per part before an ignorable failure abandons it
    pub max_attempts: u32,
    /// Minimum spacing of progress events
    pub progress_interval_ms: u64,
    /// Base delay before a retried part runs, doubled on every attempt
    pub retry_base_delay_ms: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            multipart_threshold: 16 * 1024 * 1024,
            part_size: 8 * 1024 * 1024,
            max_attempts: 3,
            progress_interval_ms: 500,
            retry_base_delay_ms: 200,
        }
    }
}

impl TransferSettings {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_connection_limits() {
        let config = ClientConfig::default();
        assert_eq!(config.connection.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.connection.socket_timeout(), Duration::from_secs(60));
        assert_eq!(config.connection.max_per_route, 32);
        assert_eq!(config.connection.max_total, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = ClientConfig::from_toml(
            r#"
            [connection]
            endpoint = "localhost:9000"
            region = "cn-north-1"
            https = false
            path_style = true
            connect_timeout_ms = 500
            socket_timeout_ms = 1000
            max_per_route = 4
            max_total = 8

            [transfer]
            concurrency = 2
            multipart_threshold = 10
            part_size = 5242880
            max_attempts = 5
            progress_interval_ms = 0
            retry_base_delay_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.region, "cn-north-1");
        assert_eq!(config.transfer.concurrency, 2);
        assert_eq!(config.transfer.max_attempts, 5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.base_url(), "http://localhost:9000");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = ClientConfig::default();
        config.transfer.concurrency = 0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\nformat = \"json\"\n").unwrap();

        let config = ClientConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.connection.max_total, 128);
    }

    #[test]
    fn test_base_url_scheme() {
        let mut config = ClientConfig::default();
        config.connection.https = true;
        assert!(config.base_url().starts_with("https://"));
        config.connection.endpoint = "http://127.0.0.1:9000/".into();
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }
}
