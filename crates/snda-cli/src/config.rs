//! Profiles for the snda CLI
//!
//! Config file location: ~/.snda/config.toml
//!
//! Example config:
//! ```toml
//! [default]
//! endpoint = "http://localhost:9000"
//! access_key = "minioadmin"
//! secret_key = "minioadmin"
//! region = "us-east-1"
//!
//! [bulk]
//! endpoint = "storage.grandcloud.cn"
//! concurrency = 16
//! part_size = 16777216
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use snda_core::{ClientConfig, TransferSettings};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROFILE: &str = "default";

/// One named set of connection and transfer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: String,
    pub https: bool,
    /// Files at least this large are uploaded in parts
    pub multipart_threshold: u64,
    pub part_size: u64,
    /// Parts in flight at once
    pub concurrency: usize,
    pub max_attempts: u32,
    pub bytes_per_second: Option<u64>,
}

impl Default for Profile {
    fn default() -> Self {
        let transfer = TransferSettings::default();
        Self {
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: snda_core::DEFAULT_REGION.to_string(),
            https: false,
            multipart_threshold: transfer.multipart_threshold,
            part_size: transfer.part_size,
            concurrency: transfer.concurrency,
            max_attempts: transfer.max_attempts,
            bytes_per_second: None,
        }
    }
}

/// Configuration file with multiple profiles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub profiles: BTreeMap<String, Profile>,
}

impl ConfigFile {
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Profile {
    pub fn config_dir() -> Result<PathBuf> {
        let home = directories::BaseDirs::new()
            .context("Could not determine home directory")?
            .home_dir()
            .to_path_buf();

        Ok(home.join(".snda"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load a profile from the config file, then apply `SNDA_*` overrides
    pub fn load(name: Option<&str>) -> Result<Self> {
        let mut profile = Self::load_from(&Self::config_path()?, name)?;
        profile.apply_env();
        Ok(profile)
    }

    pub fn load_from(path: &Path, name: Option<&str>) -> Result<Self> {
        let name = name.unwrap_or(DEFAULT_PROFILE);
        Ok(ConfigFile::read(path)?
            .profiles
            .remove(name)
            .unwrap_or_default())
    }

    pub fn save_to(&self, path: &Path, name: Option<&str>) -> Result<()> {
        let mut file = ConfigFile::read(path)?;
        file.profiles
            .insert(name.unwrap_or(DEFAULT_PROFILE).to_string(), self.clone());
        file.write(path)
    }

    pub fn list_profiles() -> Result<Vec<String>> {
        Ok(ConfigFile::read(&Self::config_path()?)?
            .profiles
            .into_keys()
            .collect())
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("SNDA_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Ok(access_key) = std::env::var("SNDA_ACCESS_KEY") {
            self.access_key = Some(access_key);
        }
        if let Ok(secret_key) = std::env::var("SNDA_SECRET_KEY") {
            self.secret_key = Some(secret_key);
        }
        if let Ok(region) = std::env::var("SNDA_REGION") {
            self.region = region;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_none() {
            anyhow::bail!("Endpoint not configured. Set SNDA_ENDPOINT or use 'snda configure'");
        }
        if self.access_key.is_none() || self.secret_key.is_none() {
            anyhow::bail!(
                "Credentials not configured. Set SNDA_ACCESS_KEY and SNDA_SECRET_KEY or use 'snda configure'"
            );
        }
        Ok(())
    }

    /// Client configuration for this profile
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(endpoint) = &self.endpoint {
            config.connection.endpoint = endpoint.clone();
        }
        config.connection.region = self.region.clone();
        config.connection.https = self.https;
        config.connection.bytes_per_second = self.bytes_per_second;
        config.credentials.access_key = self.access_key.clone();
        config.credentials.secret_key = self.secret_key.clone();
        config.transfer.multipart_threshold = self.multipart_threshold;
        config.transfer.part_size = self.part_size;
        config.transfer.concurrency = self.concurrency;
        config.transfer.max_attempts = self.max_attempts;
        config
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match key {
            "endpoint" => self.endpoint.clone(),
            "access_key" => self.access_key.clone(),
            "secret_key" => self.secret_key.as_ref().map(|_| "***".to_string()),
            "region" => Some(self.region.clone()),
            "https" => Some(self.https.to_string()),
            "multipart_threshold" => Some(self.multipart_threshold.to_string()),
            "part_size" => Some(self.part_size.to_string()),
            "concurrency" => Some(self.concurrency.to_string()),
            "max_attempts" => Some(self.max_attempts.to_string()),
            "bytes_per_second" => self.bytes_per_second.map(|b| b.to_string()),
            _ => None,
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "endpoint" => self.endpoint = Some(value.to_string()),
            "access_key" => self.access_key = Some(value.to_string()),
            "secret_key" => self.secret_key = Some(value.to_string()),
            "region" => self.region = value.to_string(),
            "https" => self.https = value.parse()?,
            "multipart_threshold" => self.multipart_threshold = value.parse()?,
            "part_size" => self.part_size = value.parse()?,
            "concurrency" => self.concurrency = value.parse()?,
            "max_attempts" => self.max_attempts = value.parse()?,
            "bytes_per_second" => self.bytes_per_second = Some(value.parse()?),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "endpoint",
            "access_key",
            "secret_key",
            "region",
            "https",
            "multipart_threshold",
            "part_size",
            "concurrency",
            "max_attempts",
            "bytes_per_second",
        ]
    }
}
