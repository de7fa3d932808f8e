//! Storage client setup and `s3://` URI parsing

use crate::config::Profile;
use anyhow::{Context, Result};
use snda_client::{StorageService, ThreadedService};

/// Build a transfer-capable client from a profile
pub fn connect(profile: &Profile) -> Result<ThreadedService> {
    profile.validate()?;
    let config = profile.client_config();
    let service = StorageService::new(&config).context("Failed to create storage client")?;
    Ok(ThreadedService::new(service, config.transfer))
}

/// Bucket and optional key of an `s3://bucket/key` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: Option<String>,
}

impl S3Uri {
    pub fn parse(uri: &str) -> Result<Self> {
        let path = uri
            .strip_prefix("s3://")
            .with_context(|| format!("Invalid S3 URI: {}. Must start with s3://", uri))?;

        if path.is_empty() {
            return Ok(Self {
                bucket: String::new(),
                key: None,
            });
        }

        let (bucket, key) = match path.split_once('/') {
            Some((b, k)) => (b.to_string(), (!k.is_empty()).then(|| k.to_string())),
            None => (path.to_string(), None),
        };

        if bucket.is_empty() {
            anyhow::bail!("Invalid S3 URI: bucket name cannot be empty");
        }

        Ok(Self { bucket, key })
    }

    /// Accepts either `s3://bucket` or a bare bucket name
    pub fn bucket_name(arg: &str) -> Result<String> {
        let name = if arg.starts_with("s3://") {
            Self::parse(arg)?.bucket
        } else {
            arg.to_string()
        };
        if name.is_empty() {
            anyhow::bail!("Bucket name cannot be empty");
        }
        Ok(name)
    }

    /// No key, or a key ending in `/`
    pub fn is_prefix(&self) -> bool {
        self.key.as_ref().map_or(true, |k| k.ends_with('/'))
    }

    pub fn key_or_empty(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }
}

impl std::fmt::Display for S3Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(k) => write!(f, "s3://{}/{}", self.bucket, k),
            None => write!(f, "s3://{}", self.bucket),
        }
    }
}

pub fn is_s3_uri(path: &str) -> bool {
    path.starts_with("s3://")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Upload,
    Download,
    /// Both sides remote, not supported
    Remote,
    /// Both sides local, not supported
    Local,
}

impl TransferDirection {
    pub fn determine(source: &str, dest: &str) -> Self {
        match (is_s3_uri(source), is_s3_uri(dest)) {
            (false, true) => TransferDirection::Upload,
            (true, false) => TransferDirection::Download,
            (true, true) => TransferDirection::Remote,
            (false, false) => TransferDirection::Local,
        }
    }
}
