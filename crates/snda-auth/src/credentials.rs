//! Access key material

use std::fmt;

use snda_core::config::CredentialsConfig;
use snda_core::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Both keys must be present and non-empty.
    pub fn from_config(config: &CredentialsConfig) -> Result<Self> {
        match (&config.access_key, &config.secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
                Ok(Self::new(access.as_str(), secret.as_str()))
            }
            _ => Err(Error::Config(
                "access_key and secret_key must both be set".into(),
            )),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"********")
            .finish()
    }
}
