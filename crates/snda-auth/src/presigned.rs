//! Pre-signed URL generation
//!
//! The signature travels in the query string, so the URL can be handed to
//! a client holding no credentials.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use snda_core::utils::format_amz_date;
use snda_core::{Error, Result};
use tracing::debug;
use url::Url;

use crate::signature::{
    canonical_query, credential_scope, sign_canonical, uri_encode, RequestSigner, ALGORITHM,
};

/// Longest validity a pre-signed URL may have
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 3600);

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignedMethod {
    Get,
    Put,
    Head,
    Delete,
}

impl PresignedMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresignedMethod::Get => "GET",
            PresignedMethod::Put => "PUT",
            PresignedMethod::Head => "HEAD",
            PresignedMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for PresignedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub method: PresignedMethod,
    pub expires_at: DateTime<Utc>,
}

/// Pre-sign `path` (already including the bucket for path-style
/// addressing) on `base_url`.
pub fn generate_presigned_url(
    signer: &RequestSigner,
    method: PresignedMethod,
    base_url: &str,
    path: &str,
    expires_in: Duration,
) -> Result<PresignedUrl> {
    presign_at(signer, method, base_url, path, expires_in, Utc::now())
}

pub(crate) fn presign_at(
    signer: &RequestSigner,
    method: PresignedMethod,
    base_url: &str,
    path: &str,
    expires_in: Duration,
    now: DateTime<Utc>,
) -> Result<PresignedUrl> {
    if expires_in.is_zero() || expires_in > MAX_PRESIGN_EXPIRY {
        return Err(Error::InvalidArgument(format!(
            "expiry must be between 1 second and {} seconds",
            MAX_PRESIGN_EXPIRY.as_secs()
        )));
    }

    let host = host_of(base_url)?;
    let amz_date = format_amz_date(&now);
    let credential = format!(
        "{}/{}",
        signer.credentials().access_key(),
        credential_scope(&amz_date[..8], signer.region())
    );

    let params = vec![
        ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
        ("X-Amz-Credential".to_string(), credential),
        ("X-Amz-Date".to_string(), amz_date.clone()),
        ("X-Amz-Expires".to_string(), expires_in.as_secs().to_string()),
        ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
    ];
    let query = canonical_query(&params);
    let canonical_uri = uri_encode(path, false);

    let canonical_request = format!(
        "{}\n{}\n{}\nhost:{}\n\nhost\n{}",
        method, canonical_uri, query, host, UNSIGNED_PAYLOAD
    );
    debug!(%method, path, "pre-signing request");

    let signature = sign_canonical(
        signer.credentials().secret_key(),
        &amz_date,
        signer.region(),
        &canonical_request,
    );

    let expires_at = now
        + chrono::Duration::from_std(expires_in)
            .map_err(|e| Error::InvalidArgument(format!("expiry out of range: {}", e)))?;

    Ok(PresignedUrl {
        url: format!(
            "{}{}?{}&X-Amz-Signature={}",
            base_url.trim_end_matches('/'),
            canonical_uri,
            query,
            signature
        ),
        method,
        expires_at,
    })
}

/// `host[:port]` as sent in the `Host` header
fn host_of(base_url: &str) -> Result<String> {
    let url = Url::parse(base_url)
        .map_err(|e| Error::InvalidArgument(format!("invalid endpoint URL {}: {}", base_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidArgument(format!("no host in endpoint URL {}", base_url)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
