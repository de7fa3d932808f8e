//! AWS Signature V4 request signing

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use snda_core::utils::format_amz_date;
use snda_core::{Error, Result};
use snda_crypto::{hmac_sha256, sha256_hash};
use tracing::trace;

use crate::credentials::Credentials;

pub(crate) const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub(crate) const SERVICE: &str = "s3";

/// RFC 3986 unreserved characters stay as they are
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode for a canonical request. Slashes are kept when encoding a
/// path.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let encoded = utf8_percent_encode(input, UNRESERVED).to_string();
    if encode_slash {
        encoded
    } else {
        encoded.replace("%2F", "/")
    }
}

pub(crate) fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    encoded.sort();

    encoded
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn credential_scope(date_stamp: &str, region: &str) -> String {
    format!("{}/{}/{}/aws4_request", date_stamp, region, SERVICE)
}

/// Hex signature of `canonical_request` made at `amz_date`
pub(crate) fn sign_canonical(
    secret_key: &str,
    amz_date: &str,
    region: &str,
    canonical_request: &str,
) -> String {
    let date_stamp = &amz_date[..8];
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope(date_stamp, region),
        sha256_hash(canonical_request.as_bytes())
    );
    trace!("string to sign:\n{}", string_to_sign);

    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
    let k_signing = hmac_sha256(&k_service, b"aws4_request");
    hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes()))
}

/// Signs requests in the `Authorization` header
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
}

impl RequestSigner {
    pub fn new(credentials: Credentials, region: impl Into<String>) -> Self {
        Self {
            credentials,
            region: region.into(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn sign(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        headers: &mut BTreeMap<String, String>,
        payload_hash: &str,
    ) -> String {
        self.sign_at(method, path, query, headers, payload_hash, Utc::now())
    }

    /// Add `x-amz-date`, `x-amz-content-sha256` and `authorization` to
    /// `headers` and return the authorization value.
    ///
    /// Header names must be lowercase. Every header present is signed, so
    /// `host` has to be in the map already.
    pub fn sign_at(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        headers: &mut BTreeMap<String, String>,
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> String {
        let amz_date = format_amz_date(&now);
        headers.remove("authorization");
        headers.insert("x-amz-date".to_string(), amz_date.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.to_string());

        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();
        let canonical_uri = if path.is_empty() {
            "/".to_string()
        } else {
            uri_encode(path, false)
        };

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            canonical_uri,
            canonical_query(query),
            canonical_headers,
            signed_headers,
            payload_hash
        );
        trace!("canonical request:\n{}", canonical_request);

        let signature = sign_canonical(
            self.credentials.secret_key(),
            &amz_date,
            &self.region,
            &canonical_request,
        );
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.credentials.access_key(),
            credential_scope(&amz_date[..8], &self.region),
            signed_headers,
            signature
        );
        headers.insert("authorization".to_string(), authorization.clone());
        authorization
    }
}

/// Fields of a signed `Authorization` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureV4 {
    pub access_key: String,
    pub date: NaiveDate,
    pub region: String,
    pub service: String,
    pub signed_headers: Vec<String>,
    pub signature: String,
}

impl SignatureV4 {
    /// Parse `AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...`
    pub fn parse(header: &str) -> Result<Self> {
        let invalid = |what: &str| Error::InvalidRequest(format!("authorization header: {}", what));

        let fields = header
            .strip_prefix(ALGORITHM)
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or_else(|| invalid("unsupported algorithm"))?;

        let mut credential = None;
        let mut signed_headers = None;
        let mut signature = None;
        for field in fields.split(',').map(str::trim) {
            match field.split_once('=') {
                Some(("Credential", v)) => credential = Some(v),
                Some(("SignedHeaders", v)) => signed_headers = Some(v),
                Some(("Signature", v)) => signature = Some(v),
                _ => {}
            }
        }

        let credential = credential.ok_or_else(|| invalid("missing Credential"))?;
        let scope: Vec<&str> = credential.split('/').collect();
        let [access_key, date, region, service, "aws4_request"] = scope[..] else {
            return Err(invalid("malformed credential scope"));
        };
        let date =
            NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid("malformed date"))?;

        Ok(Self {
            access_key: access_key.to_string(),
            date,
            region: region.to_string(),
            service: service.to_string(),
            signed_headers: signed_headers
                .ok_or_else(|| invalid("missing SignedHeaders"))?
                .split(';')
                .map(String::from)
                .collect(),
            signature: signature
                .ok_or_else(|| invalid("missing Signature"))?
                .to_string(),
        })
    }
}
