//! HTTP transport
//!
//! A [`Transport`] turns a [`StorageRequest`] into a [`StorageResponse`].
//! It owns connection pooling, timeouts, signing and rate limiting, and is
//! shared by every worker of a transfer.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use snda_auth::{uri_encode, Credentials, RequestSigner};
use snda_core::ClientConfig;
use snda_crypto::{sha256_hash, EMPTY_SHA256};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::limiter::BandwidthLimiter;
use crate::request::{StorageRequest, StorageResponse};
use crate::xml::decode_error;

/// Sends storage requests. Implementations must be safe to call from many
/// tasks at once.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Only 2xx responses are returned as `Ok`; anything else becomes a
    /// [`ClientError::Service`].
    async fn invoke(&self, request: StorageRequest) -> ClientResult<StorageResponse>;
}

/// Default transport over `reqwest`
pub struct HttpTransport {
    client: Client,
    base_url: String,
    host: String,
    signer: Option<RequestSigner>,
    limiter: Option<BandwidthLimiter>,
    /// One permit per open request, `max_total` in all
    connections: Arc<Semaphore>,
}

impl HttpTransport {
    /// Build from client configuration. Requests are signed when both keys
    /// are configured and sent anonymously otherwise.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let connection = &config.connection;

        let client = ClientBuilder::new()
            .timeout(connection.socket_timeout())
            .connect_timeout(connection.connect_timeout())
            .pool_max_idle_per_host(connection.max_per_route)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        let base_url = config.base_url();
        let host = host_header(&base_url)?;

        let signer = match Credentials::from_config(&config.credentials) {
            Ok(credentials) => Some(RequestSigner::new(credentials, connection.region.clone())),
            Err(_) => {
                warn!("no credentials configured, requests will be anonymous");
                None
            }
        };

        debug!(
            endpoint = %base_url,
            max_per_route = connection.max_per_route,
            max_total = connection.max_total,
            "http transport ready"
        );

        Ok(Self {
            client,
            base_url,
            host,
            signer,
            limiter: connection.bytes_per_second.and_then(BandwidthLimiter::new),
            connections: Arc::new(Semaphore::new(connection.max_total)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn signer(&self) -> Option<&RequestSigner> {
        self.signer.as_ref()
    }

    /// Requests that could start right now without waiting for a slot
    pub fn available_connections(&self) -> usize {
        self.connections.available_permits()
    }

    fn url_for(&self, request: &StorageRequest) -> String {
        let mut url = format!("{}{}", self.base_url, uri_encode(&request.path(), false));
        if !request.query.is_empty() {
            let query: Vec<String> = request
                .query
                .iter()
                .map(|(k, v)| {
                    if v.is_empty() {
                        uri_encode(k, true)
                    } else {
                        format!("{}={}", uri_encode(k, true), uri_encode(v, true))
                    }
                })
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    fn signed_headers(&self, request: &StorageRequest) -> BTreeMap<String, String> {
        let mut headers = request.headers.clone();
        headers.insert("host".to_string(), self.host.clone());

        if let Some(signer) = &self.signer {
            let payload_hash = if request.body.is_empty() {
                EMPTY_SHA256.to_string()
            } else {
                sha256_hash(&request.body)
            };
            signer.sign(
                request.method.as_str(),
                &request.path(),
                &request.query,
                &mut headers,
                &payload_hash,
            );
        }

        // reqwest sets Host itself from the URL.
        headers.remove("host");
        headers
    }

    /// Wait for upload bandwidth, then sign. Signing last keeps `x-amz-date`
    /// close to the moment the request leaves.
    async fn throttled_headers(&self, request: &StorageRequest) -> BTreeMap<String, String> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire(request.body.len() as u64).await;
        }
        self.signed_headers(request)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, request: StorageRequest) -> ClientResult<StorageResponse> {
        let url = self.url_for(&request);
        let started = Instant::now();

        let permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| ClientError::Transport("connection pool closed".into()))?;
        let headers = self.throttled_headers(&request).await;

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.body(request.body.clone()).send().await?;

        let status = response.status().as_u16();
        let response_headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;
        drop(permit);

        if let Some(limiter) = &self.limiter {
            limiter.acquire(body.len() as u64).await;
        }

        debug!(
            request = %request.describe(),
            status,
            sent = request.body.len(),
            received = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "storage request"
        );

        if !(200..300).contains(&status) {
            return Err(decode_error(status, &String::from_utf8_lossy(&body)));
        }

        Ok(StorageResponse {
            status,
            headers: response_headers,
            body,
        })
    }
}

/// `host[:port]` of the endpoint
fn host_header(base_url: &str) -> ClientResult<String> {
    let url = Url::parse(base_url).map_err(|e| {
        ClientError::Invalid(snda_core::Error::Config(format!(
            "invalid endpoint {}: {}",
            base_url, e
        )))
    })?;
    let host = url.host_str().ok_or_else(|| {
        ClientError::Invalid(snda_core::Error::Config(format!(
            "no host in endpoint {}",
            base_url
        )))
    })?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use snda_core::config::CredentialsConfig;

    fn config(endpoint: &str, signed: bool) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.connection.endpoint = endpoint.to_string();
        if signed {
            config.credentials = CredentialsConfig {
                access_key: Some("AKID".into()),
                secret_key: Some("secret".into()),
            };
        }
        config
    }

    #[test]
    fn test_url_building() {
        let transport = HttpTransport::new(&config("localhost:9000", false)).unwrap();
        let request = StorageRequest::put()
            .bucket("b")
            .key("dir/a b.txt")
            .query("partNumber", "2")
            .query("uploadId", "x/y");

        assert_eq!(
            transport.url_for(&request),
            "http://localhost:9000/b/dir/a%20b.txt?partNumber=2&uploadId=x%2Fy"
        );
        assert_eq!(
            transport.url_for(&StorageRequest::post().bucket("b").key("k").query("uploads", "")),
            "http://localhost:9000/b/k?uploads"
        );
    }

    #[test]
    fn test_signed_headers() {
        let transport = HttpTransport::new(&config("http://127.0.0.1:9000", true)).unwrap();
        let request = StorageRequest::put().bucket("b").key("k").body("hello");
        let headers = transport.signed_headers(&request);

        assert!(headers["authorization"].starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
        assert!(headers["authorization"].contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
        assert_eq!(headers["x-amz-content-sha256"], sha256_hash(b"hello"));
        assert!(!headers.contains_key("host"));
    }

    #[test]
    fn test_anonymous_requests_are_unsigned() {
        let transport = HttpTransport::new(&config("localhost:9000", false)).unwrap();
        assert!(transport.signer().is_none());
        let headers = transport.signed_headers(&StorageRequest::get());
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn test_signing_happens_after_throttling() {
        let mut config = config("http://127.0.0.1:9000", true);
        config.connection.bytes_per_second = Some(100);
        let transport = HttpTransport::new(&config).unwrap();

        // Drain the first second's allowance.
        let first = StorageRequest::put().bucket("b").key("k").body(vec![0u8; 100]);
        transport.throttled_headers(&first).await;

        let before = chrono::Utc::now();
        let second = StorageRequest::put().bucket("b").key("k").body(vec![0u8; 200]);
        let headers = transport.throttled_headers(&second).await;

        let signed_at =
            chrono::NaiveDateTime::parse_from_str(&headers["x-amz-date"], "%Y%m%dT%H%M%SZ")
                .unwrap()
                .and_utc();
        assert!(
            signed_at >= before + chrono::Duration::seconds(1),
            "signed at {} although the wait started at {}",
            signed_at,
            before
        );
    }

    #[tokio::test]
    async fn test_requests_wait_for_a_connection_slot() {
        // Nothing listens on port 1, so a request that gets through fails fast.
        let mut config = config("http://127.0.0.1:1", false);
        config.connection.max_total = 2;
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.available_connections(), 2);

        let held = Arc::clone(&transport.connections)
            .acquire_many_owned(2)
            .await
            .unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_millis(200),
            transport.invoke(StorageRequest::get()),
        )
        .await;
        assert!(blocked.is_err(), "request ran without a free slot");

        drop(held);
        let result = transport.invoke(StorageRequest::get()).await;
        assert!(matches!(result, Err(ClientError::Transport(_)) | Err(ClientError::Timeout(_))));
        assert_eq!(transport.available_connections(), 2);
    }

    #[test]
    fn test_host_header_keeps_port() {
        assert_eq!(host_header("http://localhost:9000").unwrap(), "localhost:9000");
        assert_eq!(host_header("https://storage.example.com").unwrap(), "storage.example.com");
        assert!(host_header("not a url").is_err());
    }
}
