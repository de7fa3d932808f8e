//! Transport-level request and response values

use std::collections::BTreeMap;

use bytes::Bytes;
use http::Method;

/// One storage API call, before signing
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRequest {
    pub method: Method,
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub query: Vec<(String, String)>,
    /// Lowercase header names
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl StorageRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            bucket: None,
            key: None,
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn head() -> Self {
        Self::new(Method::HEAD)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn query_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.query(name, v),
            None => self,
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Path-style resource path: `/`, `/bucket` or `/bucket/key`
    pub fn path(&self) -> String {
        match (&self.bucket, &self.key) {
            (Some(bucket), Some(key)) => format!("/{}/{}", bucket, key),
            (Some(bucket), None) => format!("/{}", bucket),
            _ => "/".to_string(),
        }
    }

    /// Short description for logs
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StorageResponse {
    pub status: u16,
    /// Lowercase header names
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl StorageResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
