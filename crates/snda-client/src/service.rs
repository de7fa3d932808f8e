//! Single-request storage operations

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use snda_core::types::{
    validate_bucket_name, validate_key, ByteRange, ListBucketsResult, ListObjectsResult,
    MultipartCompleted, MultipartUpload, ObjectMetadata, PartETag,
};
use snda_core::utils::{parse_etag, parse_http_datetime};
use snda_core::{ClientConfig, DEFAULT_REGION, MAX_PARTS};
use snda_crypto::md5_base64;
use tracing::{debug, info};

use crate::error::{ClientError, ClientResult};
use crate::request::{StorageRequest, StorageResponse};
use crate::transport::{HttpTransport, Transport};
use crate::xml;

const USER_METADATA_PREFIX: &str = "x-amz-meta-";

/// Listing parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsOptions {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub marker: Option<String>,
    pub max_keys: Option<u32>,
}

impl ListObjectsOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }
}

/// Object body with its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct GetObjectOutput {
    pub metadata: ObjectMetadata,
    pub body: Bytes,
}

/// Bucket and object operations, one request each
#[derive(Clone)]
pub struct StorageService {
    transport: Arc<dyn Transport>,
    region: String,
}

impl StorageService {
    /// Service over the default HTTP transport
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.connection.region.clone(),
        ))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, region: impl Into<String>) -> Self {
        Self {
            transport,
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    async fn send(&self, request: StorageRequest) -> ClientResult<StorageResponse> {
        self.transport.invoke(request).await
    }

    pub async fn list_buckets(&self) -> ClientResult<ListBucketsResult> {
        let response = self.send(StorageRequest::get()).await?;
        xml::parse_list_buckets(&String::from_utf8_lossy(&response.body))
    }

    pub async fn create_bucket(&self, bucket: &str) -> ClientResult<()> {
        validate_bucket_name(bucket)?;
        let mut request = StorageRequest::put().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.body(xml::create_bucket_body(&self.region));
        }

        self.send(request).await?;
        info!(bucket, "bucket created");
        Ok(())
    }

    pub async fn delete_bucket(&self, bucket: &str) -> ClientResult<()> {
        self.send(StorageRequest::delete().bucket(bucket)).await?;
        info!(bucket, "bucket deleted");
        Ok(())
    }

    pub async fn list_objects(
        &self,
        bucket: &str,
        options: &ListObjectsOptions,
    ) -> ClientResult<ListObjectsResult> {
        let request = StorageRequest::get()
            .bucket(bucket)
            .query_opt("prefix", options.prefix.clone())
            .query_opt("delimiter", options.delimiter.clone())
            .query_opt("marker", options.marker.clone())
            .query_opt("max-keys", options.max_keys.map(|n| n.to_string()));

        let response = self.send(request).await?;
        xml::parse_list_objects(&String::from_utf8_lossy(&response.body))
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> ClientResult<ObjectMetadata> {
        let response = self
            .send(StorageRequest::head().bucket(bucket).key(key))
            .await?;
        Ok(metadata_from(&response))
    }

    /// Whole object, or only `range` of it
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ClientResult<GetObjectOutput> {
        let mut request = StorageRequest::get().bucket(bucket).key(key);
        if let Some(range) = range {
            request = request.header("range", range.to_header());
        }

        let response = self.send(request).await?;
        let mut metadata = metadata_from(&response);
        metadata.content_length = response.body.len() as u64;
        Ok(GetObjectOutput {
            metadata,
            body: response.body,
        })
    }

    /// Single-request upload, returns the ETag
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> ClientResult<String> {
        validate_key(key)?;
        let mut request = StorageRequest::put()
            .bucket(bucket)
            .key(key)
            .header("content-md5", md5_base64(&body));
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        let response = self.send(request.body(body)).await?;
        etag_of(&response)
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> ClientResult<()> {
        self.send(StorageRequest::delete().bucket(bucket).key(key))
            .await?;
        debug!(bucket, key, "object deleted");
        Ok(())
    }

    pub async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> ClientResult<MultipartUpload> {
        validate_key(key)?;
        let mut request = StorageRequest::post()
            .bucket(bucket)
            .key(key)
            .query("uploads", "");
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        let response = self.send(request).await?;
        let upload = xml::parse_initiate_multipart(&String::from_utf8_lossy(&response.body))?;
        debug!(bucket, key, upload_id = %upload.upload_id, "multipart upload initiated");
        Ok(upload)
    }

    pub async fn upload_part(
        &self,
        upload: &MultipartUpload,
        part_number: u32,
        body: Bytes,
    ) -> ClientResult<PartETag> {
        if part_number == 0 || part_number > MAX_PARTS {
            return Err(snda_core::Error::InvalidArgument(format!(
                "part number must be between 1 and {}",
                MAX_PARTS
            ))
            .into());
        }

        let request = StorageRequest::put()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .query("partNumber", part_number.to_string())
            .query("uploadId", &upload.upload_id)
            .header("content-md5", md5_base64(&body))
            .body(body);

        let response = self.send(request).await?;
        Ok(PartETag {
            part_number,
            etag: etag_of(&response)?,
        })
    }

    /// Every part uploaded so far, following pagination
    pub async fn list_parts(&self, upload: &MultipartUpload) -> ClientResult<Vec<PartETag>> {
        let mut parts = Vec::new();
        let mut marker: Option<u32> = None;

        loop {
            let request = StorageRequest::get()
                .bucket(&upload.bucket)
                .key(&upload.key)
                .query("uploadId", &upload.upload_id)
                .query_opt("part-number-marker", marker.map(|m| m.to_string()));

            let response = self.send(request).await?;
            let (page, next) = xml::parse_list_parts(&String::from_utf8_lossy(&response.body))?;
            parts.extend(page);

            match next {
                Some(n) if Some(n) != marker => marker = Some(n),
                _ => break,
            }
        }

        Ok(parts)
    }

    /// Parts may be given in any order; they are sent sorted.
    pub async fn complete_multipart_upload(
        &self,
        upload: &MultipartUpload,
        parts: &[PartETag],
    ) -> ClientResult<MultipartCompleted> {
        if parts.is_empty() {
            return Err(snda_core::Error::InvalidPart("no parts to complete".into()).into());
        }
        let mut sorted = parts.to_vec();
        sorted.sort_by_key(|p| p.part_number);

        let request = StorageRequest::post()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .query("uploadId", &upload.upload_id)
            .header("content-type", "application/xml")
            .body(xml::complete_multipart_body(&sorted));

        let response = self.send(request).await?;
        let completed = xml::parse_complete_multipart(&String::from_utf8_lossy(&response.body))?;
        info!(
            bucket = %upload.bucket,
            key = %upload.key,
            parts = sorted.len(),
            "multipart upload completed"
        );
        Ok(completed)
    }

    pub async fn abort_multipart_upload(&self, upload: &MultipartUpload) -> ClientResult<()> {
        let request = StorageRequest::delete()
            .bucket(&upload.bucket)
            .key(&upload.key)
            .query("uploadId", &upload.upload_id);

        self.send(request).await?;
        info!(upload_id = %upload.upload_id, "multipart upload aborted");
        Ok(())
    }
}

fn etag_of(response: &StorageResponse) -> ClientResult<String> {
    response
        .header("etag")
        .map(parse_etag)
        .ok_or_else(|| ClientError::Decode("response has no ETag header".into()))
}

fn metadata_from(response: &StorageResponse) -> ObjectMetadata {
    let user_metadata: BTreeMap<String, String> = response
        .headers
        .iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(USER_METADATA_PREFIX)
                .map(|n| (n.to_string(), value.clone()))
        })
        .collect();

    ObjectMetadata {
        content_length: response
            .header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        content_type: response.header("content-type").map(String::from),
        etag: response.header("etag").map(parse_etag),
        last_modified: response.header("last-modified").and_then(parse_http_datetime),
        user_metadata,
    }
}
