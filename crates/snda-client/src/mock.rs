//! In-memory storage service used by the client tests

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use parking_lot::Mutex;
use serde::Deserialize;
use snda_core::types::ByteRange;

use crate::error::{ClientError, ClientResult};
use crate::request::{StorageRequest, StorageResponse};
use crate::transport::Transport;
use crate::xml::decode_error;

struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, Bytes>,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    requests: usize,
}

type Matcher = Box<dyn Fn(&StorageRequest) -> bool + Send + Sync>;

struct Fault {
    matches: Matcher,
    error: ClientError,
    remaining: u32,
}

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<State>,
    faults: Mutex<Vec<Fault>>,
    delay: Duration,
}

fn service_error(status: u16, code: &str) -> ClientError {
    decode_error(
        status,
        &format!(
            "<Error><Code>{}</Code><Message>{}</Message><RequestId>mock</RequestId></Error>",
            code, code
        ),
    )
}

fn query<'a>(request: &'a StorageRequest, name: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Fail the next `times` requests accepted by `matches` with `error`.
    pub fn fail_when(
        &self,
        matches: impl Fn(&StorageRequest) -> bool + Send + Sync + 'static,
        error: ClientError,
        times: u32,
    ) {
        self.faults.lock().push(Fault {
            matches: Box::new(matches),
            error,
            remaining: times,
        });
    }

    /// Fail uploads of `part_number`
    pub fn fail_part(&self, part_number: u32, error: ClientError, times: u32) {
        let wanted = part_number.to_string();
        self.fail_when(
            move |r| r.method == Method::PUT && query(r, "partNumber") == Some(wanted.as_str()),
            error,
            times,
        );
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.data.clone())
    }

    pub fn pending_uploads(&self) -> usize {
        self.state.lock().uploads.len()
    }

    fn injected_fault(&self, request: &StorageRequest) -> Option<ClientError> {
        let mut faults = self.faults.lock();
        let fault = faults
            .iter_mut()
            .find(|f| f.remaining > 0 && (f.matches)(request))?;
        fault.remaining -= 1;
        Some(fault.error.clone())
    }

    fn handle(&self, request: &StorageRequest) -> ClientResult<StorageResponse> {
        let mut state = self.state.lock();
        state.requests += 1;

        let bucket = match &request.bucket {
            None => return Ok(list_buckets(&state)),
            Some(bucket) => bucket.clone(),
        };

        let Some(key) = request.key.clone() else {
            return bucket_request(&mut state, request, &bucket);
        };

        if !state.buckets.contains_key(&bucket) {
            return Err(service_error(404, "NoSuchBucket"));
        }

        if let Some(upload_id) = query(request, "uploadId") {
            return upload_request(&mut state, request, upload_id);
        }

        match request.method {
            Method::POST if query(request, "uploads").is_some() => {
                state.next_upload += 1;
                let upload_id = format!("upload-{}", state.next_upload);
                state.uploads.insert(
                    upload_id.clone(),
                    PendingUpload {
                        bucket: bucket.clone(),
                        key: key.clone(),
                        parts: BTreeMap::new(),
                    },
                );
                Ok(StorageResponse::new(200).with_body(format!(
                    "<InitiateMultipartUploadResult><Bucket>{}</Bucket><Key>{}</Key><UploadId>{}</UploadId></InitiateMultipartUploadResult>",
                    bucket, key, upload_id
                )))
            }
            Method::PUT => {
                let data = request.body.clone();
                let etag = snda_crypto::md5_hash(&data);
                state.buckets.entry(bucket).or_default().insert(
                    key,
                    StoredObject {
                        data,
                        content_type: request.headers.get("content-type").cloned(),
                    },
                );
                Ok(StorageResponse::new(200).with_header("etag", format!("\"{}\"", etag)))
            }
            Method::GET | Method::HEAD => {
                let object = state
                    .buckets
                    .get(&bucket)
                    .and_then(|objects| objects.get(&key))
                    .ok_or_else(|| service_error(404, "NoSuchKey"))?;

                let size = object.data.len() as u64;
                let mut response = StorageResponse::new(200)
                    .with_header("etag", format!("\"{}\"", snda_crypto::md5_hash(&object.data)))
                    .with_header("content-length", size.to_string());
                if let Some(ct) = &object.content_type {
                    response = response.with_header("content-type", ct.clone());
                }
                if request.method == Method::HEAD {
                    return Ok(response);
                }

                let body = match request.headers.get("range") {
                    Some(header) => {
                        let range = ByteRange::parse(header, size)
                            .map_err(|_| service_error(416, "InvalidRange"))?;
                        object.data.slice(range.start as usize..=range.end as usize)
                    }
                    None => object.data.clone(),
                };
                Ok(response.with_body(body))
            }
            Method::DELETE => {
                if let Some(objects) = state.buckets.get_mut(&bucket) {
                    objects.remove(&key);
                }
                Ok(StorageResponse::new(204))
            }
            _ => Err(service_error(400, "InvalidRequest")),
        }
    }
}

fn list_buckets(state: &State) -> StorageResponse {
    let buckets: String = state
        .buckets
        .keys()
        .map(|name| {
            format!(
                "<Bucket><Name>{}</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket>",
                name
            )
        })
        .collect();
    StorageResponse::new(200).with_body(format!(
        "<ListAllMyBucketsResult><Owner><ID>mock</ID><DisplayName>mock</DisplayName></Owner><Buckets>{}</Buckets></ListAllMyBucketsResult>",
        buckets
    ))
}

fn bucket_request(
    state: &mut State,
    request: &StorageRequest,
    bucket: &str,
) -> ClientResult<StorageResponse> {
    match request.method {
        Method::PUT => {
            if state.buckets.contains_key(bucket) {
                return Err(service_error(409, "BucketAlreadyExists"));
            }
            state.buckets.insert(bucket.to_string(), BTreeMap::new());
            Ok(StorageResponse::new(200))
        }
        Method::DELETE => match state.buckets.get(bucket) {
            None => Err(service_error(404, "NoSuchBucket")),
            Some(objects) if !objects.is_empty() => Err(service_error(409, "BucketNotEmpty")),
            Some(_) => {
                state.buckets.remove(bucket);
                Ok(StorageResponse::new(204))
            }
        },
        Method::GET => {
            let objects = state
                .buckets
                .get(bucket)
                .ok_or_else(|| service_error(404, "NoSuchBucket"))?;
            let prefix = query(request, "prefix").unwrap_or("");
            let contents: String = objects
                .iter()
                .filter(|(key, _)| key.starts_with(prefix))
                .map(|(key, object)| {
                    format!(
                        "<Contents><Key>{}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified><ETag>\"{}\"</ETag><Size>{}</Size></Contents>",
                        key,
                        snda_crypto::md5_hash(&object.data),
                        object.data.len()
                    )
                })
                .collect();
            Ok(StorageResponse::new(200).with_body(format!(
                "<ListBucketResult><Name>{}</Name><Prefix>{}</Prefix><MaxKeys>1000</MaxKeys><IsTruncated>false</IsTruncated>{}</ListBucketResult>",
                bucket, prefix, contents
            )))
        }
        _ => Err(service_error(400, "InvalidRequest")),
    }
}

fn upload_request(
    state: &mut State,
    request: &StorageRequest,
    upload_id: &str,
) -> ClientResult<StorageResponse> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct CompleteMultipartUpload {
        #[serde(rename = "Part", default)]
        parts: Vec<CompletedPart>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct CompletedPart {
        part_number: u32,
    }

    if !state.uploads.contains_key(upload_id) {
        return Err(service_error(404, "NoSuchUpload"));
    }

    match request.method {
        Method::PUT => {
            let part_number: u32 = query(request, "partNumber")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| service_error(400, "InvalidArgument"))?;
            let etag = snda_crypto::md5_hash(&request.body);
            if let Some(upload) = state.uploads.get_mut(upload_id) {
                upload.parts.insert(part_number, request.body.clone());
            }
            Ok(StorageResponse::new(200).with_header("etag", format!("\"{}\"", etag)))
        }
        Method::GET => {
            let parts: String = state.uploads[upload_id]
                .parts
                .iter()
                .map(|(n, data)| {
                    format!(
                        "<Part><PartNumber>{}</PartNumber><ETag>\"{}\"</ETag><Size>{}</Size></Part>",
                        n,
                        snda_crypto::md5_hash(data),
                        data.len()
                    )
                })
                .collect();
            Ok(StorageResponse::new(200).with_body(format!(
                "<ListPartsResult><UploadId>{}</UploadId><IsTruncated>false</IsTruncated>{}</ListPartsResult>",
                upload_id, parts
            )))
        }
        Method::POST => {
            let body = String::from_utf8_lossy(&request.body).to_string();
            let wanted: CompleteMultipartUpload = quick_xml::de::from_str(&body)
                .map_err(|_| service_error(400, "MalformedXML"))?;

            let Some(upload) = state.uploads.remove(upload_id) else {
                return Err(service_error(404, "NoSuchUpload"));
            };
            let mut data = Vec::new();
            for part in &wanted.parts {
                let bytes = upload
                    .parts
                    .get(&part.part_number)
                    .ok_or_else(|| service_error(400, "InvalidPart"))?;
                data.extend_from_slice(bytes);
            }

            let etags: Vec<String> = upload
                .parts
                .values()
                .map(|d| snda_crypto::md5_hash(d))
                .collect();
            let etag = snda_crypto::multipart_etag(&etags);
            state.buckets.entry(upload.bucket.clone()).or_default().insert(
                upload.key.clone(),
                StoredObject {
                    data: Bytes::from(data),
                    content_type: None,
                },
            );
            Ok(StorageResponse::new(200).with_body(format!(
                "<CompleteMultipartUploadResult><Location>/{}/{}</Location><Bucket>{}</Bucket><Key>{}</Key><ETag>\"{}\"</ETag></CompleteMultipartUploadResult>",
                upload.bucket, upload.key, upload.bucket, upload.key, etag
            )))
        }
        Method::DELETE => {
            state.uploads.remove(upload_id);
            Ok(StorageResponse::new(204))
        }
        _ => Err(service_error(400, "InvalidRequest")),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn invoke(&self, request: StorageRequest) -> ClientResult<StorageResponse> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.injected_fault(&request) {
            self.state.lock().requests += 1;
            return Err(error);
        }
        self.handle(&request)
    }
}
