//! Response document decoding and request body encoding

use quick_xml::de::from_str;
use serde::Deserialize;
use snda_core::types::{
    BucketInfo, ListBucketsResult, ListObjectsResult, MultipartCompleted, MultipartUpload,
    ObjectInfo, Owner, PartETag,
};
use snda_core::utils::{parse_etag, parse_s3_datetime, xml_escape};

use crate::error::{ClientError, ClientResult};

fn decode<'de, T: Deserialize<'de>>(body: &'de str) -> ClientResult<T> {
    from_str(body).map_err(ClientError::from)
}

fn timestamp(value: &str) -> ClientResult<chrono::DateTime<chrono::Utc>> {
    parse_s3_datetime(value)
        .ok_or_else(|| ClientError::Decode(format!("invalid timestamp: {}", value)))
}

/// Fields of an `<Error>` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorDocument {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub request_id: Option<String>,
    pub resource: Option<String>,
}

impl ErrorDocument {
    pub fn into_error(self) -> snda_core::Error {
        snda_core::Error::from_code(&self.code, self.message)
    }
}

/// Turn a non-2xx response into a [`ClientError::Service`]. Bodies that are
/// not error documents (HEAD responses, proxies) fall back to the status.
pub fn decode_error(status: u16, body: &str) -> ClientError {
    let (error, request_id) = match decode::<ErrorDocument>(body) {
        Ok(doc) if !doc.code.is_empty() => {
            let request_id = doc.request_id.clone();
            (doc.into_error(), request_id)
        }
        _ => (status_error(status), None),
    };

    ClientError::Service {
        status,
        error,
        request_id,
    }
}

fn status_error(status: u16) -> snda_core::Error {
    use snda_core::Error;
    match status {
        403 => Error::AccessDenied,
        404 => Error::NoSuchKey,
        409 => Error::BucketNotEmpty,
        416 => Error::InvalidRange("Range not satisfiable".into()),
        503 => Error::ServiceUnavailable,
        s if s >= 500 => Error::InternalError(format!("HTTP {}", s)),
        s => Error::Other {
            code: format!("Http{}", s),
            message: format!("unexpected HTTP status {}", s),
        },
    }
}

pub fn parse_list_buckets(body: &str) -> ClientResult<ListBucketsResult> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct ListAllMyBucketsResult {
        owner: Option<OwnerXml>,
        #[serde(default)]
        buckets: BucketsXml,
    }

    #[derive(Deserialize)]
    struct OwnerXml {
        #[serde(rename = "ID", default)]
        id: String,
        #[serde(rename = "DisplayName", default)]
        display_name: String,
    }

    #[derive(Default, Deserialize)]
    struct BucketsXml {
        #[serde(rename = "Bucket", default)]
        buckets: Vec<BucketXml>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct BucketXml {
        name: String,
        creation_date: String,
    }

    let result: ListAllMyBucketsResult = decode(body)?;
    let buckets = result
        .buckets
        .buckets
        .into_iter()
        .map(|b| -> ClientResult<BucketInfo> {
            Ok(BucketInfo {
                creation_date: timestamp(&b.creation_date)?,
                name: b.name,
            })
        })
        .collect::<ClientResult<Vec<_>>>()?;

    Ok(ListBucketsResult {
        owner: result
            .owner
            .map(|o| Owner {
                id: o.id,
                display_name: o.display_name,
            })
            .unwrap_or_default(),
        buckets,
    })
}

pub fn parse_list_objects(body: &str) -> ClientResult<ListObjectsResult> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct ListBucketResult {
        name: String,
        prefix: Option<String>,
        delimiter: Option<String>,
        next_marker: Option<String>,
        #[serde(default)]
        max_keys: u32,
        #[serde(default)]
        is_truncated: bool,
        #[serde(default)]
        contents: Vec<ContentsXml>,
        #[serde(default)]
        common_prefixes: Vec<PrefixXml>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct ContentsXml {
        key: String,
        last_modified: String,
        #[serde(rename = "ETag", default)]
        etag: String,
        #[serde(default)]
        size: u64,
        storage_class: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct PrefixXml {
        prefix: String,
    }

    let result: ListBucketResult = decode(body)?;
    let contents = result
        .contents
        .into_iter()
        .map(|c| -> ClientResult<ObjectInfo> {
            Ok(ObjectInfo {
                last_modified: timestamp(&c.last_modified)?,
                etag: parse_etag(&c.etag),
                size: c.size,
                storage_class: c.storage_class.unwrap_or_else(|| "STANDARD".to_string()),
                key: c.key,
            })
        })
        .collect::<ClientResult<Vec<_>>>()?;

    // Servers omit NextMarker without a delimiter; the last key takes its place.
    let next_marker = match result.next_marker.filter(|m| !m.is_empty()) {
        Some(marker) => Some(marker),
        None if result.is_truncated => contents.last().map(|o| o.key.clone()),
        None => None,
    };

    Ok(ListObjectsResult {
        name: result.name,
        prefix: result.prefix.filter(|p| !p.is_empty()),
        delimiter: result.delimiter.filter(|d| !d.is_empty()),
        max_keys: result.max_keys,
        is_truncated: result.is_truncated,
        contents,
        common_prefixes: result.common_prefixes.into_iter().map(|p| p.prefix).collect(),
        next_marker,
    })
}

pub fn parse_initiate_multipart(body: &str) -> ClientResult<MultipartUpload> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct InitiateMultipartUploadResult {
        bucket: String,
        key: String,
        upload_id: String,
    }

    let result: InitiateMultipartUploadResult = decode(body)?;
    if result.upload_id.is_empty() {
        return Err(ClientError::Decode("empty UploadId".into()));
    }
    Ok(MultipartUpload::new(result.bucket, result.key, result.upload_id))
}

pub fn parse_complete_multipart(body: &str) -> ClientResult<MultipartCompleted> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct CompleteMultipartUploadResult {
        location: Option<String>,
        bucket: String,
        key: String,
        #[serde(rename = "ETag")]
        etag: String,
    }

    // A 200 response may still carry an error document.
    if body.contains("<Error>") {
        return Err(decode_error(200, body));
    }

    let result: CompleteMultipartUploadResult = decode(body)?;
    Ok(MultipartCompleted {
        location: result.location,
        bucket: result.bucket,
        key: result.key,
        etag: parse_etag(&result.etag),
    })
}

/// Parts of an upload, with the marker of the next page if truncated
pub fn parse_list_parts(body: &str) -> ClientResult<(Vec<PartETag>, Option<u32>)> {
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct ListPartsResult {
        #[serde(default)]
        is_truncated: bool,
        next_part_number_marker: Option<u32>,
        #[serde(rename = "Part", default)]
        parts: Vec<PartXml>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct PartXml {
        part_number: u32,
        #[serde(rename = "ETag")]
        etag: String,
    }

    let result: ListPartsResult = decode(body)?;
    let parts = result
        .parts
        .into_iter()
        .map(|p| PartETag {
            part_number: p.part_number,
            etag: parse_etag(&p.etag),
        })
        .collect();

    let next = if result.is_truncated {
        result.next_part_number_marker
    } else {
        None
    };
    Ok((parts, next))
}

/// Body of CompleteMultipartUpload; parts must be in ascending order.
pub fn complete_multipart_body(parts: &[PartETag]) -> String {
    let mut xml = String::from("<CompleteMultipartUpload>");
    for part in parts {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>\"{}\"</ETag></Part>",
            part.part_number,
            xml_escape(&part.etag)
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Body of CreateBucket, only needed outside the default region
pub fn create_bucket_body(region: &str) -> String {
    format!(
        "<CreateBucketConfiguration><LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
        xml_escape(region)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_buckets() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner><ID>owner-1</ID><DisplayName>alice</DisplayName></Owner>
  <Buckets>
    <Bucket><Name>photos</Name><CreationDate>2011-02-10T08:12:33.000Z</CreationDate></Bucket>
    <Bucket><Name>logs</Name><CreationDate>2012-06-01T00:00:00.000Z</CreationDate></Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#;

        let result = parse_list_buckets(body).unwrap();
        assert_eq!(result.owner.id, "owner-1");
        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.buckets[1].name, "logs");
    }

    #[test]
    fn test_parse_empty_bucket_list() {
        let body = "<ListAllMyBucketsResult><Owner><ID>o</ID><DisplayName>o</DisplayName></Owner><Buckets></Buckets></ListAllMyBucketsResult>";
        assert!(parse_list_buckets(body).unwrap().buckets.is_empty());
    }

    #[test]
    fn test_parse_list_objects() {
        let body = r#"<ListBucketResult>
  <Name>photos</Name><Prefix>2024/</Prefix><Marker></Marker>
  <MaxKeys>2</MaxKeys><Delimiter>/</Delimiter><IsTruncated>true</IsTruncated>
  <Contents>
    <Key>2024/a.jpg</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified>
    <ETag>"d41d8cd98f00b204e9800998ecf8427e"</ETag><Size>1024</Size><StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>2024/b.jpg</Key><LastModified>2024-01-02T00:00:00.000Z</LastModified>
    <ETag>"abc"</ETag><Size>2048</Size>
  </Contents>
  <CommonPrefixes><Prefix>2024/raw/</Prefix></CommonPrefixes>
</ListBucketResult>"#;

        let result = parse_list_objects(body).unwrap();
        assert_eq!(result.name, "photos");
        assert_eq!(result.prefix.as_deref(), Some("2024/"));
        assert_eq!(result.contents.len(), 2);
        assert_eq!(result.contents[0].etag, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(result.contents[1].size, 2048);
        assert_eq!(result.common_prefixes, vec!["2024/raw/"]);
        assert_eq!(result.next_marker.as_deref(), Some("2024/b.jpg"));
    }

    #[test]
    fn test_parse_initiate_and_complete() {
        let upload = parse_initiate_multipart(
            "<InitiateMultipartUploadResult><Bucket>b</Bucket><Key>k</Key><UploadId>u-1</UploadId></InitiateMultipartUploadResult>",
        )
        .unwrap();
        assert_eq!(upload, MultipartUpload::new("b", "k", "u-1"));

        let done = parse_complete_multipart(
            "<CompleteMultipartUploadResult><Location>/b/k</Location><Bucket>b</Bucket><Key>k</Key><ETag>\"abc-2\"</ETag></CompleteMultipartUploadResult>",
        )
        .unwrap();
        assert_eq!(done.etag, "abc-2");
    }

    #[test]
    fn test_complete_with_embedded_error() {
        let err = parse_complete_multipart(
            "<Error><Code>InternalError</Code><Message>try again</Message><RequestId>r1</RequestId></Error>",
        )
        .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.service_code(), Some("InternalError"));
    }

    #[test]
    fn test_parse_list_parts() {
        let body = r#"<ListPartsResult>
  <Bucket>b</Bucket><Key>k</Key><UploadId>u</UploadId>
  <IsTruncated>true</IsTruncated><NextPartNumberMarker>2</NextPartNumberMarker>
  <Part><PartNumber>1</PartNumber><ETag>"e1"</ETag><Size>5242880</Size></Part>
  <Part><PartNumber>2</PartNumber><ETag>"e2"</ETag><Size>10</Size></Part>
</ListPartsResult>"#;

        let (parts, next) = parse_list_parts(body).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].etag, "e2");
        assert_eq!(next, Some(2));
    }

    #[test]
    fn test_decode_error_document() {
        let err = decode_error(
            403,
            "<Error><Code>AccessDenied</Code><Message>Access Denied</Message><RequestId>req-9</RequestId></Error>",
        );
        match err {
            ClientError::Service {
                status,
                error,
                request_id,
            } => {
                assert_eq!(status, 403);
                assert_eq!(error, snda_core::Error::AccessDenied);
                assert_eq!(request_id.as_deref(), Some("req-9"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_without_document() {
        assert_eq!(decode_error(404, "").service_code(), Some("NoSuchKey"));
        assert!(decode_error(502, "<html>bad gateway</html>").is_transient());
    }

    #[test]
    fn test_complete_body() {
        let body = complete_multipart_body(&[
            PartETag {
                part_number: 1,
                etag: "a".into(),
            },
            PartETag {
                part_number: 2,
                etag: "b".into(),
            },
        ]);
        assert_eq!(
            body,
            "<CompleteMultipartUpload><Part><PartNumber>1</PartNumber><ETag>\"a\"</ETag></Part>\
             <Part><PartNumber>2</PartNumber><ETag>\"b\"</ETag></Part></CompleteMultipartUpload>"
        );
    }
}
