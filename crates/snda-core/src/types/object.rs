//! Object types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
    pub size: u64,
    pub storage_class: String,
}

/// Metadata returned by HEAD and GET
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// `x-amz-meta-*` headers with the prefix stripped
    pub user_metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListObjectsResult {
    pub name: String,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub max_keys: u32,
    pub is_truncated: bool,
    pub contents: Vec<ObjectInfo>,
    pub common_prefixes: Vec<String>,
    pub next_marker: Option<String>,
}

/// Inclusive byte range of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Range covering `length` bytes from `offset`. `length` must be non-zero.
    pub fn new(offset: u64, length: u64) -> Self {
        debug_assert!(length > 0, "empty byte range");
        Self {
            start: offset,
            end: offset + length - 1,
        }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// Parse a `Range` header and resolve it against an object of `size` bytes.
    pub fn parse(header: &str, size: u64) -> Result<Self, crate::Error> {
        let range_str = header
            .strip_prefix("bytes=")
            .ok_or_else(|| crate::Error::InvalidRange("Invalid range format".into()))?;

        let (start, end) = range_str
            .split_once('-')
            .ok_or_else(|| crate::Error::InvalidRange("Invalid range format".into()))?;

        let parse = |s: &str, what: &str| {
            s.parse::<u64>()
                .map_err(|_| crate::Error::InvalidRange(format!("Invalid range {}", what)))
        };

        if size == 0 {
            return Err(crate::Error::InvalidRange("Range not satisfiable".into()));
        }

        match (start.is_empty(), end.is_empty()) {
            (false, false) => {
                let (start, end) = (parse(start, "start")?, parse(end, "end")?);
                if start > end || start >= size {
                    return Err(crate::Error::InvalidRange("Range not satisfiable".into()));
                }
                Ok(Self {
                    start,
                    end: end.min(size - 1),
                })
            }
            (false, true) => {
                let start = parse(start, "start")?;
                if start >= size {
                    return Err(crate::Error::InvalidRange("Range not satisfiable".into()));
                }
                Ok(Self {
                    start,
                    end: size - 1,
                })
            }
            (true, false) => {
                let suffix = parse(end, "end")?;
                Ok(Self {
                    start: size.saturating_sub(suffix),
                    end: size - 1,
                })
            }
            (true, true) => Err(crate::Error::InvalidRange("Invalid range".into())),
        }
    }
}

pub fn validate_key(key: &str) -> Result<(), crate::Error> {
    if key.is_empty() {
        return Err(crate::Error::InvalidKey("Object key cannot be empty".into()));
    }
    if key.len() > crate::MAX_KEY_LENGTH {
        return Err(crate::Error::InvalidKey(format!(
            "Object key longer than {} bytes",
            crate::MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_header() {
        let range = ByteRange::new(100, 50);
        assert_eq!(range.end, 149);
        assert_eq!(range.len(), 50);
        assert_eq!(range.to_header(), "bytes=100-149");
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(
            ByteRange::parse("bytes=0-99", 1000).unwrap(),
            ByteRange { start: 0, end: 99 }
        );
        assert_eq!(
            ByteRange::parse("bytes=900-", 1000).unwrap(),
            ByteRange { start: 900, end: 999 }
        );
        assert_eq!(
            ByteRange::parse("bytes=-100", 1000).unwrap(),
            ByteRange { start: 900, end: 999 }
        );
        assert_eq!(
            ByteRange::parse("bytes=990-5000", 1000).unwrap(),
            ByteRange { start: 990, end: 999 }
        );
    }

    #[test]
    fn test_parse_range_rejects_unsatisfiable() {
        assert!(ByteRange::parse("bytes=1000-", 1000).is_err());
        assert!(ByteRange::parse("bytes=5-1", 1000).is_err());
        assert!(ByteRange::parse("items=0-1", 1000).is_err());
        assert!(ByteRange::parse("bytes=-", 1000).is_err());
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("photos/2024/a.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key(&"k".repeat(1025)).is_err());
    }
}
