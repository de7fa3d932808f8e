//! Utility functions

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

/// Generate a unique token for correlating the events of one operation
pub fn generate_operation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Strip the quotes the service wraps around ETags
pub fn parse_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// XML escape string
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// `x-amz-date` timestamp
pub fn format_amz_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parse the ISO-8601 timestamps found in listing documents
pub fn parse_s3_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

/// Parse the RFC 2822 dates found in `Last-Modified` headers
pub fn parse_http_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
