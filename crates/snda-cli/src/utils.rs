//! Formatting and path helpers

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::io::{self, Write};

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_size(bytes: u64, human_readable: bool) -> String {
    if human_readable {
        humansize::format_size(bytes, humansize::BINARY)
    } else {
        bytes.to_string()
    }
}

/// Ask for a yes/no answer on stdin
pub fn confirm(message: &str) -> Result<bool> {
    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Last path component of a path or key
pub fn extract_filename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub fn join_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if prefix.ends_with('/') {
        format!("{}{}", prefix, name)
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Key a local file lands on: the file name under a prefix, or the given key
pub fn determine_dest_key(source_path: &str, dest_key: Option<&str>, dest_is_prefix: bool) -> String {
    let filename = extract_filename(source_path);

    match dest_key {
        Some(key) if dest_is_prefix || key.ends_with('/') => join_key(key, filename),
        Some(key) => key.to_string(),
        None => filename.to_string(),
    }
}
