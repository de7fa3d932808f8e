//! ls command - list buckets or objects

use super::CommandContext;
use crate::storage::S3Uri;
use crate::utils::{format_datetime, format_size};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use snda_client::{ListObjectsOptions, ThreadedService};
use snda_core::types::{BucketInfo, ObjectInfo};

/// Every object and common prefix under a prefix, across pages
#[derive(Debug, Default, Serialize)]
pub struct Listing {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<String>,
    pub total_size: u64,
}

pub async fn collect_objects(
    client: &ThreadedService,
    bucket: &str,
    prefix: &str,
    recursive: bool,
) -> Result<Listing> {
    let mut options = ListObjectsOptions::with_prefix(prefix);
    if !recursive {
        options.delimiter = Some("/".to_string());
    }

    let mut listing = Listing::default();
    loop {
        let page = client.service().list_objects(bucket, &options).await?;
        listing.total_size += page.contents.iter().map(|o| o.size).sum::<u64>();
        listing.objects.extend(page.contents);
        listing.prefixes.extend(page.common_prefixes);

        match page.next_marker {
            Some(marker) if page.is_truncated => options.marker = Some(marker),
            _ => break,
        }
    }
    Ok(listing)
}

pub async fn execute(
    ctx: &CommandContext,
    path: Option<&str>,
    long: bool,
    human_readable: bool,
    recursive: bool,
) -> Result<()> {
    let client = ctx.connect()?;
    let uri = S3Uri::parse(path.unwrap_or("s3://"))?;

    if uri.bucket.is_empty() {
        list_buckets(ctx, &client, long).await
    } else {
        list_objects(ctx, &client, &uri, long, human_readable, recursive).await
    }
}

async fn list_buckets(ctx: &CommandContext, client: &ThreadedService, long: bool) -> Result<()> {
    let result = client.service().list_buckets().await?;
    let buckets: &[BucketInfo] = &result.buckets;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(buckets)?);
        return Ok(());
    }

    for bucket in buckets {
        if long {
            println!(
                "{} {}",
                format_datetime(&bucket.creation_date),
                bucket.name.blue().bold()
            );
        } else {
            println!("{}", bucket.name.blue().bold());
        }
    }

    if !ctx.quiet {
        println!("\nTotal: {} bucket(s)", buckets.len());
    }
    Ok(())
}

async fn list_objects(
    ctx: &CommandContext,
    client: &ThreadedService,
    uri: &S3Uri,
    long: bool,
    human_readable: bool,
    recursive: bool,
) -> Result<()> {
    let listing = collect_objects(client, &uri.bucket, uri.key_or_empty(), recursive).await?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for prefix in &listing.prefixes {
        if long {
            println!("{:>19} {:>12}  PRE {}", "", "", prefix.blue().bold());
        } else {
            println!("{}", prefix.blue().bold());
        }
    }

    for object in &listing.objects {
        if long {
            println!(
                "{} {:>12}  {}",
                format_datetime(&object.last_modified),
                format_size(object.size, human_readable),
                object.key
            );
        } else {
            println!("{}", object.key);
        }
    }

    if !ctx.quiet {
        println!(
            "\nTotal: {} object(s), {}",
            listing.objects.len(),
            format_size(listing.total_size, human_readable)
        );
    }
    Ok(())
}
