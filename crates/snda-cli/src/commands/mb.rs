//! mb command - make bucket

use super::CommandContext;
use crate::storage::S3Uri;
use anyhow::{Context, Result};
use colored::Colorize;
use tracing::debug;

pub async fn execute(ctx: &CommandContext, bucket: &str) -> Result<()> {
    let client = ctx.connect()?;
    let bucket_name = S3Uri::bucket_name(bucket)?;

    debug!(bucket = %bucket_name, region = %ctx.profile.region, "creating bucket");
    client
        .service()
        .create_bucket(&bucket_name)
        .await
        .context("Failed to create bucket")?;

    ctx.info(&format!("{}: s3://{}", "make_bucket".green(), bucket_name));
    Ok(())
}
