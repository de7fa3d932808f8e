//! rb command - remove bucket

use super::rm::{execute as rm_execute, RmOptions};
use super::CommandContext;
use crate::storage::S3Uri;
use crate::utils::confirm;
use anyhow::{Context, Result};
use colored::Colorize;

pub async fn execute(ctx: &CommandContext, bucket: &str, force: bool) -> Result<()> {
    let client = ctx.connect()?;
    let bucket_name = S3Uri::bucket_name(bucket)?;

    if force {
        if !ctx.quiet {
            let msg = format!(
                "Delete all objects in bucket '{}' and remove bucket?",
                bucket_name
            );
            if !confirm(&msg)? {
                ctx.info("Cancelled");
                return Ok(());
            }
        }

        let rm_opts = RmOptions {
            recursive: true,
            force: true,
            dryrun: false,
        };
        rm_execute(ctx, &format!("s3://{}/", bucket_name), rm_opts).await?;
    }

    client
        .service()
        .delete_bucket(&bucket_name)
        .await
        .context("Failed to delete bucket. Bucket may not be empty (use --force).")?;

    ctx.info(&format!("{}: s3://{}", "remove_bucket".red(), bucket_name));
    Ok(())
}
