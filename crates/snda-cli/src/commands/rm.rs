//! rm command - remove objects

use super::ls::collect_objects;
use super::CommandContext;
use crate::storage::S3Uri;
use crate::utils::confirm;
use anyhow::{Context, Result};
use colored::Colorize;
use snda_client::ThreadedService;
use tracing::debug;

pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
    pub dryrun: bool,
}

pub async fn execute(ctx: &CommandContext, path: &str, opts: RmOptions) -> Result<()> {
    let client = ctx.connect()?;
    let uri = S3Uri::parse(path)?;

    if uri.bucket.is_empty() {
        anyhow::bail!("A bucket is required: s3://bucket/key");
    }
    if uri.is_prefix() && !opts.recursive {
        anyhow::bail!("Cannot delete a prefix without --recursive flag");
    }

    if opts.recursive {
        delete_prefix(ctx, &client, &uri, &opts).await
    } else {
        delete_object(ctx, &client, &uri, &opts).await
    }
}

async fn delete_object(
    ctx: &CommandContext,
    client: &ThreadedService,
    uri: &S3Uri,
    opts: &RmOptions,
) -> Result<()> {
    let key = uri.key.as_ref().context("Object key required")?;

    if !opts.force && !ctx.quiet && !confirm(&format!("Delete {}?", uri))? {
        ctx.info("Cancelled");
        return Ok(());
    }

    if opts.dryrun {
        println!("(dryrun) delete: {}", uri);
        return Ok(());
    }

    client
        .service()
        .delete_object(&uri.bucket, key)
        .await
        .context("Delete failed")?;

    ctx.info(&format!("{}: {}", "delete".red(), uri));
    Ok(())
}

async fn delete_prefix(
    ctx: &CommandContext,
    client: &ThreadedService,
    uri: &S3Uri,
    opts: &RmOptions,
) -> Result<()> {
    let listing = collect_objects(client, &uri.bucket, uri.key_or_empty(), true).await?;
    if listing.objects.is_empty() {
        ctx.info("No objects to delete");
        return Ok(());
    }

    if !opts.force
        && !ctx.quiet
        && !confirm(&format!(
            "Delete {} object(s) under {}?",
            listing.objects.len(),
            uri
        ))?
    {
        ctx.info("Cancelled");
        return Ok(());
    }

    let mut deleted = 0usize;
    for object in &listing.objects {
        if opts.dryrun {
            println!("(dryrun) delete: s3://{}/{}", uri.bucket, object.key);
            continue;
        }

        debug!(bucket = %uri.bucket, key = %object.key, "deleting");
        match client.service().delete_object(&uri.bucket, &object.key).await {
            Ok(()) => {
                deleted += 1;
                ctx.info(&format!("{}: s3://{}/{}", "delete".red(), uri.bucket, object.key));
            }
            Err(e) => eprintln!(
                "{}: s3://{}/{}: {}",
                "delete failed".red(),
                uri.bucket,
                object.key,
                e
            ),
        }
    }

    if !opts.dryrun && deleted < listing.objects.len() {
        anyhow::bail!(
            "{} of {} object(s) could not be deleted",
            listing.objects.len() - deleted,
            listing.objects.len()
        );
    }
    Ok(())
}
