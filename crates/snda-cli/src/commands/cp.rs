//! cp command - upload and download through the transfer engine

use super::CommandContext;
use crate::progress::{create_transfer_progress, format_bytes, format_duration, ProgressObserver};
use crate::storage::{S3Uri, TransferDirection};
use crate::utils::{determine_dest_key, extract_filename};
use anyhow::{Context, Result};
use colored::Colorize;
use snda_client::{PartSource, ThreadedService, TransferOutcome};
use snda_transfer::CancelHandle;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

pub struct CpOptions {
    pub show_progress: bool,
    pub dryrun: bool,
}

pub async fn execute(
    ctx: &CommandContext,
    source: &str,
    destination: &str,
    opts: CpOptions,
) -> Result<()> {
    match TransferDirection::determine(source, destination) {
        TransferDirection::Upload => upload(ctx, Path::new(source), destination, &opts).await,
        TransferDirection::Download => download(ctx, source, Path::new(destination), &opts).await,
        TransferDirection::Remote => {
            anyhow::bail!("Copying between two remote locations is not supported")
        }
        TransferDirection::Local => {
            anyhow::bail!("Local to local copy is not supported. Use system cp command.")
        }
    }
}

/// Cancel `handle` on Ctrl-C. Parts already running are allowed to finish.
fn cancel_on_interrupt(handle: CancelHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling transfer");
            handle.cancel();
        }
    })
}

fn observer(ctx: &CommandContext, opts: &CpOptions, size: u64, name: &str) -> ProgressObserver {
    if opts.show_progress && !ctx.quiet && console::user_attended() {
        ProgressObserver::new(create_transfer_progress(size, name))
    } else {
        ProgressObserver::hidden()
    }
}

async fn upload(
    ctx: &CommandContext,
    source: &Path,
    destination: &str,
    opts: &CpOptions,
) -> Result<()> {
    let dest_uri = S3Uri::parse(destination)?;
    if dest_uri.bucket.is_empty() {
        anyhow::bail!("Destination must name a bucket: s3://bucket/key");
    }
    if !source.is_file() {
        anyhow::bail!("Source is not a file: {}", source.display());
    }

    let source_str = source.to_string_lossy();
    let key = determine_dest_key(&source_str, dest_uri.key.as_deref(), dest_uri.is_prefix());
    let target = S3Uri {
        bucket: dest_uri.bucket.clone(),
        key: Some(key.clone()),
    };

    if opts.dryrun {
        println!("(dryrun) upload: {} -> {}", source.display(), target);
        return Ok(());
    }

    let client = ctx.connect()?;
    let size = tokio::fs::metadata(source).await?.len();
    let mut progress = observer(ctx, opts, size, extract_filename(&source_str));
    let cancel = CancelHandle::new();
    let interrupt = cancel_on_interrupt(cancel.clone());
    let started = Instant::now();

    debug!(source = %source.display(), target = %target, size, "uploading");
    let outcome = client
        .upload_object(
            &target.bucket,
            &key,
            PartSource::File(source.to_path_buf()),
            &cancel,
            &mut progress,
        )
        .await;
    interrupt.abort();

    match outcome.context("Upload failed")? {
        TransferOutcome::Completed(done) => {
            if !progress.bar().is_finished() {
                progress.bar().finish_and_clear();
            }
            ctx.info(&format!(
                "{}: {} -> {} ({} in {}, etag {})",
                "upload".green(),
                source.display(),
                target,
                format_bytes(size),
                format_duration(started.elapsed().as_secs()),
                done.etag
            ));
            Ok(())
        }
        TransferOutcome::Cancelled(parts) => {
            anyhow::bail!("Upload cancelled with {} part(s) not transferred", parts.len())
        }
    }
}

/// Local file a download lands in
fn download_path(dest: &Path, key: &str) -> PathBuf {
    if dest.is_dir() {
        dest.join(extract_filename(key))
    } else {
        dest.to_path_buf()
    }
}

async fn download(
    ctx: &CommandContext,
    source: &str,
    destination: &Path,
    opts: &CpOptions,
) -> Result<()> {
    let uri = S3Uri::parse(source)?;
    let key = uri
        .key
        .clone()
        .filter(|k| !k.ends_with('/'))
        .context("Source must name an object: s3://bucket/key")?;
    let dest = download_path(destination, &key);

    if opts.dryrun {
        println!("(dryrun) download: {} -> {}", uri, dest.display());
        return Ok(());
    }

    let client: ThreadedService = ctx.connect()?;
    let mut progress = observer(ctx, opts, 0, extract_filename(&key));
    let cancel = CancelHandle::new();
    let interrupt = cancel_on_interrupt(cancel.clone());
    let started = Instant::now();

    debug!(source = %uri, dest = %dest.display(), "downloading");
    let outcome = client
        .download_object(&uri.bucket, &key, &dest, &cancel, &mut progress)
        .await;
    interrupt.abort();

    match outcome.context("Download failed")? {
        TransferOutcome::Completed(metadata) => {
            if !progress.bar().is_finished() {
                progress.bar().finish_and_clear();
            }
            ctx.info(&format!(
                "{}: {} -> {} ({} in {})",
                "download".green(),
                uri,
                dest.display(),
                format_bytes(metadata.content_length),
                format_duration(started.elapsed().as_secs())
            ));
            Ok(())
        }
        TransferOutcome::Cancelled(parts) => {
            anyhow::bail!("Download cancelled with {} part(s) not transferred", parts.len())
        }
    }
}
