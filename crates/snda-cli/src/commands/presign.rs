//! presign command - generate pre-signed URLs

use super::CommandContext;
use crate::storage::S3Uri;
use anyhow::{Context, Result};
use snda_auth::{generate_presigned_url, Credentials, PresignedMethod, RequestSigner};
use std::time::Duration;

pub fn parse_method(method: &str) -> Result<PresignedMethod> {
    Ok(match method.to_uppercase().as_str() {
        "GET" => PresignedMethod::Get,
        "PUT" => PresignedMethod::Put,
        "HEAD" => PresignedMethod::Head,
        "DELETE" => PresignedMethod::Delete,
        _ => anyhow::bail!("Unsupported method: {}. Use GET, PUT, HEAD or DELETE.", method),
    })
}

pub fn execute(ctx: &CommandContext, path: &str, expires: u64, method: &str) -> Result<()> {
    ctx.profile.validate()?;
    let uri = S3Uri::parse(path)?;
    let key = uri.key.as_ref().context("Object key required")?;
    let method = parse_method(method)?;

    let config = ctx.profile.client_config();
    let credentials = Credentials::from_config(&config.credentials)?;
    let signer = RequestSigner::new(credentials, config.connection.region.clone());

    let presigned = generate_presigned_url(
        &signer,
        method,
        &config.base_url(),
        &format!("/{}/{}", uri.bucket, key),
        Duration::from_secs(expires),
    )?;

    if ctx.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "url": presigned.url,
                "method": presigned.method.as_str(),
                "expires_at": presigned.expires_at.to_rfc3339(),
            })
        );
    } else {
        println!("{}", presigned.url);
    }
    Ok(())
}
