use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::PluginError;

/// Build the HTTP client used for release downloads
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build http client")
}

/// Download `url` into `dest`, returning the number of bytes written.
///
/// `dest` is created (or truncated) before the request is sent, so on an
/// HTTP error it is left behind empty and the caller is expected to discard
/// the directory holding it. The transfer is aborted as soon as `cancel`
/// fires, whether the request is still in flight or the body is streaming.
pub async fn download_package(
    cancel: &CancellationToken,
    client: &Client,
    dest: &Path,
    url: &str,
) -> Result<u64> {
    let mut out = fs::File::create(dest)
        .await
        .with_context(|| format!("failed to create {}", dest.display()))?;

    let resp = tokio::select! {
        _ = cancel.cancelled() => return Err(PluginError::Cancelled.into()),
        resp = client.get(url).send() => resp?,
    };

    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(PluginError::Http { status }.into());
    }

    let mut stream = resp.bytes_stream();
    let mut written = 0u64;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(PluginError::Cancelled.into()),
            chunk = stream.next() => chunk,
        };

        let Some(chunk) = chunk else { break };
        let chunk = chunk.context("failed to read response body")?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    out.flush().await?;
    debug!(url, bytes = written, "download finished");

    Ok(written)
}
