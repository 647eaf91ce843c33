//! Artifact download.

use std::path::Path;

use modelship_core::{Error, Result};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;
use tracing::info;

/// Stream `url` into `dest`, creating parent directories. Returns bytes written.
pub async fn fetch(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Http(format!("GET {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::Http(format!("GET {} returned {}", url, response.status())));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|e| Error::Http(format!("reading {}: {}", url, e)))?;
        file.write_all(&bytes).await?;
        written += bytes.len() as u64;
    }
    file.flush().await?;

    info!("Fetched {} ({} bytes) to {}", url, written, dest.display());
    Ok(written)
}
