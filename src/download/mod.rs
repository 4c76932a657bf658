use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::{RelayError, StageResult};

/// Streams a direct media URL into a file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `download_url` into `dest`, returning the number of bytes written.
    ///
    /// Returns only once the file is flushed and closed. On failure `dest` may hold a partial
    /// file; removing it is the caller's job.
    async fn fetch(&self, download_url: &str, dest: &Path) -> StageResult<u64>;
}

/// HTTP fetcher that writes the response body chunk by chunk
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// `timeout` bounds the whole transfer, so a stalled download fails instead of hanging
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, download_url: &str, dest: &Path) -> StageResult<u64> {
        tracing::debug!("Downloading video to: {}", dest.display());

        let response = self
            .client
            .get(download_url)
            .send()
            .await
            .map_err(|e| RelayError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::Download(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| RelayError::Download(format!("{}: {}", dest.display(), e)))?;

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RelayError::Download(format!("stream interrupted: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| RelayError::Download(e.to_string()))?;
            downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| RelayError::Download(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| RelayError::Download(e.to_string()))?;
        drop(file);

        tracing::debug!("Downloaded {} bytes", downloaded);
        Ok(downloaded)
    }
}
