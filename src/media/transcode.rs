use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::workspace::remove_file_if_exists;
use crate::{RelayError, StageResult};

/// Re-encodes a video to a smaller file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode `src` into `dest` at the given constant rate factor.
    ///
    /// On timeout both `src` and `dest` are deleted before `TranscodeTimeout` is returned.
    /// Any other failure leaves cleanup to the caller.
    async fn transcode(&self, src: &Path, dest: &Path, crf: u8) -> StageResult<()>;
}

/// How long a request may wait for a free encoder slot unless configured otherwise
pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(120);

/// ffmpeg/libx264 transcoder with a wall-clock limit and a bounded number of parallel encodes
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout: Duration,
    queue_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Limit the wait for a free encoder slot
    pub fn with_queue_timeout(mut self, queue_timeout: Duration) -> Self {
        self.queue_timeout = queue_timeout;
        self
    }

    /// Command line passed to ffmpeg
    pub fn build_args(src: &Path, dest: &Path, crf: u8) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(src.as_os_str().to_owned());
        args.extend(["-vcodec", "libx264", "-crf"].iter().map(OsString::from));
        args.push(OsString::from(crf.to_string()));
        args.push(dest.as_os_str().to_owned());
        args
    }

    async fn remove_both(src: &Path, dest: &Path) {
        for path in [src, dest] {
            if let Err(e) = remove_file_if_exists(path).await {
                tracing::warn!("Failed to delete {} after timeout: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, src: &Path, dest: &Path, crf: u8) -> StageResult<()> {
        // Waiting for a slot does not count against the encode timeout, it has its own limit
        let _permit = match tokio::time::timeout(self.queue_timeout, self.permits.acquire()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(RelayError::Transcode("transcoder pool is closed".to_string()))
            }
            Err(_) => {
                tracing::warn!(
                    "No encoder slot free for {} within {:?}",
                    src.display(),
                    self.queue_timeout
                );
                Self::remove_both(src, dest).await;
                return Err(RelayError::TranscodeTimeout(self.queue_timeout.as_secs()));
            }
        };

        tracing::debug!("Compressing {} -> {} (crf {})", src.display(), dest.display(), crf);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(Self::build_args(src, dest, crf))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RelayError::Transcode(format!("failed to run {}: {}", self.ffmpeg_path, e))
            })?;

        let mut stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut buffer = String::new();
            if let Some(stderr) = stderr.as_mut() {
                let _ = stderr.read_to_string(&mut buffer).await;
            }
            buffer
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stderr_reader.abort();
                return Err(RelayError::Transcode(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(
                    "Compression of {} exceeded {:?}, aborting",
                    src.display(),
                    self.timeout
                );
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill ffmpeg: {}", e);
                }
                stderr_reader.abort();
                Self::remove_both(src, dest).await;
                return Err(RelayError::TranscodeTimeout(self.timeout.as_secs()));
            }
        };

        if !status.success() {
            let stderr = stderr_reader.await.unwrap_or_default();
            let detail = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(RelayError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                status, detail
            )));
        }
        stderr_reader.abort();

        let written = tokio::fs::metadata(dest)
            .await
            .map(|metadata| metadata.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(RelayError::Transcode(
                "ffmpeg produced no output".to_string(),
            ));
        }

        tracing::info!("Video compression finished: {} bytes", written);
        Ok(())
    }
}
