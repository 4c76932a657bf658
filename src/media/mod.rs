use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub mod transcode;

pub use transcode::{FfmpegTranscoder, Transcoder};

use crate::{RelayError, StageResult};

/// What a probe learned about a fetched file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File size in bytes
    pub size_bytes: u64,

    /// Whether at least one video stream is present
    pub has_video: bool,

    /// Container duration in seconds, when ffprobe reports one
    pub duration_secs: Option<f64>,
}

impl MediaInfo {
    pub fn is_audio_only(&self) -> bool {
        is_audio_only(self)
    }
}

/// True iff the probe found no video stream
pub fn is_audio_only(info: &MediaInfo) -> bool {
    !info.has_video
}

/// Classifies fetched media
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaInspector: Send + Sync {
    /// Probe `path`. A file that cannot be probed is an error, never "not audio-only".
    async fn inspect(&self, path: &Path) -> StageResult<MediaInfo>;
}

/// Media inspector backed by ffprobe
pub struct FfprobeInspector {
    ffprobe_path: String,
}

impl FfprobeInspector {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Run ffprobe and return its JSON report
    async fn probe(&self, path: &Path) -> StageResult<serde_json::Value> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                RelayError::Inspection(format!("failed to run {}: {}", self.ffprobe_path, e))
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(RelayError::Inspection(format!(
                "ffprobe exited with {}: {}",
                output.status,
                error.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| RelayError::Inspection(format!("unreadable ffprobe output: {}", e)))
    }
}

impl Default for FfprobeInspector {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

#[async_trait]
impl MediaInspector for FfprobeInspector {
    async fn inspect(&self, path: &Path) -> StageResult<MediaInfo> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| RelayError::Inspection(format!("{}: {}", path.display(), e)))?;

        if metadata.len() == 0 {
            return Err(RelayError::Inspection(format!(
                "file is empty: {}",
                path.display()
            )));
        }

        let info = self.probe(path).await?;

        let streams = info["streams"]
            .as_array()
            .filter(|streams| !streams.is_empty())
            .ok_or_else(|| {
                RelayError::Inspection(format!("no media streams in {}", path.display()))
            })?;

        let has_video = streams
            .iter()
            .any(|stream| stream["codec_type"].as_str() == Some("video"));

        let duration_secs = info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok());

        tracing::debug!(
            streams = streams.len(),
            has_video,
            size = metadata.len(),
            "Probed {}",
            path.display()
        );

        Ok(MediaInfo {
            size_bytes: metadata.len(),
            has_video,
            duration_secs,
        })
    }
}
