//! Reel Relay - fetch social-media videos for chat requesters
//!
//! This library turns a recognised video link into a deliverable media file: it resolves the
//! direct download URL through an extraction API, streams the video into a scratch workspace,
//! probes it with ffprobe, re-encodes it with ffmpeg when it exceeds the delivery size limit and
//! hands the result to a chat sink. Every scratch file is removed once the request ends.

pub mod cli;
pub mod config;
pub mod download;
pub mod extractors;
pub mod links;
pub mod media;
pub mod output;
pub mod pipeline;
pub mod utils;
pub mod workspace;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{LinkExtractor, RapidApiExtractor};
pub use links::{LinkMatcher, Trigger};
pub use media::{MediaInfo, MediaInspector, Transcoder};
pub use pipeline::{ChatSink, PipelineOutcome, PipelineSettings, RelayPipeline, Request, Stage};
pub use workspace::{ScratchRole, Workspace};

/// Result type used by the application plumbing (config, CLI, sinks)
pub type Result<T> = anyhow::Result<T>;

/// Result type returned by the pipeline stages
pub type StageResult<T> = std::result::Result<T, RelayError>;

/// Failures a pipeline stage can end with
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Extraction API failed: {0}")]
    Upstream(String),

    #[error("Video download failed: {0}")]
    Download(String),

    #[error("Media inspection failed: {0}")]
    Inspection(String),

    #[error("Media has no video stream")]
    AudioOnly,

    #[error("Transcode exceeded {0} seconds")]
    TranscodeTimeout(u64),

    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Chat platform rejected the video: {0}")]
    Delivery(String),

    #[error("Workspace operation failed: {0}")]
    Workspace(String),
}

impl RelayError {
    /// The single message shown to the requester for this failure.
    ///
    /// Download and inspection failures share one message because the requester can only
    /// retry in either case.
    pub fn user_message(&self) -> &'static str {
        match self {
            RelayError::Upstream(_) => pipeline::messages::UPSTREAM_FAILED,
            RelayError::Download(_) | RelayError::Inspection(_) => {
                pipeline::messages::DOWNLOAD_FAILED
            }
            RelayError::AudioOnly => pipeline::messages::AUDIO_ONLY,
            RelayError::TranscodeTimeout(_) => pipeline::messages::TRANSCODE_TIMEOUT,
            RelayError::Transcode(_) => pipeline::messages::TRANSCODE_FAILED,
            RelayError::Delivery(_) => pipeline::messages::DELIVERY_FAILED,
            RelayError::Workspace(_) => pipeline::messages::DOWNLOAD_FAILED,
        }
    }
}
