use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod messages;
pub mod status;

use crate::config::Config;
use crate::download::{Fetcher, HttpFetcher};
use crate::extractors::{LinkExtractor, RapidApiExtractor};
use crate::links::{LinkMatcher, Trigger};
use crate::media::{FfmpegTranscoder, FfprobeInspector, MediaInspector, Transcoder};
use crate::utils::{extract_domain, format_file_size};
use crate::workspace::{ScratchRole, Workspace};
use crate::{RelayError, StageResult};

use status::StatusTicker;

/// Why a compression attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionFailure {
    Timeout,
    Other,
}

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Validated,
    Fetching,
    Inspecting,
    Direct,
    Compressing,
    Delivered,
    FailedExtraction,
    FailedDownload,
    FailedInspection,
    FailedAudioOnly,
    FailedCompression(CompressionFailure),
    FailedDelivery,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Delivered) || self.is_failure()
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Stage::FailedExtraction
                | Stage::FailedDownload
                | Stage::FailedInspection
                | Stage::FailedAudioOnly
                | Stage::FailedCompression(_)
                | Stage::FailedDelivery
        )
    }

    /// Terminal stage reached when a stage fails with `error`
    pub fn for_error(error: &RelayError) -> Self {
        match error {
            RelayError::Upstream(_) => Stage::FailedExtraction,
            RelayError::Download(_) | RelayError::Workspace(_) => Stage::FailedDownload,
            RelayError::Inspection(_) => Stage::FailedInspection,
            RelayError::AudioOnly => Stage::FailedAudioOnly,
            RelayError::TranscodeTimeout(_) => {
                Stage::FailedCompression(CompressionFailure::Timeout)
            }
            RelayError::Transcode(_) => Stage::FailedCompression(CompressionFailure::Other),
            RelayError::Delivery(_) => Stage::FailedDelivery,
        }
    }
}

/// One user-initiated job
#[derive(Debug, Clone)]
pub struct Request {
    /// Correlation id; namespaces the request's scratch files
    pub id: String,
    /// Link that passed the link predicate
    pub source_url: String,
    /// Chat identity of whoever asked
    pub requester_id: String,
    stage: Stage,
}

impl Request {
    /// New request with a freshly generated id
    pub fn new(source_url: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().simple().to_string(), source_url, requester_id)
    }

    /// New request reusing an id from the chat platform (e.g. an interaction id)
    pub fn with_id(
        id: impl Into<String>,
        source_url: impl Into<String>,
        requester_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            requester_id: requester_id.into(),
            stage: Stage::Validated,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(request = %self.id, "{:?} -> {:?}", self.stage, next);
        self.stage = next;
    }
}

/// Requester that gets an extra message after each successful delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialUser {
    pub id: String,
    pub message: String,
}

/// Policy and locations the pipeline runs with
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub workspace_dir: PathBuf,
    /// Files above this size are compressed before delivery
    pub size_threshold_bytes: u64,
    pub compression_crf: u8,
    /// Workspace entries older than this are swept before each request
    pub retention: Duration,
    /// Interval of the "processing..." animation; zero disables it
    pub status_interval: Duration,
    pub special_user: Option<SpecialUser>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workspace_dir: std::env::temp_dir().join("reelrelay"),
            size_threshold_bytes: 8 * 1024 * 1024,
            compression_crf: 28,
            retention: Duration::from_secs(600),
            status_interval: Duration::from_secs(1),
            special_user: None,
        }
    }
}

/// Chat-side operations the pipeline reports through.
///
/// A failed `deliver` fails the request. Failures of the other operations are logged by the
/// pipeline and never change a request's outcome.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Placeholder reply sent before any network I/O
    async fn acknowledge(&self, text: &str) -> crate::Result<()>;

    /// Replace the current status text; may be called any number of times
    async fn update_status(&self, text: &str) -> crate::Result<()>;

    /// Hand over the video. The files are deleted once this returns.
    async fn deliver(&self, text: &str, files: &[PathBuf]) -> crate::Result<()>;

    /// Terminal failure message
    async fn report_failure(&self, text: &str) -> crate::Result<()>;

    /// Extra message for the special requester after a delivery
    async fn notify_special(&self, text: &str) -> crate::Result<()>;
}

/// Terminal result of one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub request_id: String,
    pub stage: Stage,
    /// Size of the delivered file
    pub delivered_bytes: Option<u64>,
    /// Whether the delivered file is a re-encode
    pub compressed: bool,
    /// Internal error description for failed requests
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineOutcome {
    pub fn is_delivered(&self) -> bool {
        self.stage == Stage::Delivered
    }
}

struct Delivery {
    bytes: u64,
    compressed: bool,
}

/// Fetch, inspect, compress if needed and deliver, one request at a time per call.
///
/// Instances are cheap to share behind an `Arc`; concurrent `run` calls only share the
/// workspace directory, and their files never collide because names carry the request id.
pub struct RelayPipeline {
    settings: PipelineSettings,
    workspace: Workspace,
    matcher: LinkMatcher,
    extractor: Arc<dyn LinkExtractor>,
    fetcher: Arc<dyn Fetcher>,
    inspector: Arc<dyn MediaInspector>,
    transcoder: Arc<dyn Transcoder>,
}

impl RelayPipeline {
    pub fn new(
        settings: PipelineSettings,
        matcher: LinkMatcher,
        extractor: Arc<dyn LinkExtractor>,
        fetcher: Arc<dyn Fetcher>,
        inspector: Arc<dyn MediaInspector>,
        transcoder: Arc<dyn Transcoder>,
    ) -> StageResult<Self> {
        let workspace = Workspace::new(settings.workspace_dir.clone());
        workspace.ensure_exists()?;

        Ok(Self {
            settings,
            workspace,
            matcher,
            extractor,
            fetcher,
            inspector,
            transcoder,
        })
    }

    /// Build the production pipeline: RapidAPI extraction, HTTP fetch, ffprobe and ffmpeg
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let extractor = RapidApiExtractor::new(&config.api)?;
        let fetcher = HttpFetcher::new(config.fetch_timeout())?;
        let inspector = FfprobeInspector::new(config.app.ffprobe_path.clone());
        let transcoder = FfmpegTranscoder::new(
            config.app.ffmpeg_path.clone(),
            config.transcode_timeout(),
            config.app.max_concurrent_transcodes,
        )
        .with_queue_timeout(config.transcode_queue_timeout());

        Ok(Self::new(
            config.pipeline_settings(),
            LinkMatcher::new()?,
            Arc::new(extractor),
            Arc::new(fetcher),
            Arc::new(inspector),
            Arc::new(transcoder),
        )?)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Entry point for chat input.
    ///
    /// Returns `None` when the input carries no supported link. A command trigger answers
    /// such input with an "invalid URL" reply; a passive scan stays silent.
    pub async fn handle(
        &self,
        trigger: Trigger,
        request_id: &str,
        text: &str,
        requester_id: &str,
        sink: Arc<dyn ChatSink>,
    ) -> Option<PipelineOutcome> {
        let Some(source_url) = self.matcher.classify(trigger, text) else {
            if trigger == Trigger::Command {
                tracing::info!(request = %request_id, "Rejected invalid link: {}", text.trim());
                notify("report_failure", sink.report_failure(messages::INVALID_URL).await);
            }
            return None;
        };

        tracing::info!(
            request = %request_id,
            %trigger,
            domain = %extract_domain(&source_url).unwrap_or_default(),
            "Processing link: {}",
            source_url
        );
        let request = Request::with_id(request_id, source_url, requester_id);
        Some(self.run(request, sink).await)
    }

    /// Drive one validated request to a terminal stage.
    ///
    /// Exactly one terminal message reaches the sink, and none of the request's scratch files
    /// remain on disk when this returns.
    pub async fn run(&self, mut request: Request, sink: Arc<dyn ChatSink>) -> PipelineOutcome {
        let started_at = Utc::now();
        let original = self.workspace.allocate(&request.id, ScratchRole::Original);
        let compressed = self.workspace.allocate(&request.id, ScratchRole::Compressed);

        let result = self
            .process(&mut request, &sink, &original, &compressed)
            .await;

        // Delivered files have already been handed over; failed ones are simply dropped
        self.workspace.discard(&[&original, &compressed]).await;

        let mut outcome = PipelineOutcome {
            request_id: request.id.clone(),
            stage: request.stage(),
            delivered_bytes: None,
            compressed: false,
            error: None,
            started_at,
            finished_at: started_at,
        };

        match result {
            Ok(delivery) => {
                request.advance(Stage::Delivered);
                tracing::info!(
                    request = %request.id,
                    compressed = delivery.compressed,
                    "Delivered video ({})",
                    format_file_size(delivery.bytes)
                );

                if let Some(special) = &self.settings.special_user {
                    if special.id == request.requester_id {
                        notify("notify_special", sink.notify_special(&special.message).await);
                    }
                }

                outcome.delivered_bytes = Some(delivery.bytes);
                outcome.compressed = delivery.compressed;
            }
            Err(error) => {
                request.advance(Stage::for_error(&error));
                tracing::error!(request = %request.id, stage = ?request.stage(), "{}", error);

                notify("report_failure", sink.report_failure(error.user_message()).await);
                outcome.error = Some(error.to_string());
            }
        }

        outcome.stage = request.stage();
        outcome.finished_at = Utc::now();
        outcome
    }

    async fn process(
        &self,
        request: &mut Request,
        sink: &Arc<dyn ChatSink>,
        original: &Path,
        compressed: &Path,
    ) -> StageResult<Delivery> {
        self.sweep().await;
        notify("acknowledge", sink.acknowledge(messages::ACKNOWLEDGE).await);

        request.advance(Stage::Fetching);
        let ticker = StatusTicker::start(
            sink.clone(),
            messages::PROCESSING_FRAME,
            self.settings.status_interval,
        );

        let download_url = self.extractor.extract(&request.source_url).await?;
        tracing::debug!(
            request = %request.id,
            provider = self.extractor.provider_name(),
            "Resolved download URL"
        );
        self.fetcher.fetch(&download_url, original).await?;
        ticker.stop();

        request.advance(Stage::Inspecting);
        let info = self.inspector.inspect(original).await?;
        if info.is_audio_only() {
            return Err(RelayError::AudioOnly);
        }

        if info.size_bytes <= self.settings.size_threshold_bytes {
            request.advance(Stage::Direct);
            self.deliver(sink, original)
                .await
                .map_err(|e| RelayError::Delivery(format!("{:#}", e)))?;
            return Ok(Delivery {
                bytes: info.size_bytes,
                compressed: false,
            });
        }

        request.advance(Stage::Compressing);
        tracing::info!(
            request = %request.id,
            "Video is {} (limit {}), compressing",
            format_file_size(info.size_bytes),
            format_file_size(self.settings.size_threshold_bytes)
        );
        notify("update_status", sink.update_status(messages::COMPRESSING).await);

        self.transcoder
            .transcode(original, compressed, self.settings.compression_crf)
            .await?;

        let bytes = tokio::fs::metadata(compressed)
            .await
            .map_err(|e| RelayError::Transcode(format!("compressed file unreadable: {}", e)))?
            .len();

        // A rejected upload of the re-encode means it is still too large for the platform
        self.deliver(sink, compressed).await.map_err(|e| {
            RelayError::Transcode(format!("compressed file was not accepted: {:#}", e))
        })?;
        Ok(Delivery {
            bytes,
            compressed: true,
        })
    }

    async fn deliver(&self, sink: &Arc<dyn ChatSink>, file: &Path) -> crate::Result<()> {
        let files = [file.to_path_buf()];
        sink.deliver(messages::READY, &files).await
    }

    /// Best-effort removal of stale workspace files
    async fn sweep(&self) {
        match self.workspace.sweep_expired(self.settings.retention).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!("Swept {} expired workspace files", removed),
            Err(e) => tracing::warn!("Workspace sweep failed: {}", e),
        }
    }
}

/// Sink failures are logged and otherwise ignored
fn notify(operation: &str, result: crate::Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Chat sink {} failed: {:#}", operation, e);
    }
}

#[cfg(test)]
mod tests;
