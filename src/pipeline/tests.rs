use super::*;
use crate::download::MockFetcher;
use crate::extractors::MockLinkExtractor;
use crate::media::transcode::MockTranscoder;
use crate::media::{MediaInfo, MockMediaInspector};
use std::sync::Mutex;
use std::time::SystemTime;
use tempfile::TempDir;

const MIB: usize = 1024 * 1024;
const SOURCE: &str = "https://www.instagram.com/reel/C1a2b3c4/";
const DOWNLOAD: &str = "https://cdn.test/video.mp4";

#[derive(Debug, Clone, PartialEq)]
enum SinkEvent {
    Acknowledge(String),
    Status(String),
    Deliver {
        text: String,
        files: Vec<(PathBuf, Vec<u8>)>,
    },
    Failure(String),
    Special(String),
}

/// Records every call; delivered files are read at delivery time since the pipeline
/// deletes them afterwards
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    reject_uploads: bool,
}

impl RecordingSink {
    /// Sink whose platform refuses every file upload
    fn rejecting_uploads() -> Self {
        Self {
            reject_uploads: true,
            ..Self::default()
        }
    }

    fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    fn without_status(&self) -> Vec<SinkEvent> {
        self.events()
            .into_iter()
            .filter(|event| !matches!(event, SinkEvent::Status(text) if text.starts_with(messages::PROCESSING_FRAME)))
            .collect()
    }

    fn deliveries(&self) -> Vec<Vec<(PathBuf, Vec<u8>)>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Deliver { files, .. } => Some(files),
                _ => None,
            })
            .collect()
    }

    fn failures(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Failure(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn acknowledge(&self, text: &str) -> crate::Result<()> {
        self.push(SinkEvent::Acknowledge(text.to_string()));
        Ok(())
    }

    async fn update_status(&self, text: &str) -> crate::Result<()> {
        self.push(SinkEvent::Status(text.to_string()));
        Ok(())
    }

    async fn deliver(&self, text: &str, files: &[PathBuf]) -> crate::Result<()> {
        if self.reject_uploads {
            anyhow::bail!("Request entity too large");
        }
        let files = files
            .iter()
            .map(|path| (path.clone(), std::fs::read(path).unwrap()))
            .collect();
        self.push(SinkEvent::Deliver {
            text: text.to_string(),
            files,
        });
        Ok(())
    }

    async fn report_failure(&self, text: &str) -> crate::Result<()> {
        self.push(SinkEvent::Failure(text.to_string()));
        Ok(())
    }

    async fn notify_special(&self, text: &str) -> crate::Result<()> {
        self.push(SinkEvent::Special(text.to_string()));
        Ok(())
    }
}

/// Sink that accepts uploads but fails every other operation
struct BrokenSink;

#[async_trait]
impl ChatSink for BrokenSink {
    async fn acknowledge(&self, _text: &str) -> crate::Result<()> {
        anyhow::bail!("gateway closed")
    }

    async fn update_status(&self, _text: &str) -> crate::Result<()> {
        anyhow::bail!("gateway closed")
    }

    async fn deliver(&self, _text: &str, _files: &[PathBuf]) -> crate::Result<()> {
        Ok(())
    }

    async fn report_failure(&self, _text: &str) -> crate::Result<()> {
        anyhow::bail!("gateway closed")
    }

    async fn notify_special(&self, _text: &str) -> crate::Result<()> {
        anyhow::bail!("gateway closed")
    }
}

/// Fetcher that writes a deterministic body, tagged with the destination name so
/// concurrent requests produce different bytes
struct FileFetcher {
    len: usize,
    delay: Duration,
}

impl FileFetcher {
    fn body_for(dest: &Path, len: usize) -> Vec<u8> {
        let tag = dest.file_name().unwrap().to_string_lossy().into_owned();
        tag.bytes().cycle().take(len).collect()
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, download_url: &str, dest: &Path) -> StageResult<u64> {
        assert_eq!(download_url, DOWNLOAD);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let body = Self::body_for(dest, self.len);
        tokio::fs::write(dest, &body).await.unwrap();
        Ok(body.len() as u64)
    }
}

fn fetcher(len: usize) -> Arc<dyn Fetcher> {
    Arc::new(FileFetcher {
        len,
        delay: Duration::ZERO,
    })
}

fn extractor_ok() -> MockLinkExtractor {
    let mut extractor = MockLinkExtractor::new();
    extractor
        .expect_extract()
        .withf(|url| url.to_string() == SOURCE)
        .returning(|_| Ok(DOWNLOAD.to_string()));
    extractor.expect_provider_name().return_const("mock");
    extractor
}

fn inspector_from_disk(has_video: bool) -> MockMediaInspector {
    let mut inspector = MockMediaInspector::new();
    inspector.expect_inspect().returning(move |path| {
        let size_bytes = std::fs::metadata(path)
            .map_err(|e| RelayError::Inspection(e.to_string()))?
            .len();
        Ok(MediaInfo {
            size_bytes,
            has_video,
            duration_secs: Some(10.0),
        })
    });
    inspector
}

fn no_transcode() -> MockTranscoder {
    let mut transcoder = MockTranscoder::new();
    transcoder.expect_transcode().never();
    transcoder
}

fn shrinking_transcoder() -> MockTranscoder {
    let mut transcoder = MockTranscoder::new();
    transcoder
        .expect_transcode()
        .withf(|_, _, crf| *crf == 28)
        .times(1)
        .returning(|src, dest, _| {
            let bytes = std::fs::read(src).unwrap();
            std::fs::write(dest, &bytes[..bytes.len() / 3]).unwrap();
            Ok(())
        });
    transcoder
}

fn settings(dir: &TempDir) -> PipelineSettings {
    PipelineSettings {
        workspace_dir: dir.path().join("videos"),
        status_interval: Duration::ZERO,
        ..PipelineSettings::default()
    }
}

fn pipeline(
    settings: PipelineSettings,
    extractor: MockLinkExtractor,
    fetcher: Arc<dyn Fetcher>,
    inspector: MockMediaInspector,
    transcoder: MockTranscoder,
) -> RelayPipeline {
    RelayPipeline::new(
        settings,
        LinkMatcher::new().unwrap(),
        Arc::new(extractor),
        fetcher,
        Arc::new(inspector),
        Arc::new(transcoder),
    )
    .unwrap()
}

fn workspace_entries(pipeline: &RelayPipeline) -> Vec<PathBuf> {
    std::fs::read_dir(pipeline.workspace().root())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

#[tokio::test]
async fn test_small_video_is_delivered_unchanged_without_transcode() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(5 * MIB),
        inspector_from_disk(true),
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-small", SOURCE, "user-1"), sink.clone())
        .await;

    assert!(outcome.is_delivered());
    assert!(!outcome.compressed);
    assert_eq!(outcome.delivered_bytes, Some(5 * MIB as u64));

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    let (path, bytes) = &deliveries[0][0];
    let expected_path = pipeline
        .workspace()
        .allocate("req-small", ScratchRole::Original);
    assert_eq!(path, &expected_path);
    assert_eq!(bytes, &FileFetcher::body_for(&expected_path, 5 * MIB));

    assert_eq!(
        sink.events().first(),
        Some(&SinkEvent::Acknowledge(messages::ACKNOWLEDGE.to_string()))
    );
    assert!(sink.failures().is_empty());
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_large_video_is_compressed_and_both_files_removed() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(12 * MIB),
        inspector_from_disk(true),
        shrinking_transcoder(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-large", SOURCE, "user-1"), sink.clone())
        .await;

    assert!(outcome.is_delivered());
    assert!(outcome.compressed);

    let deliveries = sink.deliveries();
    assert_eq!(deliveries.len(), 1);
    let (path, bytes) = &deliveries[0][0];
    assert_eq!(
        path,
        &pipeline
            .workspace()
            .allocate("req-large", ScratchRole::Compressed)
    );
    assert!((bytes.len() as u64) <= 12 * MIB as u64);
    assert_eq!(outcome.delivered_bytes, Some(bytes.len() as u64));

    assert!(sink
        .events()
        .contains(&SinkEvent::Status(messages::COMPRESSING.to_string())));
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_threshold_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let settings = PipelineSettings {
        size_threshold_bytes: 1024,
        ..settings(&dir)
    };
    let pipeline = pipeline(
        settings,
        extractor_ok(),
        fetcher(1024),
        inspector_from_disk(true),
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-edge", SOURCE, "user-1"), sink.clone())
        .await;

    assert!(outcome.is_delivered());
    assert!(!outcome.compressed);
}

#[tokio::test]
async fn test_audio_only_fails_without_delivery() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(2 * MIB),
        inspector_from_disk(false),
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-audio", SOURCE, "user-1"), sink.clone())
        .await;

    assert_eq!(outcome.stage, Stage::FailedAudioOnly);
    assert!(sink.deliveries().is_empty());
    assert_eq!(sink.failures(), vec![messages::AUDIO_ONLY.to_string()]);
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_transcode_timeout_uses_timeout_message() {
    let dir = TempDir::new().unwrap();
    let mut transcoder = MockTranscoder::new();
    transcoder.expect_transcode().times(1).returning(|src, dest, _| {
        std::fs::write(dest, b"partial").unwrap();
        std::fs::remove_file(src).unwrap();
        std::fs::remove_file(dest).unwrap();
        Err(RelayError::TranscodeTimeout(60))
    });
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(9 * MIB),
        inspector_from_disk(true),
        transcoder,
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-slow", SOURCE, "user-1"), sink.clone())
        .await;

    assert_eq!(
        outcome.stage,
        Stage::FailedCompression(CompressionFailure::Timeout)
    );
    assert_eq!(sink.failures(), vec![messages::TRANSCODE_TIMEOUT.to_string()]);
    assert!(!sink
        .failures()
        .contains(&messages::TRANSCODE_FAILED.to_string()));
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_transcode_error_removes_both_files() {
    let dir = TempDir::new().unwrap();
    let mut transcoder = MockTranscoder::new();
    transcoder.expect_transcode().times(1).returning(|_, dest, _| {
        std::fs::write(dest, b"half an mp4").unwrap();
        Err(RelayError::Transcode("encoder crashed".to_string()))
    });
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(9 * MIB),
        inspector_from_disk(true),
        transcoder,
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-crash", SOURCE, "user-1"), sink.clone())
        .await;

    assert_eq!(
        outcome.stage,
        Stage::FailedCompression(CompressionFailure::Other)
    );
    assert_eq!(sink.failures(), vec![messages::TRANSCODE_FAILED.to_string()]);
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_extraction_failure_creates_no_files() {
    let dir = TempDir::new().unwrap();
    let mut extractor = MockLinkExtractor::new();
    extractor
        .expect_extract()
        .times(1)
        .returning(|_| Err(RelayError::Upstream("response contains no links".to_string())));
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().never();
    let mut inspector = MockMediaInspector::new();
    inspector.expect_inspect().never();

    let pipeline = pipeline(
        settings(&dir),
        extractor,
        Arc::new(fetcher),
        inspector,
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-upstream", SOURCE, "user-1"), sink.clone())
        .await;

    assert_eq!(outcome.stage, Stage::FailedExtraction);
    assert_eq!(sink.failures(), vec![messages::UPSTREAM_FAILED.to_string()]);
    assert!(sink.deliveries().is_empty());
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_download_failure_removes_partial_file() {
    let dir = TempDir::new().unwrap();
    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().times(1).returning(|_, dest| {
        std::fs::write(dest, b"truncated").unwrap();
        Err(RelayError::Download("stream interrupted".to_string()))
    });
    let mut inspector = MockMediaInspector::new();
    inspector.expect_inspect().never();

    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        Arc::new(fetcher),
        inspector,
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-partial", SOURCE, "user-1"), sink.clone())
        .await;

    assert_eq!(outcome.stage, Stage::FailedDownload);
    assert_eq!(sink.failures(), vec![messages::DOWNLOAD_FAILED.to_string()]);
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_probe_failure_shares_retry_message() {
    let dir = TempDir::new().unwrap();
    let mut inspector = MockMediaInspector::new();
    inspector
        .expect_inspect()
        .times(1)
        .returning(|_| Err(RelayError::Inspection("moov atom not found".to_string())));

    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(1024),
        inspector,
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .run(Request::with_id("req-probe", SOURCE, "user-1"), sink.clone())
        .await;

    assert_eq!(outcome.stage, Stage::FailedInspection);
    assert_eq!(sink.failures(), vec![messages::DOWNLOAD_FAILED.to_string()]);
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_special_user_gets_extra_message_only_on_success() {
    let dir = TempDir::new().unwrap();
    let settings = PipelineSettings {
        special_user: Some(SpecialUser {
            id: "373834322379014146".to_string(),
            message: "Again?".to_string(),
        }),
        ..settings(&dir)
    };
    let pipeline = pipeline(
        settings,
        extractor_ok(),
        fetcher(1024),
        inspector_from_disk(true),
        no_transcode(),
    );

    let special = Arc::new(RecordingSink::default());
    pipeline
        .run(
            Request::with_id("req-a", SOURCE, "373834322379014146"),
            special.clone(),
        )
        .await;
    let events = special.without_status();
    assert_eq!(events.last(), Some(&SinkEvent::Special("Again?".to_string())));

    let regular = Arc::new(RecordingSink::default());
    pipeline
        .run(Request::with_id("req-b", SOURCE, "someone-else"), regular.clone())
        .await;
    assert!(!regular
        .events()
        .iter()
        .any(|event| matches!(event, SinkEvent::Special(_))));
}

#[tokio::test]
async fn test_special_user_not_notified_on_failure() {
    let dir = TempDir::new().unwrap();
    let settings = PipelineSettings {
        special_user: Some(SpecialUser {
            id: "vip".to_string(),
            message: "Again?".to_string(),
        }),
        ..settings(&dir)
    };
    let pipeline = pipeline(
        settings,
        extractor_ok(),
        fetcher(1024),
        inspector_from_disk(false),
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    pipeline
        .run(Request::with_id("req-vip", SOURCE, "vip"), sink.clone())
        .await;

    assert!(!sink
        .events()
        .iter()
        .any(|event| matches!(event, SinkEvent::Special(_))));
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_files() {
    let dir = TempDir::new().unwrap();
    let inspector = inspector_from_disk(true);

    let mut extractor = MockLinkExtractor::new();
    extractor
        .expect_extract()
        .times(2)
        .returning(|_| Ok(DOWNLOAD.to_string()));
    extractor.expect_provider_name().return_const("mock");

    let pipeline = Arc::new(pipeline(
        settings(&dir),
        extractor,
        Arc::new(FileFetcher {
            len: 64 * 1024,
            delay: Duration::from_millis(20),
        }),
        inspector,
        no_transcode(),
    ));
    let first_sink = Arc::new(RecordingSink::default());
    let second_sink = Arc::new(RecordingSink::default());

    let first = Request::new(SOURCE, "user-1");
    let second = Request::new(SOURCE, "user-2");
    assert_ne!(first.id, second.id);
    let first_path = pipeline
        .workspace()
        .allocate(&first.id, ScratchRole::Original);
    let second_path = pipeline
        .workspace()
        .allocate(&second.id, ScratchRole::Original);

    let (a, b) = tokio::join!(
        pipeline.run(first, first_sink.clone()),
        pipeline.run(second, second_sink.clone()),
    );
    assert!(a.is_delivered());
    assert!(b.is_delivered());

    let first_delivery = &first_sink.deliveries()[0][0];
    let second_delivery = &second_sink.deliveries()[0][0];
    assert_eq!(first_delivery.0, first_path);
    assert_eq!(second_delivery.0, second_path);
    assert_eq!(first_delivery.1, FileFetcher::body_for(&first_path, 64 * 1024));
    assert_eq!(second_delivery.1, FileFetcher::body_for(&second_path, 64 * 1024));
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_stale_files_are_swept_and_fresh_ones_kept() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(1024),
        inspector_from_disk(true),
        no_transcode(),
    );

    let stale = pipeline
        .workspace()
        .allocate("abandoned", ScratchRole::Compressed);
    let in_flight = pipeline
        .workspace()
        .allocate("other-request", ScratchRole::Original);
    std::fs::write(&stale, b"old").unwrap();
    std::fs::write(&in_flight, b"new").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&stale)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();

    let sink = Arc::new(RecordingSink::default());
    pipeline
        .run(Request::with_id("req-sweep", SOURCE, "user-1"), sink)
        .await;

    assert!(!stale.exists());
    assert!(in_flight.exists());
}

#[tokio::test]
async fn test_status_ticker_runs_during_fetch_and_stops_after() {
    let dir = TempDir::new().unwrap();
    let settings = PipelineSettings {
        status_interval: Duration::from_millis(10),
        ..settings(&dir)
    };
    let pipeline = pipeline(
        settings,
        extractor_ok(),
        Arc::new(FileFetcher {
            len: 1024,
            delay: Duration::from_millis(120),
        }),
        inspector_from_disk(true),
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    pipeline
        .run(Request::with_id("req-tick", SOURCE, "user-1"), sink.clone())
        .await;

    let frames = |sink: &RecordingSink| {
        sink.events()
            .iter()
            .filter(|event| matches!(event, SinkEvent::Status(text) if text.starts_with(messages::PROCESSING_FRAME)))
            .count()
    };
    let after_run = frames(&sink);
    assert!(after_run > 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(frames(&sink), after_run);
}

#[tokio::test]
async fn test_status_sink_failures_do_not_change_outcome() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(1024),
        inspector_from_disk(true),
        no_transcode(),
    );

    let outcome = pipeline
        .run(Request::with_id("req-broken", SOURCE, "user-1"), Arc::new(BrokenSink))
        .await;

    assert!(outcome.is_delivered());
    assert!(workspace_entries(&pipeline).is_empty());
}

fn special_settings(dir: &TempDir) -> PipelineSettings {
    PipelineSettings {
        special_user: Some(SpecialUser {
            id: "vip".to_string(),
            message: "Again?".to_string(),
        }),
        ..settings(dir)
    }
}

#[tokio::test]
async fn test_rejected_compressed_upload_is_compression_failure() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        special_settings(&dir),
        extractor_ok(),
        fetcher(12 * MIB),
        inspector_from_disk(true),
        shrinking_transcoder(),
    );
    let sink = Arc::new(RecordingSink::rejecting_uploads());

    let outcome = pipeline
        .run(Request::with_id("req-too-big", SOURCE, "vip"), sink.clone())
        .await;

    assert_eq!(
        outcome.stage,
        Stage::FailedCompression(CompressionFailure::Other)
    );
    assert!(!outcome.is_delivered());
    assert_eq!(sink.failures(), vec![messages::TRANSCODE_FAILED.to_string()]);
    assert!(!sink
        .events()
        .iter()
        .any(|event| matches!(event, SinkEvent::Special(_))));
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_rejected_direct_upload_fails_request() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        special_settings(&dir),
        extractor_ok(),
        fetcher(1024),
        inspector_from_disk(true),
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::rejecting_uploads());

    let outcome = pipeline
        .run(Request::with_id("req-rejected", SOURCE, "vip"), sink.clone())
        .await;

    assert_eq!(outcome.stage, Stage::FailedDelivery);
    assert!(outcome.delivered_bytes.is_none());
    assert_eq!(sink.failures(), vec![messages::DELIVERY_FAILED.to_string()]);
    assert!(!sink
        .events()
        .iter()
        .any(|event| matches!(event, SinkEvent::Special(_))));
    assert!(workspace_entries(&pipeline).is_empty());
}

#[tokio::test]
async fn test_command_with_invalid_link_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut extractor = MockLinkExtractor::new();
    extractor.expect_extract().never();
    let mut inspector = MockMediaInspector::new();
    inspector.expect_inspect().never();
    let pipeline = pipeline(settings(&dir), extractor, fetcher(1), inspector, no_transcode());
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .handle(
            Trigger::Command,
            "cmd-1",
            "https://www.youtube.com/watch?v=abc",
            "user-1",
            sink.clone(),
        )
        .await;

    assert!(outcome.is_none());
    assert_eq!(
        sink.events(),
        vec![SinkEvent::Failure(messages::INVALID_URL.to_string())]
    );
}

#[tokio::test]
async fn test_passive_scan_ignores_unrelated_messages() {
    let dir = TempDir::new().unwrap();
    let mut extractor = MockLinkExtractor::new();
    extractor.expect_extract().never();
    let mut inspector = MockMediaInspector::new();
    inspector.expect_inspect().never();
    let pipeline = pipeline(settings(&dir), extractor, fetcher(1), inspector, no_transcode());
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .handle(Trigger::PassiveScan, "msg-1", "anyone up for lunch?", "user-1", sink.clone())
        .await;

    assert!(outcome.is_none());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn test_passive_scan_runs_pipeline_for_embedded_link() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        settings(&dir),
        extractor_ok(),
        fetcher(1024),
        inspector_from_disk(true),
        no_transcode(),
    );
    let sink = Arc::new(RecordingSink::default());

    let outcome = pipeline
        .handle(
            Trigger::PassiveScan,
            "msg-2",
            &format!("check this out {}", SOURCE),
            "user-1",
            sink.clone(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.request_id, "msg-2");
    assert!(outcome.is_delivered());
    assert_eq!(sink.deliveries().len(), 1);
}

#[test]
fn test_stage_for_error_mapping() {
    assert_eq!(
        Stage::for_error(&RelayError::Upstream(String::new())),
        Stage::FailedExtraction
    );
    assert_eq!(
        Stage::for_error(&RelayError::TranscodeTimeout(60)),
        Stage::FailedCompression(CompressionFailure::Timeout)
    );
    assert_eq!(
        Stage::for_error(&RelayError::Delivery(String::new())),
        Stage::FailedDelivery
    );
    assert!(Stage::FailedAudioOnly.is_terminal());
    assert!(Stage::Delivered.is_terminal());
    assert!(!Stage::Compressing.is_terminal());
    assert!(!Stage::Delivered.is_failure());
}
