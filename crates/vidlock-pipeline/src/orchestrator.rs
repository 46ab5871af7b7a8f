//! Per-video run orchestration.
//!
//! A run moves strictly forward through
//! `Started -> Fetched -> Watermarked -> Split -> Segments -> Completed`.
//! Any failure before `Split` aborts the run with a stage-tagged
//! [`vidlock_core::Error::Pipeline`]. After `Split`, failures are isolated to the segment
//! they happened in: the segment is skipped, the run continues, and the
//! completed event is still published.
//!
//! Every transient file lives in a per-run [`Workspace`], dropped on every exit
//! path (including unwinding), so nothing outlives the run.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;

use vidlock_core::events::progress_percent;
use vidlock_core::{Locator, ProcessingEvent, Result, SegmentId, TransientFile, VideoId, Workspace};

use crate::stage::{
    ChunkFetcher, ContentUploader, EventPublisher, KeyStore, SegmentEncryptor, Splitter,
    VideoProcessor, Watermarker,
};

/// Lifecycle of one run. Transitions are strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Started,
    Fetched,
    Watermarked,
    Split,
    Segments,
    Completed,
}

/// Per-segment step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStage {
    Encrypt,
    Upload,
}

impl std::fmt::Display for SegmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentStage::Encrypt => f.write_str("encrypt"),
            SegmentStage::Upload => f.write_str("upload"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentFailure {
    pub stage: SegmentStage,
    pub message: String,
}

/// What happened to one segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentOutcome {
    /// Zero-based position in the split output.
    pub position: usize,
    pub segment_id: SegmentId,
    /// Whether the key write succeeded. Key storage is best-effort.
    pub key_stored: bool,
    /// Set when the upload succeeded.
    pub locator: Option<Locator>,
    pub failure: Option<SegmentFailure>,
}

impl SegmentOutcome {
    pub fn is_uploaded(&self) -> bool {
        self.locator.is_some()
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub video_id: VideoId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Asset-level locator carried by the completed event.
    pub locator: Locator,
    pub segments: Vec<SegmentOutcome>,
    pub completion_published: bool,
}

impl RunReport {
    pub fn segments_total(&self) -> usize {
        self.segments.len()
    }

    pub fn segments_uploaded(&self) -> usize {
        self.segments.iter().filter(|s| s.is_uploaded()).count()
    }

    /// Segments that were skipped, in position order.
    pub fn skipped(&self) -> impl Iterator<Item = &SegmentOutcome> {
        self.segments.iter().filter(|s| s.failure.is_some())
    }

    /// True when every produced segment was uploaded.
    pub fn is_complete(&self) -> bool {
        self.segments_uploaded() == self.segments_total()
    }
}

/// The injected capabilities one run uses.
#[derive(Clone)]
pub struct Stages {
    pub fetcher: Arc<dyn ChunkFetcher>,
    pub watermarker: Arc<dyn Watermarker>,
    pub splitter: Arc<dyn Splitter>,
    pub encryptor: Arc<dyn SegmentEncryptor>,
    pub key_store: Arc<dyn KeyStore>,
    pub uploader: Arc<dyn ContentUploader>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// Drives a single video through the whole pipeline.
pub struct Orchestrator {
    stages: Stages,
    work_root: PathBuf,
    segment_concurrency: usize,
    locator_scheme: String,
}

impl Orchestrator {
    /// Create an orchestrator whose run workspaces live under `work_root`.
    pub fn new(stages: Stages, work_root: impl Into<PathBuf>) -> Self {
        Self {
            stages,
            work_root: work_root.into(),
            segment_concurrency: 1,
            locator_scheme: "ipfs".to_string(),
        }
    }

    /// Number of segments in flight at once. Progress stays in position order
    /// regardless.
    pub fn with_segment_concurrency(mut self, n: usize) -> Self {
        self.segment_concurrency = n.max(1);
        self
    }

    /// Scheme of the asset-level locator in the completed event.
    pub fn with_locator_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.locator_scheme = scheme.into();
        self
    }

    /// Process `video_id` end to end.
    ///
    /// # Errors
    ///
    /// Returns [`vidlock_core::Error::Pipeline`] tagged `workspace`, `fetch`, `watermark` or
    /// `split` when a whole-asset stage fails. Per-segment and publish
    /// failures never surface here; they are recorded in the [`RunReport`].
    pub async fn run(&self, video_id: &VideoId) -> Result<RunReport> {
        let started_at = Utc::now();
        let mut state = RunState::Started;

        let workspace =
            Workspace::create(&self.work_root, video_id).map_err(|e| e.in_stage("workspace"))?;

        tracing::info!(video_id = %video_id, workspace = %workspace.path().display(), "Run started");

        let raw = self
            .stages
            .fetcher
            .fetch(video_id, &workspace)
            .await
            .map_err(|e| e.in_stage("fetch"))?;
        let raw = TransientFile::new(raw);
        advance(&mut state, RunState::Fetched);

        let watermarked = self.stages.watermarker.apply(raw.path(), &workspace).await;
        drop(raw);
        let watermarked = TransientFile::new(watermarked.map_err(|e| e.in_stage("watermark"))?);
        advance(&mut state, RunState::Watermarked);

        let segments = self.stages.splitter.split(watermarked.path(), &workspace).await;
        drop(watermarked);
        let segments: Vec<TransientFile> = segments
            .map_err(|e| e.in_stage("split"))?
            .into_iter()
            .map(TransientFile::new)
            .collect();
        advance(&mut state, RunState::Split);

        let total = segments.len();
        tracing::info!(video_id = %video_id, segments = total, "Processing segments");
        advance(&mut state, RunState::Segments);

        let mut segments_done = Vec::with_capacity(total);
        {
            let outcomes = futures::stream::iter(segments.into_iter().enumerate())
                .map(|(position, segment)| {
                    self.process_segment(video_id, &workspace, position, segment)
                })
                .buffered(self.segment_concurrency);
            let mut outcomes = std::pin::pin!(outcomes);

            while let Some(outcome) = outcomes.next().await {
                if outcome.is_uploaded() {
                    let event = ProcessingEvent::progress(
                        video_id.clone(),
                        progress_percent(outcome.position, total),
                    );
                    self.publish(&event).await;
                }
                segments_done.push(outcome);
            }
        }

        let locator = Locator::new(&self.locator_scheme, &format!("video/{video_id}"));
        let uploaded = segments_done.iter().filter(|s| s.is_uploaded()).count();
        let completed =
            ProcessingEvent::completed(video_id.clone(), locator.clone(), total, uploaded);
        let completion_published = self.publish(&completed).await;
        advance(&mut state, RunState::Completed);

        if let Err(e) = workspace.close() {
            tracing::warn!(video_id = %video_id, error = %e, "Workspace cleanup failed");
        }

        tracing::info!(
            video_id = %video_id,
            segments_total = total,
            segments_uploaded = uploaded,
            "Run completed"
        );

        Ok(RunReport {
            video_id: video_id.clone(),
            started_at,
            finished_at: Utc::now(),
            locator,
            segments: segments_done,
            completion_published,
        })
    }

    /// Encrypt, store the key and upload one segment.
    ///
    /// The plaintext segment and its ciphertext are released when this returns.
    async fn process_segment(
        &self,
        video_id: &VideoId,
        workspace: &Workspace,
        position: usize,
        segment: TransientFile,
    ) -> SegmentOutcome {
        let segment_id = SegmentId::new(video_id, position);
        let mut outcome = SegmentOutcome {
            position,
            segment_id: segment_id.clone(),
            key_stored: false,
            locator: None,
            failure: None,
        };

        let encrypted = match self.stages.encryptor.encrypt(segment.path(), workspace).await {
            Ok(encrypted) => encrypted,
            Err(e) => {
                tracing::warn!(segment_id = %segment_id, error = %e, "Encryption failed; skipping segment");
                outcome.failure = Some(SegmentFailure {
                    stage: SegmentStage::Encrypt,
                    message: e.to_string(),
                });
                return outcome;
            }
        };
        drop(segment);
        let sealed = TransientFile::new(&encrypted.path);

        match self
            .stages
            .key_store
            .save(video_id, &segment_id, &encrypted.key)
            .await
        {
            Ok(()) => outcome.key_stored = true,
            Err(e) => {
                tracing::warn!(segment_id = %segment_id, error = %e, "Key store write failed; continuing");
            }
        }

        match self.stages.uploader.upload(sealed.path()).await {
            Ok(locator) => {
                tracing::debug!(segment_id = %segment_id, locator = %locator, "Segment uploaded");
                outcome.locator = Some(locator);
            }
            Err(e) => {
                tracing::warn!(segment_id = %segment_id, error = %e, "Upload failed; skipping segment");
                outcome.failure = Some(SegmentFailure {
                    stage: SegmentStage::Upload,
                    message: e.to_string(),
                });
            }
        }

        outcome
    }

    /// Publish `event`, logging failures. Returns whether it was accepted.
    async fn publish(&self, event: &ProcessingEvent) -> bool {
        match self.stages.publisher.publish(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(video_id = %event.video_id(), subject = %event.subject(), error = %e, "Event publish failed");
                false
            }
        }
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug_assert!(next > *state, "run state moved backwards: {state:?} -> {next:?}");
    tracing::trace!(from = ?state, to = ?next, "Run state");
    *state = next;
}

#[async_trait]
impl VideoProcessor for Orchestrator {
    async fn process(&self, video_id: &VideoId) -> Result<RunReport> {
        self.run(video_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::key::SegmentKey;
    use crate::stage::EncryptedSegment;
    use crate::stages::AesGcmEncryptor;
    use vidlock_core::Error;

    // -- Fakes ---------------------------------------------------------------

    struct FakeFetcher {
        fail: bool,
    }

    #[async_trait]
    impl ChunkFetcher for FakeFetcher {
        async fn fetch(&self, _video_id: &VideoId, ws: &Workspace) -> Result<PathBuf> {
            if self.fail {
                return Err(Error::transport("stream unavailable"));
            }
            let path = ws.temp_file("raw.mp4");
            std::fs::write(&path, b"raw video")?;
            Ok(path)
        }
    }

    struct FakeWatermarker {
        fail: bool,
    }

    #[async_trait]
    impl Watermarker for FakeWatermarker {
        async fn apply(&self, input: &Path, ws: &Workspace) -> Result<PathBuf> {
            assert!(input.exists(), "watermark input must exist");
            if self.fail {
                return Err(Error::tool("ffmpeg", "exit 1"));
            }
            let out = ws.temp_file("watermarked.mp4");
            std::fs::copy(input, &out)?;
            Ok(out)
        }
    }

    #[derive(Clone, Copy)]
    enum SplitMode {
        Segments(usize),
        Fail,
        Panic,
    }

    struct FakeSplitter {
        mode: SplitMode,
    }

    #[async_trait]
    impl Splitter for FakeSplitter {
        async fn split(&self, _input: &Path, ws: &Workspace) -> Result<Vec<PathBuf>> {
            match self.mode {
                SplitMode::Segments(n) => (0..n)
                    .map(|i| {
                        let p = ws.temp_file(&format!("segment_{i:03}.mp4"));
                        std::fs::write(&p, format!("segment {i}"))?;
                        Ok(p)
                    })
                    .collect(),
                SplitMode::Fail => Err(Error::tool("ffmpeg", "segmenter failed")),
                SplitMode::Panic => panic!("splitter blew up"),
            }
        }
    }

    /// Real AES-GCM encryption except for the listed segment file names.
    struct SelectiveEncryptor {
        fail_names: HashSet<String>,
    }

    #[async_trait]
    impl SegmentEncryptor for SelectiveEncryptor {
        async fn encrypt(&self, segment: &Path, ws: &Workspace) -> Result<EncryptedSegment> {
            let name = segment.file_name().unwrap().to_string_lossy().to_string();
            if self.fail_names.contains(&name) {
                return Err(Error::Crypto("rng unavailable".into()));
            }
            AesGcmEncryptor::new().encrypt(segment, ws).await
        }
    }

    #[derive(Default)]
    struct RecordingKeyStore {
        fail: bool,
        saved: Mutex<Vec<(String, [u8; 32], [u8; 12])>>,
    }

    #[async_trait]
    impl KeyStore for RecordingKeyStore {
        async fn save(&self, _video_id: &VideoId, segment_id: &SegmentId, key: &SegmentKey) -> Result<()> {
            self.saved
                .lock()
                .unwrap()
                .push((segment_id.to_string(), *key.key_bytes(), *key.nonce()));
            if self.fail {
                return Err(Error::KeyStore("vault sealed".into()));
            }
            Ok(())
        }
    }

    /// Uploads succeed unless the ciphertext was produced from a listed
    /// segment stem. Earlier segments can be made slower than later ones.
    #[derive(Default)]
    struct FakeUploader {
        fail_stems: HashSet<String>,
        stagger: bool,
        count: AtomicUsize,
    }

    #[async_trait]
    impl ContentUploader for FakeUploader {
        async fn upload(&self, path: &Path) -> Result<Locator> {
            assert!(path.exists(), "ciphertext must exist during upload");
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            let position: u64 = name[8..11].parse().unwrap();
            if self.stagger {
                tokio::time::sleep(Duration::from_millis((10 - position.min(9)) * 10)).await;
            }
            if self.fail_stems.iter().any(|s| name.starts_with(s)) {
                return Err(Error::Upload("ipfs 500".into()));
            }
            let n = self.count.fetch_add(1, Ordering::SeqCst);
            Ok(Locator::new("ipfs", &format!("Qm{n}")))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        fail: bool,
        events: Mutex<Vec<ProcessingEvent>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: &ProcessingEvent) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(Error::publish("no responders"));
            }
            Ok(())
        }
    }

    impl RecordingPublisher {
        fn progress(&self) -> Vec<u8> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ProcessingEvent::Progress(p) => Some(p.progress),
                    _ => None,
                })
                .collect()
        }

        fn completions(&self) -> Vec<vidlock_core::CompletedEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ProcessingEvent::Completed(c) => Some(c.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    // -- Harness -------------------------------------------------------------

    struct Harness {
        root: tempfile::TempDir,
        fetch_fails: bool,
        watermark_fails: bool,
        split: SplitMode,
        encrypt_fails: HashSet<String>,
        key_store: Arc<RecordingKeyStore>,
        uploader: Arc<FakeUploader>,
        publisher: Arc<RecordingPublisher>,
        concurrency: usize,
    }

    impl Harness {
        fn new(segments: usize) -> Self {
            Self {
                root: tempfile::tempdir().unwrap(),
                fetch_fails: false,
                watermark_fails: false,
                split: SplitMode::Segments(segments),
                encrypt_fails: HashSet::new(),
                key_store: Arc::new(RecordingKeyStore::default()),
                uploader: Arc::new(FakeUploader::default()),
                publisher: Arc::new(RecordingPublisher::default()),
                concurrency: 1,
            }
        }

        fn orchestrator(&self) -> Orchestrator {
            let stages = Stages {
                fetcher: Arc::new(FakeFetcher { fail: self.fetch_fails }),
                watermarker: Arc::new(FakeWatermarker { fail: self.watermark_fails }),
                splitter: Arc::new(FakeSplitter { mode: self.split }),
                encryptor: Arc::new(SelectiveEncryptor {
                    fail_names: self.encrypt_fails.clone(),
                }),
                key_store: self.key_store.clone(),
                uploader: self.uploader.clone(),
                publisher: self.publisher.clone(),
            };
            Orchestrator::new(stages, self.root.path()).with_segment_concurrency(self.concurrency)
        }

        fn root_is_empty(&self) -> bool {
            std::fs::read_dir(self.root.path()).unwrap().next().is_none()
        }
    }

    fn vid() -> VideoId {
        VideoId::parse("vid-42").unwrap()
    }

    // -- Tests ---------------------------------------------------------------

    #[tokio::test]
    async fn all_segments_succeed() {
        let h = Harness::new(3);
        let report = h.orchestrator().run(&vid()).await.unwrap();

        assert_eq!(report.segments_total(), 3);
        assert_eq!(report.segments_uploaded(), 3);
        assert!(report.is_complete());
        assert!(report.completion_published);
        assert_eq!(h.publisher.progress(), [33, 66, 100]);

        let completions = h.publisher.completions();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].locator.as_str(), "ipfs://video/vid-42");
        assert_eq!(completions[0].segments_total, 3);

        let saved = h.key_store.saved.lock().unwrap();
        let ids: Vec<&str> = saved.iter().map(|(id, _, _)| id.as_str()).collect();
        assert_eq!(ids, ["vid-42_000", "vid-42_001", "vid-42_002"]);
        assert!(h.root_is_empty());
    }

    #[tokio::test]
    async fn completion_is_published_last() {
        let h = Harness::new(2);
        h.orchestrator().run(&vid()).await.unwrap();
        let events = h.publisher.events.lock().unwrap();
        assert!(matches!(events.last(), Some(ProcessingEvent::Completed(_))));
        assert_eq!(
            events.iter().filter(|e| matches!(e, ProcessingEvent::Completed(_))).count(),
            1
        );
    }

    #[tokio::test]
    async fn encryption_failure_skips_only_that_segment() {
        let mut h = Harness::new(3);
        h.encrypt_fails.insert("segment_001.mp4".into());
        let report = h.orchestrator().run(&vid()).await.unwrap();

        assert_eq!(h.publisher.progress(), [33, 100]);
        assert_eq!(h.publisher.completions().len(), 1);
        assert_eq!(h.key_store.saved.lock().unwrap().len(), 2);

        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].position, 1);
        assert_eq!(skipped[0].failure.as_ref().unwrap().stage, SegmentStage::Encrypt);
        assert!(h.root_is_empty());
    }

    #[tokio::test]
    async fn upload_failure_keeps_the_stored_key() {
        let mut h = Harness::new(3);
        h.uploader = Arc::new(FakeUploader {
            fail_stems: HashSet::from(["segment_002".to_string()]),
            ..Default::default()
        });
        let report = h.orchestrator().run(&vid()).await.unwrap();

        assert_eq!(h.publisher.progress(), [33, 66]);
        assert_eq!(report.segments_uploaded(), 2);
        assert!(!report.is_complete());
        // The key write happened before the failed upload.
        assert_eq!(h.key_store.saved.lock().unwrap().len(), 3);
        let completions = h.publisher.completions();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].segments_uploaded, 2);
        assert!(!completions[0].is_complete());
    }

    #[tokio::test]
    async fn key_store_failure_does_not_block_upload() {
        let mut h = Harness::new(2);
        h.key_store = Arc::new(RecordingKeyStore {
            fail: true,
            ..Default::default()
        });
        let report = h.orchestrator().run(&vid()).await.unwrap();

        assert_eq!(report.segments_uploaded(), 2);
        assert!(report.segments.iter().all(|s| !s.key_stored));
        assert_eq!(h.publisher.progress(), [50, 100]);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_without_events() {
        let mut h = Harness::new(3);
        h.fetch_fails = true;
        let err = h.orchestrator().run(&vid()).await.unwrap_err();

        assert_eq!(err.stage(), Some("fetch"));
        assert!(h.publisher.events.lock().unwrap().is_empty());
        assert!(h.root_is_empty());
    }

    #[tokio::test]
    async fn watermark_failure_aborts_and_cleans_up() {
        let mut h = Harness::new(3);
        h.watermark_fails = true;
        let err = h.orchestrator().run(&vid()).await.unwrap_err();

        assert_eq!(err.stage(), Some("watermark"));
        assert!(h.publisher.completions().is_empty());
        assert!(h.root_is_empty());
    }

    #[tokio::test]
    async fn split_failure_aborts_without_completion() {
        let mut h = Harness::new(0);
        h.split = SplitMode::Fail;
        let err = h.orchestrator().run(&vid()).await.unwrap_err();

        assert_eq!(err.stage(), Some("split"));
        assert!(err.to_string().contains("segmenter failed"));
        assert!(h.publisher.events.lock().unwrap().is_empty());
        assert!(h.root_is_empty());
    }

    #[tokio::test]
    async fn zero_segments_still_completes() {
        let h = Harness::new(0);
        let report = h.orchestrator().run(&vid()).await.unwrap();

        assert_eq!(report.segments_total(), 0);
        assert!(h.publisher.progress().is_empty());
        assert_eq!(h.publisher.completions().len(), 1);
    }

    #[tokio::test]
    async fn publish_failures_are_not_fatal() {
        let mut h = Harness::new(2);
        h.publisher = Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let report = h.orchestrator().run(&vid()).await.unwrap();

        assert_eq!(report.segments_uploaded(), 2);
        assert!(!report.completion_published);
        // Both progress events and the completion were still attempted.
        assert_eq!(h.publisher.events.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn concurrent_segments_report_progress_in_order() {
        let mut h = Harness::new(5);
        h.concurrency = 4;
        h.uploader = Arc::new(FakeUploader {
            stagger: true,
            ..Default::default()
        });
        let report = h.orchestrator().run(&vid()).await.unwrap();

        assert_eq!(h.publisher.progress(), [20, 40, 60, 80, 100]);
        let positions: Vec<usize> = report.segments.iter().map(|s| s.position).collect();
        assert_eq!(positions, [0, 1, 2, 3, 4]);
        assert!(h.root_is_empty());
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_ends_at_100() {
        for n in 1..=12 {
            let h = Harness::new(n);
            h.orchestrator().run(&vid()).await.unwrap();
            let progress = h.publisher.progress();
            assert_eq!(progress.len(), n);
            assert!(progress.windows(2).all(|w| w[0] <= w[1]), "n={n}: {progress:?}");
            assert_eq!(progress.last(), Some(&100));
        }
    }

    #[tokio::test]
    async fn every_segment_gets_a_distinct_key_and_nonce() {
        let h = Harness::new(6);
        h.orchestrator().run(&vid()).await.unwrap();
        let saved = h.key_store.saved.lock().unwrap();
        assert_eq!(saved.len(), 6);
        let keys: HashSet<[u8; 32]> = saved.iter().map(|(_, k, _)| *k).collect();
        let nonces: HashSet<[u8; 12]> = saved.iter().map(|(_, _, n)| *n).collect();
        assert_eq!(keys.len(), 6);
        assert_eq!(nonces.len(), 6);
    }

    #[tokio::test]
    async fn two_runs_for_same_video_are_isolated() {
        let h = Harness::new(3);
        let orch = h.orchestrator();
        let (v1, v2) = (vid(), vid());
        let (a, b) = tokio::join!(orch.run(&v1), orch.run(&v2));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(h.publisher.completions().len(), 2);
        assert!(h.root_is_empty());
    }

    #[tokio::test]
    async fn panic_in_stage_still_removes_workspace() {
        let mut h = Harness::new(0);
        h.split = SplitMode::Panic;
        let orch = Arc::new(h.orchestrator());
        let handle = tokio::spawn(async move { orch.run(&vid()).await });
        assert!(handle.await.unwrap_err().is_panic());
        assert!(h.root_is_empty());
    }

    #[test]
    fn report_serializes() {
        let report = RunReport {
            video_id: vid(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            locator: Locator::new("ipfs", "video/vid-42"),
            segments: vec![],
            completion_published: true,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["video_id"], "vid-42");
        assert_eq!(json["locator"], "ipfs://video/vid-42");
    }
}
