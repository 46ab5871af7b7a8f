//! Capability traits for each pipeline stage.
//!
//! The orchestrator only sees these traits. Concrete implementations live in
//! [`crate::stages`] (ffmpeg, AES-GCM) and in the transport/storage crates
//! (NATS, Vault, IPFS).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use vidlock_core::{Locator, ProcessingEvent, Result, SegmentId, VideoId, Workspace};

use crate::key::SegmentKey;
use crate::orchestrator::RunReport;

/// Retrieves a video's chunk stream and reassembles it into one file.
#[async_trait]
pub trait ChunkFetcher: Send + Sync {
    /// Write the reassembled asset into `workspace` and return its path.
    async fn fetch(&self, video_id: &VideoId, workspace: &Workspace) -> Result<PathBuf>;
}

/// Burns a visible mark into a video.
#[async_trait]
pub trait Watermarker: Send + Sync {
    /// Write the watermarked copy of `input` into `workspace`.
    async fn apply(&self, input: &Path, workspace: &Workspace) -> Result<PathBuf>;
}

/// Re-segments a video into fixed-duration parts.
#[async_trait]
pub trait Splitter: Send + Sync {
    /// Produce segment files inside `workspace`, in playback order.
    async fn split(&self, input: &Path, workspace: &Workspace) -> Result<Vec<PathBuf>>;
}

/// Output of [`SegmentEncryptor::encrypt`].
#[derive(Debug)]
pub struct EncryptedSegment {
    /// Sealed file (nonce prepended to ciphertext).
    pub path: PathBuf,
    /// The key that sealed it.
    pub key: SegmentKey,
}

/// Seals one segment under a freshly generated key.
#[async_trait]
pub trait SegmentEncryptor: Send + Sync {
    async fn encrypt(&self, segment: &Path, workspace: &Workspace) -> Result<EncryptedSegment>;
}

/// Persists segment keys in a secrets store.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Idempotent put of `key` under `(video_id, segment_id)`.
    async fn save(&self, video_id: &VideoId, segment_id: &SegmentId, key: &SegmentKey)
        -> Result<()>;
}

/// Pushes a blob to content-addressed storage.
#[async_trait]
pub trait ContentUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<Locator>;
}

/// Publishes progress and completion events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ProcessingEvent) -> Result<()>;
}

/// Something that can process one video end to end.
#[async_trait]
pub trait VideoProcessor: Send + Sync {
    async fn process(&self, video_id: &VideoId) -> Result<RunReport>;
}
