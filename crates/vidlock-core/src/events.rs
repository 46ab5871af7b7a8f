//! Message contracts shared with the upload front-end and the metadata tracker.
//!
//! Subjects, header names and the JSON bodies of progress/completed events
//! live here so producers and consumers agree on one definition.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::VideoId;
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// Subjects and headers
// ---------------------------------------------------------------------------

/// Fixed subject of the "video ready" notification.
pub const READY_SUBJECT: &str = "video.events";
/// Pattern covering every video's chunk subject.
pub const UPLOAD_SUBJECT_PATTERN: &str = "video.uploads.*";
/// Pattern covering every video's progress subject.
pub const PROGRESS_SUBJECT_PATTERN: &str = "video.progress.*";
/// Pattern covering every video's completed subject.
pub const PROCESSED_SUBJECT_PATTERN: &str = "video.processed.*";

/// Subjects the durable stream must cover.
pub const REQUIRED_SUBJECTS: [&str; 4] = [
    UPLOAD_SUBJECT_PATTERN,
    READY_SUBJECT,
    PROCESSED_SUBJECT_PATTERN,
    PROGRESS_SUBJECT_PATTERN,
];

/// Header names used on bus messages.
pub mod headers {
    /// Video identifier (chunks and ready notifications).
    pub const VIDEO_ID: &str = "Video-ID";
    /// Uploading user (ready notifications).
    pub const USER_ID: &str = "User-ID";
    /// Original file name (ready notifications).
    pub const FILE_NAME: &str = "File-Name";
    /// Zero-based chunk position (chunk messages).
    pub const CHUNK_IDX: &str = "Chunk-Idx";
}

/// Subject carrying the chunks of `video_id`.
pub fn upload_subject(video_id: &VideoId) -> String {
    format!("video.uploads.{video_id}")
}

/// Subject carrying progress events of `video_id`.
pub fn progress_subject(video_id: &VideoId) -> String {
    format!("video.progress.{video_id}")
}

/// Subject carrying the completed event of `video_id`.
pub fn processed_subject(video_id: &VideoId) -> String {
    format!("video.processed.{video_id}")
}

// ---------------------------------------------------------------------------
// Locator
// ---------------------------------------------------------------------------

/// Scheme-prefixed, independently resolvable content locator
/// (`scheme://<content-id>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    /// Build a locator from a scheme and a content identifier.
    pub fn new(scheme: &str, content_id: &str) -> Self {
        Self(format!("{scheme}://{content_id}"))
    }

    /// Parse an existing locator string, requiring a non-empty scheme and id.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once("://") {
            Some((scheme, id)) if !scheme.is_empty() && !id.is_empty() => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(Error::Validation(format!("invalid locator: {raw:?}"))),
        }
    }

    /// The scheme marker (e.g. `ipfs`).
    pub fn scheme(&self) -> &str {
        self.0.split_once("://").map(|(s, _)| s).unwrap_or_default()
    }

    /// The content identifier after the scheme marker.
    pub fn content_id(&self) -> &str {
        self.0.split_once("://").map(|(_, id)| id).unwrap_or_default()
    }

    /// Borrow the full locator string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Compute the progress percent after segment `index` of `total` finished.
///
/// `(index + 1) * 100 / total`, clamped to `1..=100` so very long videos
/// never publish a zero.
pub fn progress_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (index + 1).saturating_mul(100) / total;
    pct.clamp(1, 100) as u8
}

/// Body of a progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub video_id: VideoId,
    pub progress: u8,
}

/// Terminal status carried by completed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Processed,
}

/// Body of a completed event.
///
/// `url` is the field name the metadata tracker reads. The segment counters
/// are additive: a consumer that ignores them sees the original contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedEvent {
    pub video_id: VideoId,
    pub status: CompletionStatus,
    #[serde(rename = "url")]
    pub locator: Locator,
    #[serde(default)]
    pub segments_total: usize,
    #[serde(default)]
    pub segments_uploaded: usize,
}

impl CompletedEvent {
    /// Whether every segment produced by the split was uploaded.
    pub fn is_complete(&self) -> bool {
        self.segments_uploaded == self.segments_total
    }
}

/// An event emitted by the processor for one video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProcessingEvent {
    Progress(ProgressEvent),
    Completed(CompletedEvent),
}

impl ProcessingEvent {
    /// Progress event for `video_id` at `percent`.
    pub fn progress(video_id: VideoId, percent: u8) -> Self {
        ProcessingEvent::Progress(ProgressEvent {
            video_id,
            progress: percent.clamp(1, 100),
        })
    }

    /// Completed event for `video_id`.
    pub fn completed(
        video_id: VideoId,
        locator: Locator,
        segments_total: usize,
        segments_uploaded: usize,
    ) -> Self {
        ProcessingEvent::Completed(CompletedEvent {
            video_id,
            status: CompletionStatus::Processed,
            locator,
            segments_total,
            segments_uploaded,
        })
    }

    /// The video this event belongs to.
    pub fn video_id(&self) -> &VideoId {
        match self {
            ProcessingEvent::Progress(p) => &p.video_id,
            ProcessingEvent::Completed(c) => &c.video_id,
        }
    }

    /// Subject this event is published on.
    pub fn subject(&self) -> String {
        match self {
            ProcessingEvent::Progress(p) => progress_subject(&p.video_id),
            ProcessingEvent::Completed(c) => processed_subject(&c.video_id),
        }
    }

    /// Serialize the event body.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("event serialization failed: {e}")))
    }
}
