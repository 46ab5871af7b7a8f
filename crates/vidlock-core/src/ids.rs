//! Identifier newtypes threaded through messages, file names and secret paths.
//!
//! A [`VideoId`] ends up inside NATS subjects (`video.uploads.<id>`), temp file
//! names and Vault paths, so it is restricted to ASCII alphanumerics, `-` and
//! `_`. Anything else is rejected at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Maximum accepted length of a video identifier.
const MAX_VIDEO_ID_LEN: usize = 128;

/// Opaque correlation key for one uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoId(String);

impl VideoId {
    /// Generate a fresh random identifier (UUID v4, hyphenated).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate and wrap an identifier received from the outside.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Validation("video id is empty".into()));
        }
        if raw.len() > MAX_VIDEO_ID_LEN {
            return Err(Error::Validation(format!(
                "video id exceeds {MAX_VIDEO_ID_LEN} characters"
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(Error::Validation(format!(
                "video id contains invalid character {bad:?}"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VideoId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VideoId {
    type Error = Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VideoId> for String {
    fn from(id: VideoId) -> Self {
        id.0
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one segment: `<videoID>_<position:03>`.
///
/// Stable and derivable from the video and the segment's split position; used
/// as the key-store addressing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    /// Derive the identifier for the segment at `position`.
    pub fn new(video_id: &VideoId, position: usize) -> Self {
        Self(format!("{video_id}_{position:03}"))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
