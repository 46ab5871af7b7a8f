//! # vidlock-pipeline
//!
//! Orchestration of the per-video processing run.
//!
//! This crate provides:
//!
//! - **Stage traits** ([`stage`]) -- one capability per pipeline step
//!   (fetch, watermark, split, encrypt, key store, upload, publish), injected
//!   into the orchestrator and replaced by fakes in tests.
//! - **[`SegmentKey`]** -- per-segment AES-256-GCM key and nonce.
//! - **Built-in stages** ([`stages`]) -- ffmpeg watermark/split adapters and
//!   the AES-256-GCM segment encryptor.
//! - **[`Orchestrator`]** -- runs whole-asset stages strictly in sequence,
//!   isolates per-segment failures, reports ordered progress and always
//!   reclaims the run's transient files.

pub mod key;
pub mod orchestrator;
pub mod stage;
pub mod stages;

// Re-export key types at the crate root.
pub use key::SegmentKey;
pub use orchestrator::{
    Orchestrator, RunReport, RunState, SegmentFailure, SegmentOutcome, SegmentStage, Stages,
};
pub use stage::{
    ChunkFetcher, ContentUploader, EncryptedSegment, EventPublisher, KeyStore, SegmentEncryptor,
    Splitter, VideoProcessor, Watermarker,
};
