//! # vidlock-av
//!
//! External tool management and ffmpeg actions for the vidlock pipeline.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache the ffmpeg path.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Action functions** ([`actions`]) -- burn a visible watermark into a
//!   video and re-split it into fixed-duration segments.

pub mod actions;
pub mod command;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};

// Action functions
pub use actions::{apply_watermark, split_segments, SegmentSpec, WatermarkSpec};
