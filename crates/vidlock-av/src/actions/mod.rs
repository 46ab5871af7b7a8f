//! Media processing actions: visible watermarking and fixed-duration
//! segmentation, both via ffmpeg.

mod segment;
mod watermark;

pub use segment::{list_segments, split_segments, SegmentSpec};
pub use watermark::{apply_watermark, drawtext_filter, WatermarkSpec};
