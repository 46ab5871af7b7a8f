//! Built-in stage implementations.
//!
//! - [`media`] -- watermark and split adapters over the ffmpeg actions in
//!   `vidlock-av`.
//! - [`encrypt`] -- AES-256-GCM segment sealing.

pub mod encrypt;
pub mod media;

pub use encrypt::{open, seal, AesGcmEncryptor};
pub use media::{FfmpegSplitter, FfmpegWatermarker};
