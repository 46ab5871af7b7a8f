//! Stage adapters over the ffmpeg actions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use vidlock_av::{apply_watermark, split_segments, SegmentSpec, ToolRegistry, WatermarkSpec};
use vidlock_core::{Result, Workspace};

use crate::stage::{Splitter, Watermarker};

fn extension_or_mp4(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "mp4".to_string())
}

/// Burns the configured text watermark with ffmpeg `drawtext`.
pub struct FfmpegWatermarker {
    tools: Arc<ToolRegistry>,
    spec: WatermarkSpec,
}

impl FfmpegWatermarker {
    pub fn new(tools: Arc<ToolRegistry>, spec: WatermarkSpec) -> Self {
        Self { tools, spec }
    }
}

#[async_trait]
impl Watermarker for FfmpegWatermarker {
    async fn apply(&self, input: &Path, workspace: &Workspace) -> Result<PathBuf> {
        let output = workspace.unique_file("watermarked", &extension_or_mp4(input));
        apply_watermark(&self.tools, input, &output, &self.spec).await?;
        Ok(output)
    }
}

/// Splits into fixed-duration segments with ffmpeg's segment muxer.
pub struct FfmpegSplitter {
    tools: Arc<ToolRegistry>,
    spec: SegmentSpec,
}

impl FfmpegSplitter {
    pub fn new(tools: Arc<ToolRegistry>, spec: SegmentSpec) -> Self {
        Self { tools, spec }
    }
}

#[async_trait]
impl Splitter for FfmpegSplitter {
    async fn split(&self, input: &Path, workspace: &Workspace) -> Result<Vec<PathBuf>> {
        let dir = workspace.temp_file("segments");
        split_segments(&self.tools, input, &dir, &self.spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidlock_core::VideoId;

    fn workspace(root: &Path) -> Workspace {
        Workspace::create(root, &VideoId::parse("media-test").unwrap()).unwrap()
    }

    #[test]
    fn extension_falls_back_to_mp4() {
        assert_eq!(extension_or_mp4(Path::new("raw")), "mp4");
        assert_eq!(extension_or_mp4(Path::new("raw.mov")), "mov");
    }

    #[tokio::test]
    async fn watermarker_without_ffmpeg_fails() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path());
        let stage = FfmpegWatermarker::new(
            Arc::new(ToolRegistry::from_configs([])),
            WatermarkSpec::default(),
        );
        let err = stage.apply(&ws.temp_file("raw.mp4"), &ws).await.unwrap_err();
        assert!(matches!(err, vidlock_core::Error::Tool { .. }));
    }

    #[tokio::test]
    async fn splitter_without_ffmpeg_fails() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path());
        let stage = FfmpegSplitter::new(
            Arc::new(ToolRegistry::from_configs([])),
            SegmentSpec::default(),
        );
        let err = stage.split(&ws.temp_file("wm.mp4"), &ws).await.unwrap_err();
        assert!(matches!(err, vidlock_core::Error::Tool { .. }));
    }
}
