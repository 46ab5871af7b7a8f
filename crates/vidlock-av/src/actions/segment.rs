//! Fixed-duration segmentation using ffmpeg's segment muxer with `-c copy`.

use std::path::{Path, PathBuf};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// File name prefix of produced segments: `segment_000.<ext>`, `segment_001.<ext>`, ...
const SEGMENT_PREFIX: &str = "segment_";

/// Segmentation parameters.
#[derive(Debug, Clone)]
pub struct SegmentSpec {
    /// Target duration of each segment in seconds.
    pub duration_secs: u32,
}

impl Default for SegmentSpec {
    fn default() -> Self {
        Self { duration_secs: 10 }
    }
}

/// Container extension of `input`, defaulting to `mp4`.
fn extension_of(input: &Path) -> String {
    input
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "mp4".to_string())
}

/// Split `input` into segments inside `output_dir`.
///
/// Returns the produced segment paths in playback order. An ffmpeg run that
/// succeeds without writing any segment yields an empty list.
pub async fn split_segments(
    tools: &ToolRegistry,
    input: &Path,
    output_dir: &Path,
    spec: &SegmentSpec,
) -> vidlock_core::Result<Vec<PathBuf>> {
    if spec.duration_secs == 0 {
        return Err(vidlock_core::Error::Validation(
            "segment duration must be positive".into(),
        ));
    }

    let ffmpeg = tools.require("ffmpeg")?;

    std::fs::create_dir_all(output_dir).map_err(|e| {
        vidlock_core::Error::Internal(format!(
            "Failed to create segment output dir {}: {e}",
            output_dir.display()
        ))
    })?;

    let ext = extension_of(input);
    let pattern = output_dir.join(format!("{SEGMENT_PREFIX}%03d.{ext}"));

    tracing::info!(
        "Segment: {:?} -> {:?} (segment_duration={}s)",
        input,
        output_dir,
        spec.duration_secs
    );

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.timeout(ffmpeg.timeout);
    cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]);
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.args(["-c", "copy", "-map", "0", "-f", "segment"]);
    cmd.args(["-segment_time", &spec.duration_secs.to_string()]);
    cmd.args(["-reset_timestamps", "1"]);
    cmd.arg(pattern.to_string_lossy().as_ref());
    cmd.execute().await?;

    let segments = list_segments(output_dir, &ext)?;
    if segments.is_empty() {
        tracing::warn!("Segmenting {:?} produced no files in {:?}", input, output_dir);
    }

    Ok(segments)
}

/// Discover segment files in `dir` and order them by their numeric position.
///
/// Only `segment_<digits>.<ext>` files are considered. Ordering is numeric, so
/// `segment_1000` follows `segment_999`.
pub fn list_segments(dir: &Path, ext: &str) -> vidlock_core::Result<Vec<PathBuf>> {
    let suffix = format!(".{ext}");
    let mut found: Vec<(u64, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();

        let Some(number) = name
            .strip_prefix(SEGMENT_PREFIX)
            .and_then(|rest| rest.strip_suffix(&suffix))
        else {
            continue;
        };
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(n) = number.parse::<u64>() {
            found.push((n, entry.path()));
        }
    }

    found.sort_by_key(|(n, _)| *n);
    Ok(found.into_iter().map(|(_, p)| p).collect())
}
