//! Burn a visible text watermark into a video with ffmpeg `drawtext`.

use std::path::{Path, PathBuf};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Appearance of the watermark.
#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    /// Text to draw.
    pub text: String,
    /// TrueType font file; ffmpeg's fontconfig default when `None`.
    pub font_path: Option<PathBuf>,
    pub font_size: u32,
    pub font_color: String,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: "VIDLOCK".into(),
            font_path: None,
            font_size: 24,
            font_color: "white".into(),
        }
    }
}

/// Escape a value for use inside a single-quoted drawtext option.
fn escape_drawtext(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '\'' | ':' | '%' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Build the `-vf` filter string: text in the bottom-left corner, 10px in.
pub fn drawtext_filter(spec: &WatermarkSpec) -> String {
    let mut filter = String::from("drawtext=");
    if let Some(ref font) = spec.font_path {
        filter.push_str(&format!(
            "fontfile='{}':",
            escape_drawtext(&font.to_string_lossy())
        ));
    }
    filter.push_str(&format!(
        "text='{}':fontcolor={}:fontsize={}:x=10:y=H-th-10",
        escape_drawtext(&spec.text),
        spec.font_color,
        spec.font_size
    ));
    filter
}

/// Apply the watermark to `input`, writing the result to `output`.
///
/// Video is re-encoded with the text burned in; audio streams are copied
/// through unmodified.
pub async fn apply_watermark(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    spec: &WatermarkSpec,
) -> vidlock_core::Result<()> {
    let ffmpeg = tools.require("ffmpeg")?;

    tracing::info!("Watermark: {:?} -> {:?}", input, output);

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.timeout(ffmpeg.timeout);
    cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]);
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.args(["-vf", &drawtext_filter(spec)]);
    cmd.args(["-codec:a", "copy"]);
    cmd.arg(output.to_string_lossy().as_ref());
    cmd.execute().await?;

    if !output.exists() {
        return Err(vidlock_core::Error::tool(
            "ffmpeg",
            format!("watermark produced no output at {}", output.display()),
        ));
    }

    Ok(())
}
