//! Application configuration types.
//!
//! The top-level [`Config`] struct carries all sub-configs for the bus, the
//! chunk fetcher, the secrets store, the content store, processing and
//! external tools. Every section defaults sensibly so an empty document is
//! valid. Loading from disk and environment overrides live in the binary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub nats: NatsConfig,
    pub fetch: FetchConfig,
    pub vault: VaultConfig,
    pub ipfs: IpfsConfig,
    pub processing: ProcessingConfig,
    pub tools: ToolsConfig,
    pub ingest: IngestConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.vault.token.is_empty() {
            warnings.push("vault.token is empty; key writes will be rejected".into());
        }

        if self.nats.ack_wait_secs < self.processing.tool_timeout_secs {
            warnings.push(format!(
                "nats.ack_wait_secs ({}) is shorter than processing.tool_timeout_secs ({}); \
                 long runs may see their notification redelivered",
                self.nats.ack_wait_secs, self.processing.tool_timeout_secs
            ));
        }

        if let Some(ref font) = self.processing.font_path {
            if !font.exists() {
                warnings.push(format!(
                    "processing.font_path {} does not exist",
                    font.display()
                ));
            }
        }

        if self.fetch.idle_timeout_ms < 500 {
            warnings.push(
                "fetch.idle_timeout_ms below 500ms makes truncated reassembly likely".into(),
            );
        }

        if self.processing.segment_concurrency > 16 {
            warnings.push(format!(
                "processing.segment_concurrency {} is unusually high",
                self.processing.segment_concurrency
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// NATS connection and ready-notification consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub token: Option<String>,
    pub stream: String,
    pub durable: String,
    pub ack_wait_secs: u64,
    pub max_concurrent_runs: usize,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".into(),
            token: None,
            stream: "VIDEO_UPLOADS".into(),
            durable: "processor-durable".into(),
            ack_wait_secs: 3600,
            max_concurrent_runs: 4,
        }
    }
}

impl NatsConfig {
    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }
}

/// Chunk pull settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Messages requested per pull.
    pub batch_size: usize,
    /// A pull that yields nothing within this window ends reassembly.
    pub idle_timeout_ms: u64,
    /// Delete the per-video durable consumer after a successful fetch.
    pub delete_consumer: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            idle_timeout_ms: 2000,
            delete_consumer: true,
        }
    }
}

impl FetchConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// HashiCorp Vault KV v2 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub address: String,
    pub token: String,
    pub mount: String,
    pub prefix: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:8200".into(),
            token: "root".into(),
            mount: "secret".into(),
            prefix: "videos".into(),
        }
    }
}

/// IPFS HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpfsConfig {
    pub api_url: String,
    pub scheme: String,
    pub timeout_secs: u64,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5001".into(),
            scheme: "ipfs".into(),
            timeout_secs: 120,
        }
    }
}

/// Pipeline processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Parent directory for per-run workspaces; the system temp dir when unset.
    pub work_dir: Option<PathBuf>,
    pub segment_duration_secs: u32,
    pub watermark_text: String,
    pub font_path: Option<PathBuf>,
    /// Segments encrypted/uploaded concurrently within one run.
    pub segment_concurrency: usize,
    /// Upper bound for one external tool invocation.
    pub tool_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            segment_duration_secs: 10,
            watermark_text: "VIDLOCK".into(),
            font_path: Some(PathBuf::from(
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            )),
            segment_concurrency: 1,
            tool_timeout_secs: 1800,
        }
    }
}

impl ProcessingConfig {
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
}

/// Chunk producer settings for the `ingest` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
    /// Buffers retained by the pool between uses.
    pub pool_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            pool_capacity: 8,
        }
    }
}
