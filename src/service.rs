//! Service wiring: builds the production stages from [`Config`] and runs the
//! processor's long-lived and one-shot operations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_nats::jetstream;
use tokio_util::sync::CancellationToken;

use vidlock_av::{SegmentSpec, ToolRegistry, WatermarkSpec};
use vidlock_bus::{
    dispatch, ensure_stream, ready_messages, BufferPool, ChunkProducer, DispatchOptions,
    DispatchStats, IngestReport, JetStreamAdmin, JetStreamFetcher, JetStreamPublisher,
    ProvisionOutcome, UploadMeta,
};
use vidlock_core::events::REQUIRED_SUBJECTS;
use vidlock_core::VideoId;
use vidlock_pipeline::stages::{AesGcmEncryptor, FfmpegSplitter, FfmpegWatermarker};
use vidlock_pipeline::{ChunkFetcher, EventPublisher, Orchestrator, RunReport, Stages};
use vidlock_store::{IpfsUploader, VaultKeyStore};

use crate::config::Config;

/// Discover external tools with the configured timeout applied.
pub fn tool_registry(config: &Config) -> ToolRegistry {
    ToolRegistry::discover(&config.tools).with_timeout(config.processing.tool_timeout())
}

/// Watermark appearance from config. A configured font that is missing falls
/// back to ffmpeg's default font.
pub fn watermark_spec(config: &Config) -> WatermarkSpec {
    let font_path = match &config.processing.font_path {
        Some(font) if font.exists() => Some(font.clone()),
        Some(font) => {
            tracing::warn!("Watermark font {:?} not found; using ffmpeg default", font);
            None
        }
        None => None,
    };
    WatermarkSpec {
        text: config.processing.watermark_text.clone(),
        font_path,
        ..Default::default()
    }
}

/// Build the orchestrator with ffmpeg, AES-GCM, Vault and IPFS stages around
/// the given transport-side fetcher and publisher.
pub fn build_orchestrator(
    config: &Config,
    tools: Arc<ToolRegistry>,
    fetcher: Arc<dyn ChunkFetcher>,
    publisher: Arc<dyn EventPublisher>,
) -> Orchestrator {
    let stages = Stages {
        fetcher,
        watermarker: Arc::new(FfmpegWatermarker::new(
            Arc::clone(&tools),
            watermark_spec(config),
        )),
        splitter: Arc::new(FfmpegSplitter::new(
            tools,
            SegmentSpec {
                duration_secs: config.processing.segment_duration_secs,
            },
        )),
        encryptor: Arc::new(AesGcmEncryptor::new()),
        key_store: Arc::new(VaultKeyStore::new(&config.vault)),
        uploader: Arc::new(IpfsUploader::new(&config.ipfs)),
        publisher,
    };

    Orchestrator::new(stages, config.processing.work_dir())
        .with_segment_concurrency(config.processing.segment_concurrency)
        .with_locator_scheme(config.ipfs.scheme.clone())
}

/// Connect to NATS and return a JetStream context.
pub async fn connect_jetstream(config: &Config) -> Result<jetstream::Context> {
    let client = vidlock_bus::connect(&config.nats)
        .await
        .context("Failed to connect to NATS")?;
    Ok(vidlock_bus::connect::jetstream(client))
}

/// Ensure the durable stream exists with every required subject.
pub async fn provision(context: &jetstream::Context, config: &Config) -> Result<ProvisionOutcome> {
    let admin = JetStreamAdmin::new(context.clone());
    ensure_stream(&admin, &config.nats.stream, &REQUIRED_SUBJECTS)
        .await
        .with_context(|| format!("Failed to provision stream {}", config.nats.stream))
}

fn orchestrator_for(config: &Config, context: &jetstream::Context) -> Result<Orchestrator> {
    let tools = tool_registry(config);
    tools
        .require("ffmpeg")
        .context("ffmpeg is required for processing")?;

    let fetcher = Arc::new(JetStreamFetcher::new(
        context.clone(),
        config.nats.stream.clone(),
        config.fetch.clone(),
    ));
    let publisher = Arc::new(JetStreamPublisher::new(context.clone()));
    Ok(build_orchestrator(config, Arc::new(tools), fetcher, publisher))
}

/// Long-running processor: provision, then dispatch ready notifications until
/// `shutdown` fires.
pub async fn serve(config: &Config, shutdown: CancellationToken) -> Result<DispatchStats> {
    let context = connect_jetstream(config).await?;
    let outcome = provision(&context, config).await?;
    tracing::info!("Stream {}: {:?}", config.nats.stream, outcome);

    let orchestrator = Arc::new(orchestrator_for(config, &context)?);
    let messages = ready_messages(&context, &config.nats)
        .await
        .context("Failed to open ready-notification consumer")?;

    tracing::info!(
        "Processor ready (max {} concurrent runs, work dir {:?})",
        config.nats.max_concurrent_runs,
        config.processing.work_dir()
    );

    let stats = dispatch(
        messages,
        orchestrator,
        DispatchOptions::from_config(&config.nats),
        shutdown,
    )
    .await?;
    Ok(stats)
}

/// Process one video directly, bypassing the ready-notification consumer.
pub async fn process_one(config: &Config, video_id: &VideoId) -> Result<RunReport> {
    let context = connect_jetstream(config).await?;
    let orchestrator = orchestrator_for(config, &context)?;
    orchestrator
        .run(video_id)
        .await
        .with_context(|| format!("Processing {video_id} failed"))
}

/// Publish a local file as a chunked upload followed by its ready notification.
pub async fn ingest(
    config: &Config,
    path: &Path,
    video_id: Option<VideoId>,
    user_id: Option<String>,
) -> Result<IngestReport> {
    if !path.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", path);
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let meta = UploadMeta {
        video_id: video_id.unwrap_or_else(VideoId::generate),
        user_id,
        file_name,
    };

    let context = connect_jetstream(config).await?;
    provision(&context, config).await?;

    let pool = Arc::new(BufferPool::new(
        config.ingest.chunk_size,
        config.ingest.pool_capacity,
    ));
    let producer = ChunkProducer::new(context, pool);
    producer
        .publish_file(path, &meta)
        .await
        .with_context(|| format!("Failed to ingest {:?}", path))
}
