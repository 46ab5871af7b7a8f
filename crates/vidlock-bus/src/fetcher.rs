//! Per-video chunk fetch over a JetStream pull consumer.
//!
//! The fetcher opens a durable consumer named `fetcher-<video_id>` filtered
//! to `video.uploads.<video_id>` and pulls bounded batches until one pull
//! returns nothing within the idle timeout. There is no end-of-stream marker:
//! a producer that pauses longer than the idle timeout yields a truncated
//! asset.

use std::path::PathBuf;
use std::time::Duration;

use async_nats::jetstream::consumer::{pull, AckPolicy, DeliverPolicy, PullConsumer};
use async_nats::jetstream::{self, Message};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use vidlock_core::config::FetchConfig;
use vidlock_core::events::{headers, upload_subject};
use vidlock_core::{Error, Result, VideoId, Workspace};
use vidlock_pipeline::ChunkFetcher;

use crate::delivery::Delivery;
use crate::reassembly::{parse_chunk_index, Reassembler};

/// Consumers left behind by a crashed fetch are removed by the server after
/// this much inactivity.
const ORPHAN_CONSUMER_THRESHOLD: Duration = Duration::from_secs(600);

/// Missing indices listed in the reassembly warning.
const GAP_LOG_LIMIT: usize = 16;

/// A source of chunk batches. An empty batch means the source went idle.
#[async_trait]
pub trait ChunkBatches: Send {
    type Item: Delivery;

    async fn next_batch(&mut self) -> Result<Vec<Self::Item>>;
}

/// Counters from one collection pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    pub received: usize,
    pub dropped: usize,
    pub batches: usize,
}

/// Pull batches from `source` into `reassembler` until a batch comes back
/// empty.
///
/// Chunks without a valid `Chunk-Idx` header are terminated and dropped.
/// Every stored chunk is acknowledged; an ack failure is logged since the
/// payload has already been captured.
pub async fn collect_chunks<B: ChunkBatches>(
    source: &mut B,
    reassembler: &mut Reassembler,
) -> Result<CollectStats> {
    let mut stats = CollectStats::default();

    loop {
        let batch = source.next_batch().await?;
        if batch.is_empty() {
            break;
        }
        stats.batches += 1;

        for message in batch {
            stats.received += 1;
            let Some(index) = parse_chunk_index(message.header(headers::CHUNK_IDX)) else {
                stats.dropped += 1;
                tracing::warn!(
                    header = ?message.header(headers::CHUNK_IDX),
                    "Dropping chunk without a valid index"
                );
                if let Err(e) = message.term().await {
                    tracing::warn!(error = %e, "Failed to terminate malformed chunk");
                }
                continue;
            };

            if reassembler.insert(index, Bytes::copy_from_slice(message.payload())) {
                tracing::debug!(index, "Duplicate chunk replaced");
            }
            if let Err(e) = message.ack().await {
                tracing::warn!(index, error = %e, "Chunk ack failed");
            }
        }
    }

    Ok(stats)
}

/// [`ChunkBatches`] over a JetStream pull consumer.
struct JetStreamBatches {
    consumer: PullConsumer,
    batch_size: usize,
    idle_timeout: Duration,
}

#[async_trait]
impl ChunkBatches for JetStreamBatches {
    type Item = Message;

    async fn next_batch(&mut self) -> Result<Vec<Message>> {
        let mut batch = self
            .consumer
            .batch()
            .max_messages(self.batch_size)
            .expires(self.idle_timeout)
            .messages()
            .await
            .map_err(|e| Error::transport(format!("pull failed: {e}")))?;

        let mut messages = Vec::with_capacity(self.batch_size);
        while let Some(message) = batch.next().await {
            messages.push(message.map_err(|e| Error::transport(format!("pull failed: {e}")))?);
        }
        Ok(messages)
    }
}

/// JetStream-backed [`ChunkFetcher`].
pub struct JetStreamFetcher {
    context: jetstream::Context,
    stream: String,
    config: FetchConfig,
}

impl JetStreamFetcher {
    pub fn new(context: jetstream::Context, stream: impl Into<String>, config: FetchConfig) -> Self {
        Self {
            context,
            stream: stream.into(),
            config,
        }
    }

    fn consumer_config(&self, durable: &str, video_id: &VideoId) -> pull::Config {
        pull::Config {
            durable_name: Some(durable.to_string()),
            filter_subject: upload_subject(video_id),
            deliver_policy: DeliverPolicy::All,
            ack_policy: AckPolicy::Explicit,
            inactive_threshold: ORPHAN_CONSUMER_THRESHOLD,
            ..Default::default()
        }
    }
}

/// The per-video consumer is removed only after chunks were collected
/// cleanly; a failed pass leaves it to the server's inactivity cleanup.
fn should_delete_consumer(config: &FetchConfig, collected: &Result<CollectStats>) -> bool {
    config.delete_consumer && collected.is_ok()
}

/// Durable consumer name for a video's chunk fetch.
pub fn fetcher_durable(video_id: &VideoId) -> String {
    format!("fetcher-{video_id}")
}

#[async_trait]
impl ChunkFetcher for JetStreamFetcher {
    async fn fetch(&self, video_id: &VideoId, workspace: &Workspace) -> Result<PathBuf> {
        let durable = fetcher_durable(video_id);
        let stream = self
            .context
            .get_stream(&self.stream)
            .await
            .map_err(|e| Error::transport(format!("stream {} unavailable: {e}", self.stream)))?;
        let consumer: PullConsumer = stream
            .get_or_create_consumer(&durable, self.consumer_config(&durable, video_id))
            .await
            .map_err(|e| Error::transport(format!("failed to open consumer {durable}: {e}")))?;

        let mut source = JetStreamBatches {
            consumer,
            batch_size: self.config.batch_size.max(1),
            idle_timeout: self.config.idle_timeout(),
        };
        let mut reassembler = Reassembler::new();
        let collected = collect_chunks(&mut source, &mut reassembler).await;

        if should_delete_consumer(&self.config, &collected) {
            if let Err(e) = stream.delete_consumer(&durable).await {
                tracing::warn!(consumer = %durable, error = %e, "Failed to delete fetch consumer");
            }
        }

        let stats = collected?;
        if reassembler.is_empty() {
            return Err(Error::transport(format!(
                "no chunks received for {video_id} within {:?}",
                self.config.idle_timeout()
            )));
        }
        let missing = reassembler.missing();
        if missing > 0 {
            tracing::warn!(
                video_id = %video_id,
                missing,
                first_missing = ?reassembler.gaps(GAP_LOG_LIMIT),
                "Chunk indices missing from reassembly"
            );
        }

        let path = workspace.temp_file("raw.mp4");
        let bytes = reassembler.write_to(&path).await?;

        tracing::info!(
            video_id = %video_id,
            chunks = reassembler.len(),
            received = stats.received,
            dropped = stats.dropped,
            replaced = reassembler.replaced(),
            bytes,
            "Chunks reassembled"
        );

        Ok(path)
    }
}
