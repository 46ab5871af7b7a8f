//! # vidlock-bus
//!
//! Everything that talks to NATS JetStream.
//!
//! - [`connect`] -- client connection from [`vidlock_core::config::NatsConfig`].
//! - [`delivery`] -- the [`Delivery`] abstraction over acknowledgeable messages.
//! - [`reassembly`] -- index-keyed chunk collection and in-order concatenation.
//! - [`fetcher`] -- per-video pull consumer implementing the pipeline's
//!   [`ChunkFetcher`](vidlock_pipeline::ChunkFetcher).
//! - [`provision`] -- idempotent, additive stream provisioning.
//! - [`publisher`] -- progress / completed event publishing.
//! - [`dispatch`] -- bounded ready-notification dispatch with ack-after-run.
//! - [`producer`] -- chunked file ingestion with a reusable buffer pool.

pub mod connect;
pub mod delivery;
pub mod dispatch;
pub mod fetcher;
pub mod producer;
pub mod provision;
pub mod publisher;
pub mod reassembly;

pub use connect::connect;
pub use delivery::Delivery;
pub use dispatch::{dispatch, ready_messages, DispatchOptions, DispatchStats};
pub use fetcher::JetStreamFetcher;
pub use producer::{BufferPool, ChunkProducer, IngestReport, UploadMeta};
pub use provision::{ensure_stream, JetStreamAdmin, ProvisionOutcome, StreamAdmin};
pub use publisher::{BusPublisher, JetStreamPublisher, MessageSink};
pub use reassembly::Reassembler;
