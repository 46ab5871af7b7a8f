//! Outbound messages: the [`MessageSink`] seam and event publishing.

use async_nats::jetstream;
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;

use vidlock_core::events::headers;
use vidlock_core::{Error, ProcessingEvent, Result};
use vidlock_pipeline::EventPublisher;

/// Somewhere to publish a message and wait for it to be accepted.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, subject: String, headers: HeaderMap, payload: Bytes) -> Result<()>;
}

/// Publishes into JetStream and waits for the stream's ack.
#[async_trait]
impl MessageSink for jetstream::Context {
    async fn send(&self, subject: String, headers: HeaderMap, payload: Bytes) -> Result<()> {
        let ack = self
            .publish_with_headers(subject.clone(), headers, payload)
            .await
            .map_err(|e| Error::publish(format!("{subject}: {e}")))?;
        ack.await
            .map_err(|e| Error::publish(format!("{subject}: no ack: {e}")))?;
        Ok(())
    }
}

/// [`EventPublisher`] writing JSON event bodies to the event's subject.
///
/// Failures are returned to the caller; nothing is retried here.
pub struct BusPublisher<S> {
    sink: S,
}

/// The production publisher.
pub type JetStreamPublisher = BusPublisher<jetstream::Context>;

impl<S: MessageSink> BusPublisher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<S: MessageSink> EventPublisher for BusPublisher<S> {
    async fn publish(&self, event: &ProcessingEvent) -> Result<()> {
        let mut message_headers = HeaderMap::new();
        message_headers.insert(headers::VIDEO_ID, event.video_id().as_str());
        let subject = event.subject();
        self.sink
            .send(subject.clone(), message_headers, Bytes::from(event.to_payload()?))
            .await?;
        tracing::debug!(subject = %subject, "Event published");
        Ok(())
    }
}
