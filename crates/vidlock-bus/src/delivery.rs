//! Acknowledgeable inbound messages.
//!
//! Chunk collection and notification dispatch only need headers, the payload
//! and the three ack verbs, so they are written against [`Delivery`] and
//! driven by in-memory messages in tests.

use async_nats::jetstream::{self, AckKind};
use async_trait::async_trait;

use vidlock_core::{Error, Result};

#[async_trait]
pub trait Delivery: Send + Sync {
    /// First value of header `name`, if present.
    fn header(&self, name: &str) -> Option<&str>;

    fn payload(&self) -> &[u8];

    /// Positive acknowledgement.
    async fn ack(&self) -> Result<()>;

    /// Reject permanently; the server will not redeliver.
    async fn term(&self) -> Result<()>;

    /// Reset the redelivery timer while work is still running.
    async fn in_progress(&self) -> Result<()>;
}

#[async_trait]
impl Delivery for jetstream::Message {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref()?.get(name).map(|v| v.as_str())
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(&self) -> Result<()> {
        jetstream::Message::ack(self)
            .await
            .map_err(|e| Error::transport(format!("ack failed: {e}")))
    }

    async fn term(&self) -> Result<()> {
        self.ack_with(AckKind::Term)
            .await
            .map_err(|e| Error::transport(format!("term failed: {e}")))
    }

    async fn in_progress(&self) -> Result<()> {
        self.ack_with(AckKind::Progress)
            .await
            .map_err(|e| Error::transport(format!("progress ack failed: {e}")))
    }
}
