//! NATS connection setup.

use vidlock_core::config::NatsConfig;
use vidlock_core::{Error, Result};

/// Client name reported to the server.
const CLIENT_NAME: &str = "vidlock";

/// Connect to the configured NATS server, authenticating with the token when
/// one is set.
pub async fn connect(config: &NatsConfig) -> Result<async_nats::Client> {
    let mut options = async_nats::ConnectOptions::new().name(CLIENT_NAME);
    if let Some(token) = config.token.as_ref().filter(|t| !t.is_empty()) {
        options = options.token(token.clone());
    }

    let client = options
        .connect(config.url.as_str())
        .await
        .map_err(|e| Error::transport(format!("failed to connect to {}: {e}", config.url)))?;

    tracing::info!(url = %config.url, "Connected to NATS");
    Ok(client)
}

/// JetStream context for an existing client.
pub fn jetstream(client: async_nats::Client) -> async_nats::jetstream::Context {
    async_nats::jetstream::new(client)
}
