//! Segment key storage in Vault's KV v2 secrets engine.
//!
//! Keys are written to `<mount>/data/<prefix>/<video_id>/<segment_id>` as
//! `{"key": "<base64>"}`. Writing the same path again creates a new version,
//! so retries are harmless.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;

use vidlock_core::config::VaultConfig;
use vidlock_core::{Error, Result, SegmentId, VideoId};
use vidlock_pipeline::{KeyStore, SegmentKey};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Serialize)]
struct KvWrite<'a> {
    data: KeyRecord<'a>,
}

#[derive(Serialize)]
struct KeyRecord<'a> {
    key: &'a str,
}

/// Vault-backed [`KeyStore`].
pub struct VaultKeyStore {
    client: Client,
    address: String,
    token: String,
    mount: String,
    prefix: String,
}

impl VaultKeyStore {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            client: crate::http_client(REQUEST_TIMEOUT),
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            mount: config.mount.trim_matches('/').to_string(),
            prefix: config.prefix.trim_matches('/').to_string(),
        }
    }

    /// Secret path relative to the mount.
    pub fn secret_path(&self, video_id: &VideoId, segment_id: &SegmentId) -> String {
        if self.prefix.is_empty() {
            format!("{video_id}/{segment_id}")
        } else {
            format!("{}/{video_id}/{segment_id}", self.prefix)
        }
    }

    fn url(&self, secret_path: &str) -> String {
        format!("{}/v1/{}/data/{}", self.address, self.mount, secret_path)
    }
}

#[async_trait]
impl KeyStore for VaultKeyStore {
    async fn save(
        &self,
        video_id: &VideoId,
        segment_id: &SegmentId,
        key: &SegmentKey,
    ) -> Result<()> {
        let secret_path = self.secret_path(video_id, segment_id);
        let encoded = STANDARD.encode(key.key_bytes());
        let body = KvWrite {
            data: KeyRecord { key: &encoded },
        };

        let response = self
            .client
            .put(self.url(&secret_path))
            .header(TOKEN_HEADER, &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::KeyStore(format!("request to {secret_path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::KeyStore(format!(
                "write to {secret_path} rejected ({status}): {detail}"
            )));
        }

        tracing::debug!(path = %secret_path, "Segment key stored");
        Ok(())
    }
}
