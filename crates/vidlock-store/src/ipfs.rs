//! Upload ciphertexts through an IPFS node's HTTP RPC API (`/api/v0/add`).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use vidlock_core::config::IpfsConfig;
use vidlock_core::{Error, Locator, Result};
use vidlock_pipeline::ContentUploader;

/// Response line of `/api/v0/add`.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// IPFS-backed [`ContentUploader`]. Returned locators are `<scheme>://<cid>`.
pub struct IpfsUploader {
    client: Client,
    api_url: String,
    scheme: String,
}

impl IpfsUploader {
    pub fn new(config: &IpfsConfig) -> Self {
        Self {
            client: crate::http_client(Duration::from_secs(config.timeout_secs)),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            scheme: config.scheme.clone(),
        }
    }
}

#[async_trait]
impl ContentUploader for IpfsUploader {
    async fn upload(&self, path: &Path) -> Result<Locator> {
        let data = tokio::fs::read(path).await?;
        let size = data.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "segment.enc".to_string());

        let form = Form::new().part("file", Part::bytes(data).file_name(file_name));
        let response = self
            .client
            .post(format!("{}/api/v0/add", self.api_url))
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Upload(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Upload(format!("add rejected ({status}): {detail}")));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| Error::Upload(format!("unreadable add response: {e}")))?;
        if added.hash.is_empty() {
            return Err(Error::Upload("add response carried no content id".into()));
        }

        tracing::debug!(path = %path.display(), bytes = size, cid = %added.hash, "Uploaded to IPFS");
        Ok(Locator::new(&self.scheme, &added.hash))
    }
}
