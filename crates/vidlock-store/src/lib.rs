//! # vidlock-store
//!
//! HTTP-backed implementations of the pipeline's storage capabilities:
//!
//! - [`VaultKeyStore`] -- segment keys in a HashiCorp Vault KV v2 mount.
//! - [`IpfsUploader`] -- ciphertexts pushed through an IPFS node's HTTP API.

pub mod ipfs;
pub mod vault;

pub use ipfs::IpfsUploader;
pub use vault::VaultKeyStore;

/// Build an HTTP client with `timeout`, falling back to the defaults.
pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout: {}", e);
            reqwest::Client::new()
        })
}
