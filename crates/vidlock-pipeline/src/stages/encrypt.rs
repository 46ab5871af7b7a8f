//! AES-256-GCM segment encryption.
//!
//! Sealed layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use std::path::Path;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use vidlock_core::{Error, Result, Workspace};

use crate::key::{SegmentKey, NONCE_LEN};
use crate::stage::{EncryptedSegment, SegmentEncryptor};

/// Seal `plaintext` under `key`, prepending the nonce.
pub fn seal(key: &SegmentKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.key_bytes())
        .map_err(|e| Error::Crypto(format!("invalid key: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(key.nonce()), plaintext)
        .map_err(|e| Error::Crypto(format!("seal failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(key.nonce());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed blob with the raw 32-byte key. The nonce is read from the
/// blob header.
pub fn open(key_bytes: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(Error::Crypto(format!(
            "sealed blob too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key_bytes)
        .map_err(|e| Error::Crypto(format!("invalid key: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Crypto("authentication failed".into()))
}

/// Encrypts each segment under a fresh [`SegmentKey`] and writes the sealed
/// blob next to it in the run workspace with owner-only permissions.
#[derive(Debug, Default, Clone)]
pub struct AesGcmEncryptor;

impl AesGcmEncryptor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SegmentEncryptor for AesGcmEncryptor {
    async fn encrypt(&self, segment: &Path, workspace: &Workspace) -> Result<EncryptedSegment> {
        let key = SegmentKey::generate()?;
        let plaintext = tokio::fs::read(segment).await?;

        let sealing_key = key.clone();
        let sealed = tokio::task::spawn_blocking(move || seal(&sealing_key, &plaintext))
            .await
            .map_err(|e| Error::Internal(format!("encrypt task failed: {e}")))??;

        let stem = segment
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "segment".to_string());
        let path = workspace.unique_file(&stem, "enc");

        let mut opts = tokio::fs::OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut file = opts.open(&path).await?;
        file.write_all(&sealed).await?;
        file.flush().await?;

        tracing::debug!(
            segment = %segment.display(),
            sealed = %path.display(),
            bytes = sealed.len(),
            "Segment sealed"
        );

        Ok(EncryptedSegment { path, key })
    }
}
