//! Per-segment symmetric key material.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// A fresh key + nonce pair generated for exactly one segment.
///
/// Memory is wiped on drop and `Debug` never prints key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SegmentKey {
    key: [u8; KEY_LEN],
    nonce: [u8; NONCE_LEN],
}

impl SegmentKey {
    /// Draw a new key and nonce from the operating system RNG.
    pub fn generate() -> vidlock_core::Result<Self> {
        let mut key = [0u8; KEY_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|e| vidlock_core::Error::Crypto(format!("failed to generate key: {e}")))?;
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| vidlock_core::Error::Crypto(format!("failed to generate nonce: {e}")))?;
        Ok(Self { key, nonce })
    }

    /// Rebuild a key from stored parts.
    pub fn from_parts(key: [u8; KEY_LEN], nonce: [u8; NONCE_LEN]) -> Self {
        Self { key, nonce }
    }

    /// Raw key bytes; the only part persisted to the key store.
    pub fn key_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }
}

impl std::fmt::Debug for SegmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentKey").finish_non_exhaustive()
    }
}
