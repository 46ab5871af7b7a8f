//! Index-keyed chunk collection.
//!
//! Chunks arrive in any order and may be delivered more than once. The index
//! is the only ordering key: a repeated index replaces the earlier payload and
//! the asset is the ascending-index concatenation of what was collected.

use std::collections::BTreeMap;
use std::path::Path;

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufWriter};

use vidlock_core::Result;

#[derive(Debug, Default)]
pub struct Reassembler {
    chunks: BTreeMap<u64, Bytes>,
    replaced: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `payload` at `index`. Returns `true` when an earlier payload for
    /// the same index was replaced.
    pub fn insert(&mut self, index: u64, payload: Bytes) -> bool {
        let replaced = self.chunks.insert(index, payload).is_some();
        if replaced {
            self.replaced += 1;
        }
        replaced
    }

    /// Distinct indices collected.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of redeliveries that overwrote an earlier payload.
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    pub fn total_bytes(&self) -> u64 {
        self.chunks.values().map(|c| c.len() as u64).sum()
    }

    /// Number of indices missing between the lowest and highest collected
    /// index.
    pub fn missing(&self) -> u64 {
        match (self.chunks.keys().next(), self.chunks.keys().next_back()) {
            (Some(&first), Some(&last)) => (last - first) - (self.chunks.len() as u64 - 1),
            _ => 0,
        }
    }

    /// The first `limit` missing indices, in ascending order. Walks adjacent
    /// collected indices, so cost is bounded by `len() + limit`.
    pub fn gaps(&self, limit: usize) -> Vec<u64> {
        let mut out = Vec::new();
        for (&lo, &hi) in self.chunks.keys().zip(self.chunks.keys().skip(1)) {
            let mut index = lo + 1;
            while index < hi && out.len() < limit {
                out.push(index);
                index += 1;
            }
            if out.len() >= limit {
                break;
            }
        }
        out
    }

    /// Concatenate in index order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes() as usize);
        for chunk in self.chunks.values() {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Write the concatenation to a new file at `path`. Returns bytes written.
    pub async fn write_to(&self, path: &Path) -> Result<u64> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        let mut writer = BufWriter::new(file);
        let mut written = 0u64;
        for chunk in self.chunks.values() {
            writer.write_all(chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(written)
    }
}

/// Parse a `Chunk-Idx` header value.
pub fn parse_chunk_index(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse().ok()
}
