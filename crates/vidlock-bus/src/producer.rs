//! Chunked file ingestion.
//!
//! A file is published as fixed-size chunks on `video.uploads.<id>`, each
//! tagged with `Video-ID` and `Chunk-Idx`, followed by one ready notification
//! on `video.events`. The notification goes last so the processor never opens
//! its fetch cursor before the chunks are in the stream.

use std::path::Path;
use std::sync::Arc;

use async_nats::HeaderMap;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};

use vidlock_core::events::{headers, upload_subject, READY_SUBJECT};
use vidlock_core::{Error, Result, VideoId};

use crate::publisher::MessageSink;

/// Reusable read buffers of one chunk size.
///
/// Holds no per-video state; shared by every ingestion that uses the same
/// chunk size.
#[derive(Debug)]
pub struct BufferPool {
    chunk_size: usize,
    capacity: usize,
    free: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    /// Pool of `chunk_size` buffers keeping at most `capacity` idle ones.
    pub fn new(chunk_size: usize, capacity: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Take an empty buffer with at least `chunk_size` capacity.
    pub fn acquire(&self) -> BytesMut {
        match self.free.lock().pop() {
            Some(buf) => buf,
            None => BytesMut::with_capacity(self.chunk_size),
        }
    }

    /// Return a buffer. Undersized buffers and buffers beyond capacity are
    /// dropped.
    pub fn release(&self, mut buf: BytesMut) {
        buf.clear();
        if buf.capacity() < self.chunk_size {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(buf);
        }
    }
}

/// Fill `buf` with up to `chunk_size` bytes from `reader`. Returns the count;
/// zero means end of input.
async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut BytesMut,
    chunk_size: usize,
) -> std::io::Result<usize> {
    buf.resize(chunk_size, 0);
    let mut filled = 0;
    while filled < chunk_size {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(filled)
}

/// Descriptive fields of one upload.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub video_id: VideoId,
    pub user_id: Option<String>,
    pub file_name: String,
}

/// Result of [`ChunkProducer::publish_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub video_id: VideoId,
    pub chunks: u64,
    pub bytes: u64,
}

/// Publishes files as chunk streams through a [`MessageSink`].
pub struct ChunkProducer<S> {
    sink: S,
    pool: Arc<BufferPool>,
}

impl<S: MessageSink> ChunkProducer<S> {
    pub fn new(sink: S, pool: Arc<BufferPool>) -> Self {
        Self { sink, pool }
    }

    /// Publish the file at `path` under `meta.video_id`.
    pub async fn publish_file(&self, path: &Path, meta: &UploadMeta) -> Result<IngestReport> {
        let mut file = tokio::fs::File::open(path).await?;
        self.publish_reader(&mut file, meta).await
    }

    /// Publish everything readable from `reader`.
    ///
    /// # Errors
    ///
    /// Empty input is rejected before anything is published. A failed chunk
    /// publish stops the upload without sending the ready notification.
    pub async fn publish_reader<R: AsyncRead + Unpin + Send>(
        &self,
        reader: &mut R,
        meta: &UploadMeta,
    ) -> Result<IngestReport> {
        let subject = upload_subject(&meta.video_id);
        let chunk_size = self.pool.chunk_size();
        let mut index: u64 = 0;
        let mut total: u64 = 0;

        loop {
            let mut buf = self.pool.acquire();
            let read = read_chunk(reader, &mut buf, chunk_size).await;
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    self.pool.release(buf);
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.pool.release(buf);
                break;
            }
            let payload = Bytes::copy_from_slice(&buf[..n]);
            self.pool.release(buf);

            let mut chunk_headers = HeaderMap::new();
            chunk_headers.insert(headers::VIDEO_ID, meta.video_id.as_str());
            chunk_headers.insert(headers::CHUNK_IDX, index.to_string().as_str());
            self.sink.send(subject.clone(), chunk_headers, payload).await?;

            tracing::trace!(video_id = %meta.video_id, index, bytes = n, "Chunk published");
            index += 1;
            total += n as u64;
        }

        if index == 0 {
            return Err(Error::Validation(format!(
                "nothing to upload for {}: input is empty",
                meta.video_id
            )));
        }

        let mut ready_headers = HeaderMap::new();
        ready_headers.insert(headers::VIDEO_ID, meta.video_id.as_str());
        ready_headers.insert(headers::FILE_NAME, meta.file_name.as_str());
        if let Some(user_id) = &meta.user_id {
            ready_headers.insert(headers::USER_ID, user_id.as_str());
        }
        self.sink
            .send(
                READY_SUBJECT.to_string(),
                ready_headers,
                Bytes::copy_from_slice(meta.video_id.as_str().as_bytes()),
            )
            .await?;

        tracing::info!(video_id = %meta.video_id, chunks = index, bytes = total, "Upload published");

        Ok(IngestReport {
            video_id: meta.video_id.clone(),
            chunks: index,
            bytes: total,
        })
    }
}
