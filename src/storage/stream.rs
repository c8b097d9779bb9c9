// Scoped object streams: a read-positioned file handle that is released on drop.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::Take;
use tokio_util::io::ReaderStream;
use tracing::trace;

use super::detect::MediaType;
use super::range::ByteRange;

/// Live-handle registration. Decrements the owning store's counter when
/// dropped, whichever way the stream ends.
struct OpenHandle {
    counter: Arc<AtomicUsize>,
    key: String,
}

impl OpenHandle {
    fn acquire(counter: Arc<AtomicUsize>, key: String) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter, key }
    }
}

impl Drop for OpenHandle {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
        trace!("object stream released key={}", self.key);
    }
}

/// Byte stream over exactly the selected range of one object.
pub struct ObjectStream {
    inner: ReaderStream<Take<File>>,
    _handle: OpenHandle,
}

impl ObjectStream {
    pub(crate) fn new(
        reader: Take<File>,
        chunk_size: usize,
        counter: Arc<AtomicUsize>,
        key: String,
    ) -> Self {
        Self {
            inner: ReaderStream::with_capacity(reader, chunk_size),
            _handle: OpenHandle::acquire(counter, key),
        }
    }
}

impl Stream for ObjectStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Result of opening an object: metadata plus the positioned stream.
pub struct OpenedObject {
    /// Total object size in bytes.
    pub size: u64,
    /// Selected bytes; `None` only for an empty object.
    pub range: Option<ByteRange>,
    /// Whether the caller asked for a range (partial-content response).
    pub partial: bool,
    pub media_type: MediaType,
    pub stream: ObjectStream,
}

impl OpenedObject {
    /// Number of bytes the stream will yield.
    pub fn content_length(&self) -> u64 {
        self.range.map(|r| r.len()).unwrap_or(0)
    }

    pub fn start(&self) -> u64 {
        self.range.map(|r| r.start).unwrap_or(0)
    }

    /// Inclusive last byte, `None` for an empty object.
    pub fn end(&self) -> Option<u64> {
        self.range.map(|r| r.end)
    }

    /// Drain the stream into memory.
    pub async fn read_all(self) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.content_length() as usize);
        let mut stream = self.stream;
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}
