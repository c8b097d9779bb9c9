// Filesystem-backed object store: sandboxed key resolution and range-positioned reads.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use super::detect::{detect_media_type, SNIFF_LEN};
use super::key::{normalize_key, ResourceKey};
use super::range::ByteRange;
use super::stream::{ObjectStream, OpenedObject};
use super::traits::ObjectStore;
use crate::config::STREAM_CHUNK_BYTES;
use crate::error::{OpenError, StorageError};

pub struct FileSystemStore {
    root: PathBuf,
    open_streams: Arc<AtomicUsize>,
    chunk_size: usize,
}

impl FileSystemStore {
    /// Create a store rooted at `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = std::fs::canonicalize(root.as_ref()).map_err(io_to_storage)?;
        if !root.is_dir() {
            return Err(StorageError::NotFound);
        }
        Ok(Self {
            root,
            open_streams: Arc::new(AtomicUsize::new(0)),
            chunk_size: STREAM_CHUNK_BYTES,
        })
    }

    /// Canonical storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of object streams currently alive.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::Acquire)
    }

    /// Map an untrusted key to a path under the root without touching the
    /// filesystem.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let path = self.root.join(normalize_key(key)?);
        if !path.starts_with(&self.root) {
            return Err(StorageError::PathTraversal);
        }
        Ok(path)
    }

    /// Open the object stored under the raw `key` at `range`.
    pub async fn open_key(&self, key: &str, range: Option<&str>) -> Result<OpenedObject, OpenError> {
        let path = match self.resolve(key) {
            Ok(p) => p,
            Err(StorageError::PathTraversal) => {
                warn!("path traversal rejected key={:?}", key);
                return Err(StorageError::PathTraversal.into());
            }
            Err(e) => return Err(e.into()),
        };

        // Symlinks inside the tree must not lead outside it either.
        let target = tokio::fs::canonicalize(&path).await.map_err(io_to_storage)?;
        if !target.starts_with(&self.root) {
            warn!("symlink escape rejected key={:?}", key);
            return Err(StorageError::PathTraversal.into());
        }

        let mut file = File::open(&target).await.map_err(io_to_storage)?;
        let meta = file.metadata().await.map_err(io_to_storage)?;
        if !meta.is_file() {
            return Err(StorageError::NotFound.into());
        }
        let size = meta.len();

        let selected = match range {
            Some(header) => Some(ByteRange::parse(header, size)?),
            None => ByteRange::whole(size),
        };

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut file)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .map_err(StorageError::Io)?;
        let media_type = detect_media_type(&head);

        let (start, len) = selected.map(|r| (r.start, r.len())).unwrap_or((0, 0));
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(StorageError::Io)?;

        debug!(
            "opened key={} size={} range={:?} type={}",
            key,
            size,
            selected.map(|r| (r.start, r.end)),
            media_type.content_type()
        );

        Ok(OpenedObject {
            size,
            range: selected,
            partial: range.is_some(),
            media_type,
            stream: ObjectStream::new(
                file.take(len),
                self.chunk_size,
                self.open_streams.clone(),
                key.to_string(),
            ),
        })
    }
}

#[async_trait]
impl ObjectStore for FileSystemStore {
    async fn open(&self, key: &ResourceKey, range: Option<&str>) -> Result<OpenedObject, OpenError> {
        if let Err(e) = key.validate() {
            warn!("multi-segment resource key rejected key={:?}", key.relative_path());
            return Err(e.into());
        }
        self.open_key(&key.relative_path(), range).await
    }

    fn open_streams(&self) -> usize {
        FileSystemStore::open_streams(self)
    }
}

fn io_to_storage(e: io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::IsADirectory => {
            StorageError::NotFound
        }
        _ => StorageError::Io(e),
    }
}
