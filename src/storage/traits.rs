use async_trait::async_trait;

use super::key::ResourceKey;
use super::stream::OpenedObject;
use crate::error::OpenError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open `key` positioned at the requested range. `range` is the raw
    /// `Range` header value, if the client sent one.
    async fn open(&self, key: &ResourceKey, range: Option<&str>) -> Result<OpenedObject, OpenError>;

    /// Streams handed out by this store that are still alive.
    fn open_streams(&self) -> usize {
        0
    }
}
