//! In-memory image store keyed by `rct-image-store://` tags.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::tag::IMAGE_STORE_SCHEME;
use crate::types::DecodedImage;

/// Lookup of images previously registered with the host.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// The image stored under `tag`, if any.
    async fn get(&self, tag: &str) -> Option<DecodedImage>;
}

/// [`ImageStore`] holding decoded images in a map.
#[derive(Default)]
pub struct MemoryImageStore {
    images: RwLock<HashMap<String, DecodedImage>>,
    next_id: AtomicU64,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `image` and return the tag that retrieves it.
    pub async fn insert(&self, image: DecodedImage) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tag = format!("{IMAGE_STORE_SCHEME}{id}");
        self.images.write().await.insert(tag.clone(), image);
        tracing::trace!("Stored image as {}", tag);
        tag
    }

    pub async fn remove(&self, tag: &str) -> Option<DecodedImage> {
        self.images.write().await.remove(tag)
    }

    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.images.read().await.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn get(&self, tag: &str) -> Option<DecodedImage> {
        self.images.read().await.get(tag).cloned()
    }
}
