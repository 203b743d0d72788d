//! LRU cache for decoded page images

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;

/// Decoded pages keyed by page index
pub struct PageImageCache {
    cache: LruCache<usize, Arc<RgbaImage>>,
}

impl PageImageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a decoded page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, page: usize) -> Option<Arc<RgbaImage>> {
        self.cache.get(&page).cloned()
    }

    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        self.cache.contains(&page)
    }

    /// Insert a decoded page, returning the shared handle
    pub fn insert(&mut self, page: usize, image: RgbaImage) -> Arc<RgbaImage> {
        let arc = Arc::new(image);
        self.cache.put(page, arc.clone());
        arc
    }

    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}
