//! Ordered frame cache for one session.
//!
//! Holds the extracted frame payloads (PNG bytes) in index order, with a
//! per-index LRU cache of decoded RGBA images so repeated seeks don't pay
//! the decode cost twice. A reload replaces the whole sequence atomically:
//! there is no partially visible state.

use image::RgbaImage;
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Frame payload decode failures
#[derive(Debug)]
pub enum FrameError {
    Decode { index: usize, reason: String },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Decode { index, reason } => {
                write!(f, "Failed to decode frame {}: {}", index, reason)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Index-addressable store of one session's frame payloads.
///
/// Payload ownership is exclusive: `clear()` (or the next `replace`) drops
/// both the byte payloads and every decoded handle.
#[derive(Debug)]
pub struct FrameStore {
    frames: Vec<Vec<u8>>,
    /// Decoded-image cache: frame index -> RGBA image
    decoded: Mutex<LruCache<usize, Arc<RgbaImage>>>,
}

impl FrameStore {
    /// Create a store whose decoded-image cache holds up to `cache_frames`
    /// images (0 falls back to 1).
    pub fn new(cache_frames: usize) -> Self {
        let capacity =
            NonZeroUsize::new(cache_frames).unwrap_or(NonZeroUsize::new(1).unwrap());

        Self {
            frames: Vec::new(),
            decoded: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Replace the full contents with a new ordered sequence.
    ///
    /// Atomic from the reader's point of view: old payloads and decoded
    /// handles are gone the moment the new sequence is visible.
    pub fn replace(&mut self, frames: Vec<Vec<u8>>) {
        debug!("FrameStore replace: {} -> {} frames", self.frames.len(), frames.len());
        self.frames = frames;
        self.decoded.lock().unwrap().clear();
    }

    /// Payload bytes at `index`, None outside `[0, len-1]`.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.frames.get(index).map(|f| f.as_slice())
    }

    /// Decoded image at `index`, None outside `[0, len-1]`.
    ///
    /// Decodes on first access and caches per index; repeated seeks hit the
    /// cache. The raw decode buffer never outlives this call.
    pub fn decoded(&self, index: usize) -> Result<Option<Arc<RgbaImage>>, FrameError> {
        let Some(bytes) = self.frames.get(index) else {
            return Ok(None);
        };

        if let Some(image) = self.decoded.lock().unwrap().get(&index) {
            return Ok(Some(Arc::clone(image)));
        }

        let image = image::load_from_memory(bytes)
            .map_err(|e| FrameError::Decode {
                index,
                reason: e.to_string(),
            })?
            .to_rgba8();
        let image = Arc::new(image);

        self.decoded.lock().unwrap().put(index, Arc::clone(&image));
        Ok(Some(image))
    }

    /// Decode every payload now (load-time pre-decode).
    ///
    /// Later frames evict earlier ones once the cache capacity is reached.
    pub fn decode_all(&self) -> Result<(), FrameError> {
        for index in 0..self.frames.len() {
            self.decoded(index)?;
        }
        Ok(())
    }

    /// Drop all payloads and decoded handles.
    pub fn clear(&mut self) {
        debug!("FrameStore clear: dropping {} frames", self.frames.len());
        self.frames.clear();
        self.decoded.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Encode a tiny solid-color PNG
    fn png_bytes(r: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(2, 2, image::Rgba([r, 0, 0, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_replace_and_get() {
        let mut store = FrameStore::new(8);
        store.replace(vec![vec![1], vec![2], vec![3]]);

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(0), Some(&[1u8][..]));
        assert_eq!(store.get(2), Some(&[3u8][..]));
        assert_eq!(store.get(3), None);
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut store = FrameStore::new(8);
        store.replace(vec![vec![1], vec![2], vec![3]]);
        store.replace(vec![vec![9]]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(0), Some(&[9u8][..]));
        assert_eq!(store.get(1), None);
    }

    #[test]
    fn test_decode_caches_per_index() {
        let mut store = FrameStore::new(8);
        store.replace(vec![png_bytes(10), png_bytes(20)]);

        let first = store.decoded(0).unwrap().unwrap();
        let again = store.decoded(0).unwrap().unwrap();

        // Same handle: second access came from the cache
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.get_pixel(0, 0)[0], 10);
    }

    #[test]
    fn test_replace_invalidates_decoded_handles() {
        let mut store = FrameStore::new(8);
        store.replace(vec![png_bytes(10)]);
        let old = store.decoded(0).unwrap().unwrap();

        store.replace(vec![png_bytes(99)]);
        let new = store.decoded(0).unwrap().unwrap();

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.get_pixel(0, 0)[0], 99);
    }

    #[test]
    fn test_decode_out_of_range_is_none() {
        let store = FrameStore::new(8);
        assert!(store.decoded(0).unwrap().is_none());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let mut store = FrameStore::new(8);
        store.replace(vec![vec![0xde, 0xad, 0xbe, 0xef]]);

        let err = store.decoded(0).unwrap_err();
        assert!(err.to_string().contains("frame 0"));
    }

    #[test]
    fn test_decode_all() {
        let mut store = FrameStore::new(8);
        store.replace(vec![png_bytes(1), png_bytes(2), png_bytes(3)]);

        store.decode_all().unwrap();

        let cached = store.decoded(1).unwrap().unwrap();
        let again = store.decoded(1).unwrap().unwrap();
        assert!(Arc::ptr_eq(&cached, &again));
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut store = FrameStore::new(8);
        store.replace(vec![png_bytes(1)]);
        store.decoded(0).unwrap();

        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.get(0), None);
        assert!(store.decoded(0).unwrap().is_none());
    }
}
