//! Decoded tile imagery and the handle nodes keep once loaded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::FetchError;

/// A decoded raster tile in RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<Vec<u8>>,
}

impl TileImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            width,
            height,
            rgba: Arc::new(rgba),
        }
    }

    /// Single-colour image, handy for synthetic providers.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut rgba = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            rgba.extend_from_slice(&color);
        }
        Self::new(width, height, rgba)
    }

    /// Decodes PNG/JPEG bytes as served by raster tile endpoints.
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| FetchError::Decode(e.to_string()))?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        Ok(Self::new(width, height, decoded.into_raw()))
    }

    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }
}

impl std::fmt::Debug for TileImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque texture bound to a loaded node. Cloning shares the pixels.
#[derive(Debug, Clone)]
pub struct TextureHandle {
    id: u64,
    image: TileImage,
}

impl TextureHandle {
    pub fn new(image: TileImage) -> Self {
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            image,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn image(&self) -> &TileImage {
        &self.image
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
