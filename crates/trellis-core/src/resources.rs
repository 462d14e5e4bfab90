//! Image Resources
//!
//! Opaque image handles. The core validates buffer shapes and passes handles
//! through; decoding and upload belong to the renderer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Image resource errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImageError {
    #[error("Image has zero width or height ({width}x{height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Pixel buffer is {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("No image registered as `{0}`")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawImageFormat {
    R8,
    RG8,
    RGB8,
    RGBA8,
    BGRA8,
}

impl RawImageFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::R8 => 1,
            Self::RG8 => 2,
            Self::RGB8 => 3,
            Self::RGBA8 | Self::BGRA8 => 4,
        }
    }
}

/// Decoded pixels
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: usize,
    pub height: usize,
    pub format: RawImageFormat,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ImageData {
    Raw(RawImage),
    /// Size-only placeholder, filled in by the renderer
    Null { width: usize, height: usize },
}

/// Shared image handle; equality is identity
#[derive(Debug, Clone)]
pub struct ImageRef {
    data: Arc<ImageData>,
}

impl ImageRef {
    /// Wrap decoded pixels after checking the buffer matches the declared shape
    pub fn new_rawimage(image: RawImage) -> Result<Self, ImageError> {
        if image.width == 0 || image.height == 0 {
            return Err(ImageError::InvalidDimensions { width: image.width, height: image.height });
        }
        let expected = image.width * image.height * image.format.bytes_per_pixel();
        if image.pixels.len() != expected {
            return Err(ImageError::BufferSizeMismatch { expected, actual: image.pixels.len() });
        }
        Ok(Self { data: Arc::new(ImageData::Raw(image)) })
    }

    pub fn null_image(width: usize, height: usize) -> Self {
        Self { data: Arc::new(ImageData::Null { width, height }) }
    }

    pub fn size(&self) -> (usize, usize) {
        match &*self.data {
            ImageData::Raw(raw) => (raw.width, raw.height),
            ImageData::Null { width, height } => (*width, *height),
        }
    }

    pub fn raw_image(&self) -> Option<&RawImage> {
        match &*self.data {
            ImageData::Raw(raw) => Some(raw),
            ImageData::Null { .. } => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(*self.data, ImageData::Null { .. })
    }
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

/// Named images shared by all windows of an app
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
    images: BTreeMap<String, ImageRef>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `image`, returning the handle it replaced
    pub fn add(&mut self, id: impl Into<String>, image: ImageRef) -> Option<ImageRef> {
        let id = id.into();
        debug!(id = %id, size = ?image.size(), "image added");
        self.images.insert(id, image)
    }

    pub fn get(&self, id: &str) -> Result<&ImageRef, ImageError> {
        self.images.get(id).ok_or_else(|| ImageError::NotFound(id.to_string()))
    }

    pub fn remove(&mut self, id: &str) -> Option<ImageRef> {
        self.images.remove(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rawimage_validation() {
        let ok = RawImage { width: 2, height: 2, format: RawImageFormat::RGBA8, pixels: vec![0; 16] };
        assert!(ImageRef::new_rawimage(ok).is_ok());

        let short = RawImage { width: 2, height: 2, format: RawImageFormat::RGB8, pixels: vec![0; 11] };
        assert_eq!(
            ImageRef::new_rawimage(short),
            Err(ImageError::BufferSizeMismatch { expected: 12, actual: 11 })
        );

        let empty = RawImage { width: 0, height: 3, format: RawImageFormat::R8, pixels: vec![] };
        assert!(matches!(ImageRef::new_rawimage(empty), Err(ImageError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_identity_equality() {
        let a = ImageRef::null_image(4, 4);
        let b = ImageRef::null_image(4, 4);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert!(a.is_null());
        assert_eq!(a.size(), (4, 4));
    }

    #[test]
    fn test_cache_lookup() {
        let mut cache = ImageCache::new();
        assert!(matches!(cache.get("logo"), Err(ImageError::NotFound(_))));
        cache.add("logo", ImageRef::null_image(1, 1));
        assert!(cache.get("logo").is_ok());
        assert_eq!(cache.len(), 1);
    }
}
