use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use iced_core::Size;
use image::{DynamicImage, RgbaImage};

use crate::atlas::ImageKey;
use crate::error::Result;

#[allow(unused_imports)]
use log::{debug, info, warn};

static NEXT_IMAGE_KEY: AtomicU32 = AtomicU32::new(0);

/// RGBA8 pixels plus the key batchers use to recognise the image.
///
/// Clones share both the pixels and the key, so registering a clone is the same
/// as registering the original.
#[derive(Debug, Clone)]
pub struct SourceImage {
    key: ImageKey,
    pixels: Arc<RgbaImage>,
}

impl SourceImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            key: ImageKey(NEXT_IMAGE_KEY.fetch_add(1, Ordering::Relaxed)),
            pixels: Arc::new(pixels),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_rgba8())
    }

    /// Decodes an image file into RGBA8.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)?;
        debug!("Decoded {} ({}x{})", path.display(), image.width(), image.height());
        Ok(Self::from_dynamic(image))
    }

    pub fn key(&self) -> ImageKey {
        self.key
    }

    pub fn size(&self) -> Size<u32> {
        Size::new(self.pixels.width(), self.pixels.height())
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub(crate) fn shared_pixels(&self) -> Arc<RgbaImage> {
        Arc::clone(&self.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_distinct_and_shared_by_clones() {
        let a = SourceImage::new(RgbaImage::new(4, 4));
        let b = SourceImage::new(RgbaImage::new(4, 4));

        assert_ne!(a.key(), b.key());
        assert_eq!(a.clone().key(), a.key());
        assert_eq!(a.size(), Size::new(4, 4));
    }
}
