use std::collections::VecDeque;
use std::sync::Arc;

use iced_core::Rectangle;
use image::RgbaImage;

/// A pixel copy into the atlas, deferred until the next submit.
#[derive(Debug)]
pub enum PendingUpload<S> {
    /// Pixels of a newly registered image.
    Image {
        pixels: Arc<RgbaImage>,
        region: Rectangle<u32>,
    },
    /// Contents of the atlas that was replaced by growth. The source surface is
    /// destroyed once copied.
    AtlasCopy { source: S, region: Rectangle<u32> },
}

impl<S> PendingUpload<S> {
    pub fn region(&self) -> Rectangle<u32> {
        match self {
            PendingUpload::Image { region, .. } | PendingUpload::AtlasCopy { region, .. } => *region,
        }
    }

    pub fn disposes_source(&self) -> bool {
        matches!(self, PendingUpload::AtlasCopy { .. })
    }
}

/// FIFO of pending uploads, with the atlas self-copy always first.
#[derive(Debug)]
pub struct UploadQueue<S> {
    pending: VecDeque<PendingUpload<S>>,
}

impl<S> Default for UploadQueue<S> {
    fn default() -> Self {
        Self { pending: VecDeque::new() }
    }
}

impl<S> UploadQueue<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_image(&mut self, pixels: Arc<RgbaImage>, region: Rectangle<u32>) {
        self.pending.push_back(PendingUpload::Image { pixels, region });
    }

    /// Queues the copy of a replaced atlas.
    ///
    /// Only the surface that was current at the last flush holds pixels. If a copy
    /// from that surface is already queued, `source` never received any and is
    /// handed back so the caller can destroy it right away.
    pub fn push_atlas_copy(&mut self, source: S, region: Rectangle<u32>) -> Option<S> {
        if self.has_atlas_copy() {
            return Some(source);
        }

        self.pending.push_front(PendingUpload::AtlasCopy { source, region });
        None
    }

    pub fn has_atlas_copy(&self) -> bool {
        self.pending.iter().any(PendingUpload::disposes_source)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, PendingUpload<S>> {
        self.pending.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(size: u32) -> Rectangle<u32> {
        Rectangle { x: 0, y: 0, width: size, height: size }
    }

    #[test]
    fn test_atlas_copy_runs_before_images() {
        let mut queue: UploadQueue<&str> = UploadQueue::new();
        queue.push_image(Arc::new(RgbaImage::new(2, 2)), region(2));
        assert!(queue.push_atlas_copy("old", region(16)).is_none());

        let order: Vec<bool> = queue.drain().map(|upload| upload.disposes_source()).collect();
        assert_eq!(order, vec![true, false]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_second_growth_returns_blank_surface() {
        let mut queue: UploadQueue<&str> = UploadQueue::new();
        assert!(queue.push_atlas_copy("first", region(16)).is_none());

        assert_eq!(queue.push_atlas_copy("second", region(32)), Some("second"));
        assert_eq!(queue.len(), 1);

        match queue.drain().next() {
            Some(PendingUpload::AtlasCopy { source, region: copied }) => {
                assert_eq!(source, "first");
                assert_eq!(copied, region(16));
            }
            other => panic!("unexpected upload {other:?}"),
        };
    }
}
