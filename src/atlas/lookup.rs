use std::collections::HashMap;

use glam::Vec2;
use iced_core::{Rectangle, Size};

use crate::atlas::ImageKey;

/// Where a registered image lives in the atlas, in pixels and in normalized UVs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRecord {
    pub bounds: Rectangle<u32>,
    pub top_left: Vec2,
    pub top_right: Vec2,
    pub bottom_left: Vec2,
    pub bottom_right: Vec2,
}

impl PlacementRecord {
    pub fn new(bounds: Rectangle<u32>, atlas_size: Size<u32>) -> Self {
        let mut record = Self {
            bounds,
            top_left: Vec2::ZERO,
            top_right: Vec2::ZERO,
            bottom_left: Vec2::ZERO,
            bottom_right: Vec2::ZERO,
        };
        record.rescale(atlas_size);
        record
    }

    /// Recomputes the UV corners for an atlas of `atlas_size`; the pixel bounds stay put.
    pub fn rescale(&mut self, atlas_size: Size<u32>) {
        let (top_left, bottom_right) = normalize(self.bounds, atlas_size);

        self.top_left = top_left;
        self.bottom_right = bottom_right;
        self.top_right = Vec2::new(bottom_right.x, top_left.y);
        self.bottom_left = Vec2::new(top_left.x, bottom_right.y);
    }

    pub fn size(&self) -> Size<u32> {
        Size::new(self.bounds.width, self.bounds.height)
    }
}

/// Converts a pixel rectangle to its normalized top-left and bottom-right corners.
pub fn normalize(rect: Rectangle<u32>, atlas_size: Size<u32>) -> (Vec2, Vec2) {
    let atlas = Vec2::new(atlas_size.width as f32, atlas_size.height as f32);
    let top_left = Vec2::new(rect.x as f32, rect.y as f32);
    let bottom_right = top_left + Vec2::new(rect.width as f32, rect.height as f32);

    (top_left / atlas, bottom_right / atlas)
}

/// Placement records of every image registered with one batcher.
#[derive(Debug, Default)]
pub struct HandleTable {
    records: HashMap<ImageKey, PlacementRecord>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ImageKey) -> Option<&PlacementRecord> {
        self.records.get(&key)
    }

    pub fn contains(&self, key: ImageKey) -> bool {
        self.records.contains_key(&key)
    }

    pub fn insert(&mut self, key: ImageKey, record: PlacementRecord) {
        self.records.insert(key, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageKey, &PlacementRecord)> {
        self.records.iter().map(|(key, record)| (*key, record))
    }

    /// Rewrites every record's UVs after the atlas changed size.
    pub fn rescale_all(&mut self, atlas_size: Size<u32>) {
        for record in self.records.values_mut() {
            record.rescale(atlas_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: u32, y: u32, width: u32, height: u32) -> Rectangle<u32> {
        Rectangle { x, y, width, height }
    }

    #[test]
    fn test_corners_follow_bounds() {
        let record = PlacementRecord::new(rect(64, 32, 64, 32), Size::new(256, 128));

        assert_eq!(record.top_left, Vec2::new(0.25, 0.25));
        assert_eq!(record.top_right, Vec2::new(0.5, 0.25));
        assert_eq!(record.bottom_left, Vec2::new(0.25, 0.5));
        assert_eq!(record.bottom_right, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn test_rescale_matches_direct_normalization() {
        let bounds = rect(13, 7, 29, 31);
        let mut table = HandleTable::new();
        table.insert(ImageKey(1), PlacementRecord::new(bounds, Size::new(100, 100)));

        table.rescale_all(Size::new(200, 200));

        let record = table.get(ImageKey(1)).unwrap();
        let direct = PlacementRecord::new(bounds, Size::new(200, 200));
        assert_eq!(*record, direct);
        assert_eq!(record.bounds, bounds);
    }

    #[test]
    fn test_missing_key() {
        let table = HandleTable::new();
        assert!(table.get(ImageKey(9)).is_none());
        assert!(table.is_empty());
    }
}
