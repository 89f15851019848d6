// Skyline bottom-fit rectangle packer
// Keeps the occupied height of the region as a left-to-right list of segments and
// places each rectangle where it ends up highest (smallest "down" value).
// Based on "A Skyline-Based Heuristic for the 2D Rectangular Strip Packing Problem".

use std::cmp::Ordering;

use iced_core::{Point, Size};

use crate::error::PackError;

#[allow(unused_imports)]
use log::{debug, trace};

/// One step of the skyline: `width` pixels occupied down to `down` from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub down: u32,
    pub width: u32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    position: Point<u32>,
}

#[derive(Debug)]
pub struct SkylineAllocator {
    size: Size<u32>,
    skyline: Vec<Segment>,
}

impl SkylineAllocator {
    pub fn new(width: u32, height: u32) -> Self {
        debug_assert!(width > 0 && height > 0);

        Self {
            size: Size::new(width, height),
            skyline: vec![Segment { down: 0, width }],
        }
    }

    pub fn size(&self) -> Size<u32> {
        self.size
    }

    pub fn segments(&self) -> &[Segment] {
        &self.skyline
    }

    /// Lowest point reached by any placed rectangle.
    pub fn used_height(&self) -> u32 {
        self.skyline.iter().map(|segment| segment.down).max().unwrap_or(0)
    }

    /// Places a `width` x `height` rectangle and returns its top-left corner.
    ///
    /// When nothing fits, `grow` receives the current region size and returns the
    /// enlarged one; packing is then retried against the enlarged skyline.
    pub fn pack<F>(&mut self, width: u32, height: u32, mut grow: F) -> Result<Point<u32>, PackError>
    where
        F: FnMut(Size<u32>) -> Size<u32>,
    {
        if width == 0 || height == 0 {
            return Err(PackError::InvalidSize { width, height });
        }

        loop {
            if self.skyline.is_empty() {
                return Err(PackError::CorruptSkyline { width });
            }

            if let Some(candidate) = self.find_best(width) {
                if candidate.position.y.saturating_add(height) <= self.size.height {
                    return self.place(candidate, width, height);
                }
            }

            self.grow(&mut grow)?;
        }
    }

    fn find_best(&self, width: u32) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let mut left = 0;

        for (index, segment) in self.skyline.iter().enumerate() {
            let better = best.map_or(true, |best| segment.down < best.position.y);

            if better && can_insert(width, &self.skyline[index..]) {
                best = Some(Candidate {
                    index,
                    position: Point { x: left, y: segment.down },
                });
            }

            left += segment.width;
        }

        best
    }

    fn grow<F>(&mut self, grow: &mut F) -> Result<(), PackError>
    where
        F: FnMut(Size<u32>) -> Size<u32>,
    {
        let old = self.size;
        let new = grow(old);

        let enlarged = new.width >= old.width
            && new.height >= old.height
            && (new.width > old.width || new.height > old.height);

        if !enlarged {
            return Err(PackError::GrowthRejected {
                old_width: old.width,
                old_height: old.height,
                new_width: new.width,
                new_height: new.height,
            });
        }

        debug!(
            "Skyline region grows from {}x{} to {}x{}",
            old.width, old.height, new.width, new.height
        );

        self.size = new;

        let added = new.width - old.width;
        if added > 0 {
            match self.skyline.last_mut() {
                Some(last) if last.down == 0 => last.width += added,
                _ => self.skyline.push(Segment { down: 0, width: added }),
            }
        }

        Ok(())
    }

    fn place(&mut self, candidate: Candidate, width: u32, height: u32) -> Result<Point<u32>, PackError> {
        let index = candidate.index;
        let new_bottom = candidate.position.y + height;
        let winner = self.skyline[index];

        match winner.width.cmp(&width) {
            Ordering::Equal => {
                self.skyline[index].down = new_bottom;

                self.try_merge(index + 1);
                self.try_merge(index);
            }
            Ordering::Greater => {
                // remainder keeps its height on the right
                self.skyline[index].width -= width;
                self.skyline.insert(index, Segment { down: new_bottom, width });

                self.try_merge(index);
            }
            Ordering::Less => {
                let mut covered = 0;
                let mut last = None;

                for (offset, segment) in self.skyline[index..].iter().enumerate() {
                    covered += segment.width;

                    if covered >= width {
                        last = Some((index + offset, segment.down));
                        break;
                    }
                }

                let (last, last_down) = last.ok_or(PackError::CorruptSkyline { width })?;
                let leftover = covered - width;

                let mut replacement = vec![Segment { down: new_bottom, width }];
                if leftover > 0 {
                    replacement.push(Segment { down: last_down, width: leftover });
                }
                self.skyline.splice(index..=last, replacement);

                self.try_merge(index + 1);
                self.try_merge(index);
            }
        }

        trace!(
            "Packed {}x{} at ({}, {}), {} skyline segments",
            width,
            height,
            candidate.position.x,
            candidate.position.y,
            self.skyline.len()
        );

        Ok(candidate.position)
    }

    /// Merges the segment at `index` into its left neighbour when both share a height.
    fn try_merge(&mut self, index: usize) -> bool {
        if index == 0 || index >= self.skyline.len() {
            return false;
        }

        if self.skyline[index - 1].down == self.skyline[index].down {
            self.skyline[index - 1].width += self.skyline[index].width;
            self.skyline.remove(index);
            return true;
        }

        false
    }
}

/// True when `run` starts with a segment no lower than any segment needed to cover `width`.
fn can_insert(width: u32, run: &[Segment]) -> bool {
    let Some(first) = run.first() else {
        return false;
    };

    let mut covered = 0;
    for segment in run {
        if segment.down > first.down {
            return false;
        }

        covered += segment.width;

        if covered >= width {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use iced_core::Rectangle;

    fn doubling(size: Size<u32>) -> Size<u32> {
        Size::new(size.width * 2, size.height * 2)
    }

    fn assert_invariants(allocator: &SkylineAllocator) {
        let total: u32 = allocator.segments().iter().map(|s| s.width).sum();
        assert_eq!(total, allocator.size().width);

        for pair in allocator.segments().windows(2) {
            assert_ne!(pair[0].down, pair[1].down, "adjacent segments share a height: {:?}", allocator.segments());
        }
        assert!(allocator.segments().iter().all(|s| s.width > 0));
    }

    fn overlaps(a: &Rectangle<u32>, b: &Rectangle<u32>) -> bool {
        a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
    }

    #[test]
    fn test_first_rectangles_share_a_row() {
        let mut allocator = SkylineAllocator::new(100, 100);

        let first = allocator.pack(10, 10, doubling).unwrap();
        let second = allocator.pack(10, 10, doubling).unwrap();

        assert_eq!(first, Point { x: 0, y: 0 });
        assert_eq!(second, Point { x: 10, y: 0 });
        assert_eq!(
            allocator.segments(),
            &[Segment { down: 10, width: 20 }, Segment { down: 0, width: 80 }]
        );
    }

    #[test]
    fn test_too_wide_request_grows_region() {
        let mut allocator = SkylineAllocator::new(100, 100);
        let mut growths = 0;

        let position = allocator
            .pack(200, 10, |size| {
                growths += 1;
                doubling(size)
            })
            .unwrap();

        assert_eq!(growths, 1);
        assert!(allocator.size().width >= 200);
        assert!(position.x + 200 <= allocator.size().width);
        assert!(position.y + 10 <= allocator.size().height);
        assert_invariants(&allocator);
    }

    #[test]
    fn test_too_tall_request_grows_region() {
        let mut allocator = SkylineAllocator::new(64, 64);
        allocator.pack(64, 60, doubling).unwrap();

        let position = allocator.pack(64, 10, doubling).unwrap();

        assert_eq!(allocator.size(), Size::new(128, 128));
        assert!(position.y + 10 <= 128);
        assert_invariants(&allocator);
    }

    #[test]
    fn test_exact_fit_merges_with_neighbours() {
        let mut allocator = SkylineAllocator::new(100, 100);
        allocator.pack(30, 10, doubling).unwrap();
        allocator.pack(40, 20, doubling).unwrap();
        // skyline: (10,30) (20,40) (0,30)
        allocator.pack(30, 10, doubling).unwrap();
        // the 30 wide hole at the right is exact and rises to 10, merging left is not possible (20)
        assert_eq!(
            allocator.segments(),
            &[
                Segment { down: 10, width: 30 },
                Segment { down: 20, width: 40 },
                Segment { down: 10, width: 30 },
            ]
        );

        let position = allocator.pack(30, 10, doubling).unwrap();
        assert_eq!(position, Point { x: 0, y: 10 });
        // left column now at 20 merges into the middle
        assert_eq!(
            allocator.segments(),
            &[Segment { down: 20, width: 70 }, Segment { down: 10, width: 30 }]
        );
        assert_invariants(&allocator);
    }

    #[test]
    fn test_span_of_exactly_two_segments_leaves_no_empty_segment() {
        let mut allocator = SkylineAllocator::new(100, 100);
        allocator.pack(50, 20, doubling).unwrap();
        allocator.pack(50, 10, doubling).unwrap();
        assert_eq!(
            allocator.segments(),
            &[Segment { down: 20, width: 50 }, Segment { down: 10, width: 50 }]
        );

        let position = allocator.pack(100, 5, doubling).unwrap();

        assert_eq!(position, Point { x: 0, y: 20 });
        assert_eq!(allocator.segments(), &[Segment { down: 25, width: 100 }]);
        assert_invariants(&allocator);
    }

    #[test]
    fn test_span_keeps_remainder_at_last_segment_height() {
        let mut allocator = SkylineAllocator::new(100, 100);
        allocator.pack(50, 20, doubling).unwrap();
        allocator.pack(50, 10, doubling).unwrap();

        let position = allocator.pack(70, 5, doubling).unwrap();

        assert_eq!(position, Point { x: 0, y: 20 });
        assert_eq!(
            allocator.segments(),
            &[Segment { down: 25, width: 70 }, Segment { down: 10, width: 30 }]
        );
        assert_invariants(&allocator);
    }

    #[test]
    fn test_zero_sized_request_is_rejected() {
        let mut allocator = SkylineAllocator::new(16, 16);

        assert_eq!(
            allocator.pack(0, 4, doubling),
            Err(PackError::InvalidSize { width: 0, height: 4 })
        );
        assert_eq!(
            allocator.pack(4, 0, doubling),
            Err(PackError::InvalidSize { width: 4, height: 0 })
        );
    }

    #[test]
    fn test_growth_that_does_not_enlarge_is_rejected() {
        let mut allocator = SkylineAllocator::new(16, 16);

        let result = allocator.pack(32, 4, |size| size);

        assert!(matches!(result, Err(PackError::GrowthRejected { .. })));
        assert_eq!(allocator.size(), Size::new(16, 16));
    }

    #[test]
    fn test_random_sequence_never_overlaps() {
        let mut allocator = SkylineAllocator::new(64, 64);
        let mut placed: Vec<Rectangle<u32>> = Vec::new();
        let mut previous_size = allocator.size();
        let mut seed: u32 = 0x2545_f491;

        for _ in 0..300 {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let width = (seed >> 8) % 40 + 1;
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let height = (seed >> 8) % 40 + 1;

            let position = allocator.pack(width, height, doubling).unwrap();
            let size = allocator.size();

            assert!(size.width >= previous_size.width && size.height >= previous_size.height);
            assert!(size.width.is_power_of_two() && size.height.is_power_of_two());
            previous_size = size;

            let rect = Rectangle { x: position.x, y: position.y, width, height };
            assert!(rect.x + rect.width <= size.width);
            assert!(rect.y + rect.height <= size.height);

            for other in &placed {
                assert!(!overlaps(&rect, other), "{rect:?} overlaps {other:?}");
            }
            placed.push(rect);

            assert_invariants(&allocator);
        }
    }
}
