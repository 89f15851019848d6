use glam::{Mat4, Vec2};
use iced_core::{Color, Rectangle, Size};

use crate::atlas::lookup::normalize;
use crate::atlas::PlacementRecord;
use crate::batcher::{Vertex, VERTICES_PER_QUAD};

const TOP_LEFT: usize = 0;
const TOP_RIGHT: usize = 1;
const BOTTOM_LEFT: usize = 2;
const BOTTOM_RIGHT: usize = 3;

bitflags::bitflags! {
    /// Mirroring applied to a quad's texture coordinates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpriteEffects: u8 {
        const FLIP_HORIZONTALLY = 1;
        const FLIP_VERTICALLY = 2;
    }
}

/// Mutable view of the four vertices of one batched quad.
///
/// Returned by [`AtlasBatcher::draw`](crate::AtlasBatcher::draw). The view borrows the
/// batcher, so it has to be dropped before anything else is drawn or submitted.
#[derive(Debug)]
pub struct QuadView<'a> {
    vertices: &'a mut [Vertex],
    /// Pivot for rotation and scaling, in the same space as the draw position.
    origin: Vec2,
    placement: PlacementRecord,
    atlas_size: Size<u32>,
}

impl<'a> QuadView<'a> {
    /// Lays out an axis-aligned quad at `position` covering the placed image.
    pub(crate) fn new(
        vertices: &'a mut [Vertex],
        position: Vec2,
        origin: Vec2,
        placement: PlacementRecord,
        atlas_size: Size<u32>,
    ) -> Self {
        debug_assert_eq!(vertices.len(), VERTICES_PER_QUAD);

        let size = Vec2::new(placement.bounds.width as f32, placement.bounds.height as f32);
        let corners = [
            (position, placement.top_left),
            (position + Vec2::new(size.x, 0.0), placement.top_right),
            (position + Vec2::new(0.0, size.y), placement.bottom_left),
            (position + size, placement.bottom_right),
        ];

        for (vertex, (corner, uv)) in vertices.iter_mut().zip(corners) {
            *vertex = Vertex {
                position: corner.to_array(),
                color: [255; 4],
                tex_coords: uv.to_array(),
            };
        }

        Self {
            vertices,
            origin,
            placement,
            atlas_size,
        }
    }

    /// Rotates the quad about the pivot.
    pub fn rotate(self, radians: f32) -> Self {
        if radians == 0.0 {
            return self;
        }

        let (sin, cos) = radians.sin_cos();
        self.map_positions(|offset| Vec2::new(offset.x * cos - offset.y * sin, offset.x * sin + offset.y * cos))
    }

    pub fn transform(mut self, matrix: Mat4) -> Self {
        for vertex in self.vertices.iter_mut() {
            let position = Vec2::from_array(vertex.position).extend(0.0);
            vertex.position = matrix.transform_point3(position).truncate().to_array();
        }
        self
    }

    pub fn scale(self, factor: f32) -> Self {
        self.scale_xy(Vec2::splat(factor))
    }

    /// Scales the quad about the pivot, per axis.
    pub fn scale_xy(self, factor: Vec2) -> Self {
        self.map_positions(|offset| offset * factor)
    }

    /// Mirrors sampling left to right. Geometry is left alone.
    pub fn flip_horizontally(mut self) -> Self {
        self.swap_tex_coord(TOP_LEFT, TOP_RIGHT, 0);
        self.swap_tex_coord(BOTTOM_LEFT, BOTTOM_RIGHT, 0);
        self
    }

    pub fn flip_vertically(mut self) -> Self {
        self.swap_tex_coord(TOP_LEFT, BOTTOM_LEFT, 1);
        self.swap_tex_coord(TOP_RIGHT, BOTTOM_RIGHT, 1);
        self
    }

    pub fn apply_effect(self, effects: SpriteEffects) -> Self {
        let mut quad = self;
        if effects.contains(SpriteEffects::FLIP_HORIZONTALLY) {
            quad = quad.flip_horizontally();
        }
        if effects.contains(SpriteEffects::FLIP_VERTICALLY) {
            quad = quad.flip_vertically();
        }
        quad
    }

    /// Samples only `source`, given in pixels relative to the image's top-left corner.
    pub fn set_source(mut self, source: Rectangle<u32>) -> Self {
        let atlas_rect = Rectangle {
            x: self.placement.bounds.x + source.x,
            y: self.placement.bounds.y + source.y,
            width: source.width,
            height: source.height,
        };
        let (top_left, bottom_right) = normalize(atlas_rect, self.atlas_size);

        self.vertices[TOP_LEFT].tex_coords = top_left.to_array();
        self.vertices[TOP_RIGHT].tex_coords = [bottom_right.x, top_left.y];
        self.vertices[BOTTOM_LEFT].tex_coords = [top_left.x, bottom_right.y];
        self.vertices[BOTTOM_RIGHT].tex_coords = bottom_right.to_array();
        self
    }

    pub fn tint(mut self, color: Color) -> Self {
        let rgba = color.into_rgba8();
        for vertex in self.vertices.iter_mut() {
            vertex.color = rgba;
        }
        self
    }

    pub fn vertices(&self) -> &[Vertex] {
        self.vertices
    }

    fn map_positions(mut self, f: impl Fn(Vec2) -> Vec2) -> Self {
        for vertex in self.vertices.iter_mut() {
            let offset = Vec2::from_array(vertex.position) - self.origin;
            vertex.position = (f(offset) + self.origin).to_array();
        }
        self
    }

    fn swap_tex_coord(&mut self, a: usize, b: usize, axis: usize) {
        let (first, second) = (self.vertices[a].tex_coords[axis], self.vertices[b].tex_coords[axis]);
        self.vertices[a].tex_coords[axis] = second;
        self.vertices[b].tex_coords[axis] = first;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement() -> PlacementRecord {
        PlacementRecord::new(Rectangle { x: 16, y: 0, width: 16, height: 8 }, Size::new(64, 64))
    }

    fn quad(vertices: &mut [Vertex], origin: Vec2) -> QuadView<'_> {
        QuadView::new(vertices, Vec2::new(10.0, 20.0), origin, placement(), Size::new(64, 64))
    }

    #[test]
    fn test_initial_layout() {
        let mut vertices = [Vertex::default(); 4];
        let view = quad(&mut vertices, Vec2::ZERO);

        let positions: Vec<[f32; 2]> = view.vertices().iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![[10.0, 20.0], [26.0, 20.0], [10.0, 28.0], [26.0, 28.0]]);
        assert_eq!(view.vertices()[3].tex_coords, [0.5, 0.125]);
        assert!(view.vertices().iter().all(|v| v.color == [255; 4]));
    }

    #[test]
    fn test_rotate_zero_is_exact() {
        let mut vertices = [Vertex::default(); 4];
        let before = quad(&mut vertices, Vec2::new(3.3, 7.7)).vertices().to_vec();

        let mut rotated = [Vertex::default(); 4];
        quad(&mut rotated, Vec2::new(3.3, 7.7)).rotate(0.0);

        assert_eq!(before, rotated.to_vec());
    }

    #[test]
    fn test_rotate_about_pivot() {
        let mut vertices = [Vertex::default(); 4];
        quad(&mut vertices, Vec2::new(10.0, 20.0)).rotate(std::f32::consts::FRAC_PI_2);

        // TR (26, 20) swings to (10, 36) around the top-left corner
        assert_eq!(vertices[0].position, [10.0, 20.0]);
        assert!((vertices[1].position[0] - 10.0).abs() < 1e-4);
        assert!((vertices[1].position[1] - 36.0).abs() < 1e-4);
    }

    #[test]
    fn test_scale_about_pivot() {
        let mut vertices = [Vertex::default(); 4];
        quad(&mut vertices, Vec2::new(18.0, 24.0)).scale(2.0);

        assert_eq!(vertices[0].position, [2.0, 16.0]);
        assert_eq!(vertices[3].position, [34.0, 32.0]);

        let mut vertices = [Vertex::default(); 4];
        quad(&mut vertices, Vec2::new(10.0, 20.0)).scale_xy(Vec2::new(1.0, 0.5));
        assert_eq!(vertices[3].position, [26.0, 24.0]);
    }

    #[test]
    fn test_flip_twice_restores() {
        let mut vertices = [Vertex::default(); 4];
        let before = quad(&mut vertices, Vec2::ZERO).vertices().to_vec();

        let flipped = quad(&mut vertices, Vec2::ZERO).flip_horizontally();
        assert_eq!(flipped.vertices()[0].tex_coords[0], before[3].tex_coords[0]);
        assert_eq!(flipped.vertices()[3].tex_coords[0], before[0].tex_coords[0]);
        flipped.flip_horizontally();

        assert_eq!(vertices.to_vec(), before);
    }

    #[test]
    fn test_apply_effect_flips_both_axes() {
        let mut vertices = [Vertex::default(); 4];
        let before = quad(&mut vertices, Vec2::ZERO).vertices().to_vec();

        quad(&mut vertices, Vec2::ZERO).apply_effect(SpriteEffects::FLIP_HORIZONTALLY | SpriteEffects::FLIP_VERTICALLY);

        assert_eq!(vertices[0].tex_coords, before[3].tex_coords);
        assert_eq!(vertices[1].tex_coords, before[2].tex_coords);
        assert_eq!(vertices[0].position, before[0].position);
    }

    #[test]
    fn test_set_source_is_image_local() {
        let mut vertices = [Vertex::default(); 4];
        quad(&mut vertices, Vec2::ZERO).set_source(Rectangle { x: 8, y: 4, width: 8, height: 4 });

        assert_eq!(vertices[0].tex_coords, [24.0 / 64.0, 4.0 / 64.0]);
        assert_eq!(vertices[1].tex_coords, [0.5, 4.0 / 64.0]);
        assert_eq!(vertices[2].tex_coords, [24.0 / 64.0, 0.125]);
        assert_eq!(vertices[3].tex_coords, [0.5, 0.125]);
    }

    #[test]
    fn test_transform_and_tint() {
        let mut vertices = [Vertex::default(); 4];
        quad(&mut vertices, Vec2::ZERO)
            .transform(Mat4::from_translation(glam::Vec3::new(5.0, -5.0, 0.0)))
            .tint(Color::from_rgb8(255, 0, 0));

        assert_eq!(vertices[0].position, [15.0, 15.0]);
        assert_eq!(vertices[2].color, [255, 0, 0, 255]);
    }
}
