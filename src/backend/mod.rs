// Graphics Backend Module
// The small set of GPU operations the batcher needs: pixel surfaces, vertex and
// index buffers, and a single indexed triangle-list draw with the sprite_batcher
// shader parameters (Atlas texture, Transform matrix).

pub mod headless;
pub mod state;
pub mod gpu;

use glam::Mat4;
use iced_core::{Rectangle, Size};

use crate::batcher::Vertex;

pub use headless::HeadlessBackend;
pub use state::{BlendMode, CullMode, DepthMode, RenderState, SamplerMode};
pub use gpu::{AtlasTexture, WgpuBackend};

/// Region of the render target in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// Orthographic projection mapping viewport pixels (y down) to clip space.
    pub fn orthographic(&self) -> Mat4 {
        let left = self.x as f32;
        let top = self.y as f32;
        let right = left + self.width as f32;
        let bottom = top + self.height as f32;

        Mat4::orthographic_rh(left, right, bottom, top, 0.0, 1.0)
    }
}

/// Everything one batched draw needs.
pub struct DrawCall<'a, B: GraphicsBackend + ?Sized> {
    pub vertices: &'a B::VertexBuffer,
    pub indices: &'a B::IndexBuffer,
    /// Bound to the shader's `Atlas` parameter.
    pub atlas: &'a B::Surface,
    /// Bound to the shader's `Transform` parameter.
    pub transform: Mat4,
    pub state: RenderState,
    pub index_count: u32,
}

pub trait GraphicsBackend {
    type Surface;
    type VertexBuffer;
    type IndexBuffer;

    /// Creates a blank RGBA8 surface.
    fn create_surface(&mut self, size: Size<u32>) -> Self::Surface;

    fn destroy_surface(&mut self, surface: Self::Surface);

    /// Writes tightly packed RGBA8 `pixels` into `region` of `surface`.
    fn write_pixels(&mut self, surface: &Self::Surface, region: Rectangle<u32>, pixels: &[u8]);

    /// Copies `region` of `source` to the same region of `destination`.
    fn copy_surface(&mut self, source: &Self::Surface, destination: &Self::Surface, region: Rectangle<u32>);

    fn create_vertex_buffer(&mut self, capacity: usize) -> Self::VertexBuffer;

    /// Overwrites the start of `buffer` with `vertices`.
    fn write_vertices(&mut self, buffer: &Self::VertexBuffer, vertices: &[Vertex]);

    fn create_index_buffer(&mut self, indices: &[u32]) -> Self::IndexBuffer;

    fn viewport(&self) -> Viewport;

    fn draw_indexed(&mut self, call: DrawCall<'_, Self>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_orthographic_maps_corners() {
        let projection = Viewport::new(800, 600).orthographic();

        let top_left = projection.transform_point3(Vec3::new(0.0, 0.0, 0.0));
        let bottom_right = projection.transform_point3(Vec3::new(800.0, 600.0, 0.0));

        assert!((top_left.x + 1.0).abs() < 1e-6 && (top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6 && (bottom_right.y + 1.0).abs() < 1e-6);
    }
}
