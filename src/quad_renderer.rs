// Immediate single-quad drawing, for surfaces that are not worth packing into an atlas
// (render targets, debug views of the atlas itself).

use glam::Vec2;
use iced_core::Size;

use crate::backend::{DrawCall, GraphicsBackend, RenderState};
use crate::batcher::{Vertex, INDICES_PER_QUAD, QUAD_INDICES};

pub struct QuadRenderer<B: GraphicsBackend> {
    vertex_buffer: B::VertexBuffer,
    index_buffer: B::IndexBuffer,
}

impl<B: GraphicsBackend> QuadRenderer<B> {
    pub fn new(backend: &mut B) -> Self {
        Self {
            vertex_buffer: backend.create_vertex_buffer(4),
            index_buffer: backend.create_index_buffer(&QUAD_INDICES),
        }
    }

    /// Draws all of `texture` with its top-left corner at `position`, one pixel per texel.
    pub fn draw(&self, backend: &mut B, texture: &B::Surface, size: Size<u32>, position: Vec2) {
        let size = Vec2::new(size.width as f32, size.height as f32);
        let white = [255; 4];

        let quad = [
            Vertex { position: position.to_array(), color: white, tex_coords: [0.0, 0.0] },
            Vertex { position: (position + size * Vec2::X).to_array(), color: white, tex_coords: [1.0, 0.0] },
            Vertex { position: (position + size * Vec2::Y).to_array(), color: white, tex_coords: [0.0, 1.0] },
            Vertex { position: (position + size).to_array(), color: white, tex_coords: [1.0, 1.0] },
        ];

        backend.write_vertices(&self.vertex_buffer, &quad);

        let transform = backend.viewport().orthographic();
        backend.draw_indexed(DrawCall {
            vertices: &self.vertex_buffer,
            indices: &self.index_buffer,
            atlas: texture,
            transform,
            state: RenderState::default(),
            index_count: INDICES_PER_QUAD as u32,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, Viewport};

    #[test]
    fn test_draws_full_texture() {
        let mut backend = HeadlessBackend::new(Viewport::new(320, 240));
        let texture = backend.create_surface(Size::new(32, 16));
        let renderer = QuadRenderer::new(&mut backend);

        renderer.draw(&mut backend, &texture, Size::new(32, 16), Vec2::new(4.0, 8.0));

        let draw = &backend.draws()[0];
        assert_eq!(draw.atlas, texture);
        assert_eq!(draw.indices, QUAD_INDICES.to_vec());
        assert_eq!(draw.vertices[3].position, [36.0, 24.0]);
        assert_eq!(draw.vertices[3].tex_coords, [1.0, 1.0]);
        assert_eq!(draw.transform, Viewport::new(320, 240).orthographic());
    }
}
