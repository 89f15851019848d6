// CPU-side backend
// Surfaces are plain RGBA8 images and draw calls are recorded instead of rasterized.
// Used for offline atlas baking and as the backend in tests.

use glam::Mat4;
use iced_core::{Rectangle, Size};
use image::{imageops, ImageBuffer, Rgba, RgbaImage};

use crate::backend::{DrawCall, GraphicsBackend, RenderState, Viewport};
use crate::batcher::{Vertex, INDICES_PER_QUAD, VERTICES_PER_QUAD};

#[allow(unused_imports)]
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// Snapshot of one `draw_indexed` call.
#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub atlas: SurfaceId,
    pub transform: Mat4,
    pub state: RenderState,
    pub index_count: u32,
    /// Vertices referenced by the draw, in buffer order.
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

#[derive(Debug)]
pub struct HeadlessBackend {
    surfaces: Vec<Option<RgbaImage>>,
    vertex_buffers: Vec<Vec<Vertex>>,
    index_buffers: Vec<Vec<u32>>,
    viewport: Viewport,
    draws: Vec<RecordedDraw>,
}

impl HeadlessBackend {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            surfaces: Vec::new(),
            vertex_buffers: Vec::new(),
            index_buffers: Vec::new(),
            viewport,
            draws: Vec::new(),
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn surface(&self, id: &SurfaceId) -> Option<&RgbaImage> {
        self.surfaces.get(id.0).and_then(Option::as_ref)
    }

    /// Number of surfaces created and not yet destroyed.
    pub fn live_surfaces(&self) -> usize {
        self.surfaces.iter().filter(|surface| surface.is_some()).count()
    }

    pub fn vertex_buffers_created(&self) -> usize {
        self.vertex_buffers.len()
    }

    pub fn vertex_buffer(&self, id: &BufferId) -> Option<&[Vertex]> {
        self.vertex_buffers.get(id.0).map(Vec::as_slice)
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
        std::mem::take(&mut self.draws)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(Viewport::new(800, 600))
    }
}

impl GraphicsBackend for HeadlessBackend {
    type Surface = SurfaceId;
    type VertexBuffer = BufferId;
    type IndexBuffer = BufferId;

    fn create_surface(&mut self, size: Size<u32>) -> SurfaceId {
        self.surfaces.push(Some(RgbaImage::new(size.width, size.height)));
        SurfaceId(self.surfaces.len() - 1)
    }

    fn destroy_surface(&mut self, surface: SurfaceId) {
        match self.surfaces.get_mut(surface.0) {
            Some(slot) => *slot = None,
            None => warn!("Destroying unknown headless surface {:?}", surface),
        }
    }

    fn write_pixels(&mut self, surface: &SurfaceId, region: Rectangle<u32>, pixels: &[u8]) {
        let Some(target) = self.surfaces.get_mut(surface.0).and_then(Option::as_mut) else {
            warn!("Pixel write into missing surface {:?}", surface);
            return;
        };

        let Some(block) = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(region.width, region.height, pixels) else {
            warn!(
                "Pixel block of {} bytes does not cover a {}x{} region",
                pixels.len(),
                region.width,
                region.height
            );
            return;
        };

        imageops::replace(target, &block, region.x as i64, region.y as i64);
    }

    fn copy_surface(&mut self, source: &SurfaceId, destination: &SurfaceId, region: Rectangle<u32>) {
        let Some(source_image) = self.surface(source) else {
            warn!("Copy from missing surface {:?}", source);
            return;
        };

        let block = imageops::crop_imm(source_image, region.x, region.y, region.width, region.height).to_image();

        match self.surfaces.get_mut(destination.0).and_then(Option::as_mut) {
            Some(target) => imageops::replace(target, &block, region.x as i64, region.y as i64),
            None => warn!("Copy into missing surface {:?}", destination),
        }
    }

    fn create_vertex_buffer(&mut self, capacity: usize) -> BufferId {
        self.vertex_buffers.push(vec![Vertex::default(); capacity]);
        BufferId(self.vertex_buffers.len() - 1)
    }

    fn write_vertices(&mut self, buffer: &BufferId, vertices: &[Vertex]) {
        match self.vertex_buffers.get_mut(buffer.0) {
            Some(storage) if storage.len() >= vertices.len() => {
                storage[..vertices.len()].copy_from_slice(vertices);
            }
            Some(storage) => warn!(
                "Vertex upload of {} exceeds buffer capacity {}",
                vertices.len(),
                storage.len()
            ),
            None => warn!("Vertex upload into missing buffer {:?}", buffer),
        }
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferId {
        self.index_buffers.push(indices.to_vec());
        BufferId(self.index_buffers.len() - 1)
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn draw_indexed(&mut self, call: DrawCall<'_, Self>) {
        let quads = call.index_count as usize / INDICES_PER_QUAD;
        let vertex_count = quads * VERTICES_PER_QUAD;

        let vertices = self
            .vertex_buffers
            .get(call.vertices.0)
            .map(|buffer| buffer[..vertex_count.min(buffer.len())].to_vec())
            .unwrap_or_default();
        let indices = self
            .index_buffers
            .get(call.indices.0)
            .map(|buffer| buffer[..(call.index_count as usize).min(buffer.len())].to_vec())
            .unwrap_or_default();

        debug!("Headless draw: {} indices, atlas {:?}", call.index_count, call.atlas);

        self.draws.push(RecordedDraw {
            atlas: *call.atlas,
            transform: call.transform,
            state: call.state,
            index_count: call.index_count,
            vertices,
            indices,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_copy_pixels() {
        let mut backend = HeadlessBackend::default();
        let small = backend.create_surface(Size::new(4, 4));
        let large = backend.create_surface(Size::new(8, 8));

        let red = [255u8, 0, 0, 255].repeat(4);
        backend.write_pixels(&small, Rectangle { x: 1, y: 1, width: 2, height: 2 }, &red);
        backend.copy_surface(&small, &large, Rectangle { x: 0, y: 0, width: 4, height: 4 });
        backend.destroy_surface(small);

        let large_image = backend.surface(&large).unwrap();
        assert_eq!(large_image.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(large_image.get_pixel(2, 2), &Rgba([255, 0, 0, 255]));
        assert_eq!(large_image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(backend.live_surfaces(), 1);
    }

    #[test]
    fn test_short_pixel_block_is_ignored() {
        let mut backend = HeadlessBackend::default();
        let surface = backend.create_surface(Size::new(4, 4));

        backend.write_pixels(&surface, Rectangle { x: 0, y: 0, width: 2, height: 2 }, &[255; 4]);

        assert_eq!(backend.surface(&surface).unwrap().get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
    }
}
