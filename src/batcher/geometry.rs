// CPU-side geometry for the batched draw.
// Quads are 4 vertices (TL, TR, BL, BR) and always use the same 6-index pattern.

#[allow(unused_imports)]
use log::{debug, info, warn};

pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

/// Index pattern of one quad relative to its first vertex: TL-TR-BL, TR-BR-BL.
pub const QUAD_INDICES: [u32; INDICES_PER_QUAD] = [0, 1, 2, 1, 3, 2];

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    /// RGBA8, normalized by the vertex fetch.
    pub color: [u8; 4],
    pub tex_coords: [f32; 2],
}

/// Writes the index pattern for quads `first_quad..first_quad + quad_count`.
pub fn write_indices(indices: &mut [u32], first_quad: usize, quad_count: usize) {
    for quad in first_quad..first_quad + quad_count {
        let base = (quad * VERTICES_PER_QUAD) as u32;
        let start = quad * INDICES_PER_QUAD;

        for (slot, offset) in indices[start..start + INDICES_PER_QUAD].iter_mut().zip(QUAD_INDICES) {
            *slot = base + offset;
        }
    }
}

#[derive(Debug)]
pub struct GeometryBuffers {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    /// Vertices written since the last reset.
    written: usize,
    /// Capacity changed since the GPU buffers were last created.
    dirty: bool,
}

impl GeometryBuffers {
    pub fn new(quad_capacity: usize) -> Self {
        let mut indices = vec![0; quad_capacity * INDICES_PER_QUAD];
        write_indices(&mut indices, 0, quad_capacity);

        Self {
            vertices: vec![Vertex::default(); quad_capacity * VERTICES_PER_QUAD],
            indices,
            written: 0,
            dirty: true,
        }
    }

    /// Reserves the next quad, doubling capacity when full.
    pub fn push_quad(&mut self) -> &mut [Vertex] {
        if self.written + VERTICES_PER_QUAD > self.vertices.len() {
            self.double();
        }

        let start = self.written;
        self.written += VERTICES_PER_QUAD;
        &mut self.vertices[start..start + VERTICES_PER_QUAD]
    }

    fn double(&mut self) {
        let old_quads = self.quad_capacity();
        let new_quads = (old_quads * 2).max(1);

        self.vertices.resize(new_quads * VERTICES_PER_QUAD, Vertex::default());
        self.indices.resize(new_quads * INDICES_PER_QUAD, 0);
        write_indices(&mut self.indices, old_quads, new_quads - old_quads);
        self.dirty = true;

        debug!("Geometry buffers grown from {} to {} quads", old_quads, new_quads);
    }

    pub fn quad_count(&self) -> usize {
        self.written / VERTICES_PER_QUAD
    }

    pub fn quad_capacity(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Vertices written this frame.
    pub fn written(&self) -> &[Vertex] {
        &self.vertices[..self.written]
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn reset(&mut self) {
        self.written = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_pattern() {
        let buffers = GeometryBuffers::new(2);
        assert_eq!(buffers.indices(), &[0, 1, 2, 1, 3, 2, 4, 5, 6, 5, 7, 6]);
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);

        let vertex = Vertex {
            position: [0.0; 2],
            color: [1, 2, 3, 4],
            tex_coords: [1.0, 0.0],
        };
        let bytes = bytemuck::bytes_of(&vertex);
        assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
        assert_eq!(&bytes[12..16], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_push_doubles_and_extends_indices() {
        let mut buffers = GeometryBuffers::new(1);
        buffers.mark_clean();

        buffers.push_quad();
        assert!(!buffers.is_dirty());

        buffers.push_quad();
        assert!(buffers.is_dirty());
        assert_eq!(buffers.quad_capacity(), 2);
        assert_eq!(&buffers.indices()[6..], &[4, 5, 6, 5, 7, 6]);

        buffers.push_quad();
        assert_eq!(buffers.quad_capacity(), 4);
        assert_eq!(buffers.quad_count(), 3);
        assert_eq!(buffers.indices().len(), 24);
        assert_eq!(buffers.indices()[23], 4 * 3 + 2);
    }

    #[test]
    fn test_reset_keeps_capacity() {
        let mut buffers = GeometryBuffers::new(2);
        for _ in 0..5 {
            buffers.push_quad();
        }
        buffers.reset();

        assert_eq!(buffers.quad_count(), 0);
        assert!(buffers.written().is_empty());
        assert_eq!(buffers.vertex_capacity(), 4 * 8);
    }
}
