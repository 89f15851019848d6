// Atlas Batcher Module
// Packs registered images into one growable atlas surface and collects quads that
// sample it, so a whole frame is drawn with a single indexed draw call.

pub mod geometry;
pub mod quad;

use glam::{Mat4, Vec2};
use iced_core::{Rectangle, Size};

use crate::atlas::{
    BatcherId, Handle, HandleTable, PendingUpload, PlacementRecord, SkylineAllocator, UploadQueue,
};
use crate::backend::{
    BlendMode, CullMode, DepthMode, DrawCall, GraphicsBackend, RenderState, SamplerMode,
};
use crate::config::BatcherConfig;
use crate::error::{BatcherError, Result};
use crate::source::SourceImage;

pub use geometry::{write_indices, GeometryBuffers, Vertex, INDICES_PER_QUAD, QUAD_INDICES, VERTICES_PER_QUAD};
pub use quad::{QuadView, SpriteEffects};

#[allow(unused_imports)]
use log::{debug, info, warn};

/// Per-submit overrides. Anything left `None` uses the batcher defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubmitOptions {
    pub view: Option<Mat4>,
    pub projection: Option<Mat4>,
    pub blend: Option<BlendMode>,
    pub sampler: Option<SamplerMode>,
    pub depth: Option<DepthMode>,
    pub cull: Option<CullMode>,
}

impl SubmitOptions {
    pub fn view(mut self, view: Mat4) -> Self {
        self.view = Some(view);
        self
    }

    pub fn projection(mut self, projection: Mat4) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn blend(mut self, blend: BlendMode) -> Self {
        self.blend = Some(blend);
        self
    }

    pub fn sampler(mut self, sampler: SamplerMode) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn depth(mut self, depth: DepthMode) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn cull(mut self, cull: CullMode) -> Self {
        self.cull = Some(cull);
        self
    }

    fn render_state(&self, defaults: RenderState) -> RenderState {
        RenderState {
            blend: self.blend.unwrap_or(defaults.blend),
            sampler: self.sampler.unwrap_or(defaults.sampler),
            depth: self.depth.unwrap_or(defaults.depth),
            cull: self.cull.unwrap_or(defaults.cull),
        }
    }
}

/// What one `submit` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub quads: usize,
    pub uploads: usize,
    pub draw_calls: usize,
}

struct GpuBuffers<B: GraphicsBackend> {
    vertices: B::VertexBuffer,
    indices: B::IndexBuffer,
}

pub struct AtlasBatcher<B: GraphicsBackend> {
    id: BatcherId,
    backend: B,
    atlas: B::Surface,
    atlas_size: Size<u32>,
    packer: SkylineAllocator,
    handles: HandleTable,
    uploads: UploadQueue<B::Surface>,
    geometry: GeometryBuffers,
    /// Backend copies of `geometry`, recreated whenever its capacity changes.
    gpu_buffers: Option<GpuBuffers<B>>,
    render_state: RenderState,
}

impl<B: GraphicsBackend> AtlasBatcher<B> {
    pub fn new(backend: B) -> Result<Self> {
        Self::with_config(backend, BatcherConfig::default())
    }

    pub fn with_config(mut backend: B, config: BatcherConfig) -> Result<Self> {
        config.validate()?;

        let atlas_size = Size::new(config.initial_atlas_size, config.initial_atlas_size);
        let atlas = backend.create_surface(atlas_size);
        let id = BatcherId::next();

        info!(
            "Batcher {} created: {}x{} atlas, {} quads",
            id, atlas_size.width, atlas_size.height, config.initial_sprite_capacity
        );

        Ok(Self {
            id,
            backend,
            atlas,
            atlas_size,
            packer: SkylineAllocator::new(atlas_size.width, atlas_size.height),
            handles: HandleTable::new(),
            uploads: UploadQueue::new(),
            geometry: GeometryBuffers::new(config.initial_sprite_capacity),
            gpu_buffers: None,
            render_state: config.render_state,
        })
    }

    /// Registers `image` with this batcher, packing it into the atlas on first use.
    ///
    /// The pixels are copied into the atlas on the next [`submit`](Self::submit).
    pub fn create_handle(&mut self, image: &SourceImage) -> Result<Handle> {
        let key = image.key();
        if self.handles.contains(key) {
            return Ok(Handle::new(key, self.id));
        }

        let size = image.size();
        let Self {
            backend,
            atlas,
            atlas_size,
            packer,
            handles,
            uploads,
            ..
        } = self;

        let position = packer.pack(size.width, size.height, |current| {
            grow_atlas(backend, atlas, atlas_size, handles, uploads, current)
        })?;

        let bounds = Rectangle {
            x: position.x,
            y: position.y,
            width: size.width,
            height: size.height,
        };
        self.handles.insert(key, PlacementRecord::new(bounds, self.atlas_size));
        self.uploads.push_image(image.shared_pixels(), bounds);

        debug!(
            "Packed image {} ({}x{}) at ({}, {}) on batcher {}",
            key, size.width, size.height, position.x, position.y, self.id
        );

        Ok(Handle::new(key, self.id))
    }

    /// Adds a quad showing the image behind `handle` with its top-left corner at
    /// `position`. `origin` is the pivot used by the returned view's rotate and scale.
    pub fn draw(&mut self, handle: Handle, position: Vec2, origin: Vec2) -> Result<QuadView<'_>> {
        if handle.owner() != self.id {
            return Err(BatcherError::InvalidHandle {
                expected: self.id,
                found: handle.owner(),
            });
        }

        let placement = *self
            .handles
            .get(handle.key())
            .ok_or(BatcherError::UnknownHandle(handle.key()))?;

        let vertices = self.geometry.push_quad();
        Ok(QuadView::new(vertices, position, origin, placement, self.atlas_size))
    }

    pub fn draw_at(&mut self, handle: Handle, position: Vec2) -> Result<QuadView<'_>> {
        self.draw(handle, position, Vec2::ZERO)
    }

    /// Registers `image` if needed and draws it at `position`.
    pub fn draw_image(&mut self, image: &SourceImage, position: Vec2) -> Result<QuadView<'_>> {
        let handle = self.create_handle(image)?;
        self.draw(handle, position, Vec2::ZERO)
    }

    /// Flushes pending atlas uploads and draws every quad added since the last submit.
    pub fn submit(&mut self, options: SubmitOptions) -> SubmitReport {
        let uploads = self.flush_uploads();
        let quads = self.geometry.quad_count();

        if quads == 0 {
            debug!("Batcher {} submit: nothing drawn, {} uploads flushed", self.id, uploads);
            return SubmitReport { quads, uploads, draw_calls: 0 };
        }

        let buffers = match self.gpu_buffers.take() {
            Some(buffers) if !self.geometry.is_dirty() => buffers,
            _ => {
                debug!(
                    "Batcher {} recreating GPU buffers for {} quads",
                    self.id,
                    self.geometry.quad_capacity()
                );
                let vertices = self.backend.create_vertex_buffer(self.geometry.vertex_capacity());
                let indices = self.backend.create_index_buffer(self.geometry.indices());
                self.geometry.mark_clean();
                GpuBuffers { vertices, indices }
            }
        };

        self.backend.write_vertices(&buffers.vertices, self.geometry.written());

        let projection = options
            .projection
            .unwrap_or_else(|| self.backend.viewport().orthographic());
        let transform = projection * options.view.unwrap_or(Mat4::IDENTITY);

        self.backend.draw_indexed(DrawCall {
            vertices: &buffers.vertices,
            indices: &buffers.indices,
            atlas: &self.atlas,
            transform,
            state: options.render_state(self.render_state),
            index_count: (quads * INDICES_PER_QUAD) as u32,
        });

        self.gpu_buffers = Some(buffers);
        self.geometry.reset();

        debug!("Batcher {} submit: {} quads, {} uploads", self.id, quads, uploads);
        SubmitReport { quads, uploads, draw_calls: 1 }
    }

    fn flush_uploads(&mut self) -> usize {
        let count = self.uploads.len();

        for upload in self.uploads.drain() {
            match upload {
                PendingUpload::AtlasCopy { source, region } => {
                    self.backend.copy_surface(&source, &self.atlas, region);
                    self.backend.destroy_surface(source);
                }
                PendingUpload::Image { pixels, region } => {
                    self.backend.write_pixels(&self.atlas, region, pixels.as_raw());
                }
            }
        }

        count
    }

    pub fn id(&self) -> BatcherId {
        self.id
    }

    pub fn atlas_size(&self) -> Size<u32> {
        self.atlas_size
    }

    pub fn atlas_surface(&self) -> &B::Surface {
        &self.atlas
    }

    /// Placement of a handle issued by this batcher.
    pub fn placement(&self, handle: &Handle) -> Option<&PlacementRecord> {
        if handle.owner() != self.id {
            return None;
        }
        self.handles.get(handle.key())
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn quad_count(&self) -> usize {
        self.geometry.quad_count()
    }

    pub fn quad_capacity(&self) -> usize {
        self.geometry.quad_capacity()
    }

    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Releases the atlas surfaces and hands the backend back.
    pub fn into_backend(mut self) -> B {
        for upload in self.uploads.drain() {
            if let PendingUpload::AtlasCopy { source, .. } = upload {
                self.backend.destroy_surface(source);
            }
        }
        self.backend.destroy_surface(self.atlas);
        self.backend
    }
}

/// Growth callback handed to the skyline allocator: doubles the atlas, queues the copy
/// of the old contents and rewrites every placement's UVs for the new size.
fn grow_atlas<B: GraphicsBackend>(
    backend: &mut B,
    atlas: &mut B::Surface,
    atlas_size: &mut Size<u32>,
    handles: &mut HandleTable,
    uploads: &mut UploadQueue<B::Surface>,
    current: Size<u32>,
) -> Size<u32> {
    let grown = Size::new(current.width.saturating_mul(2), current.height.saturating_mul(2));
    if grown == current {
        return current;
    }

    let previous = std::mem::replace(atlas, backend.create_surface(grown));
    let region = Rectangle {
        x: 0,
        y: 0,
        width: atlas_size.width,
        height: atlas_size.height,
    };

    if let Some(blank) = uploads.push_atlas_copy(previous, region) {
        // Replaced before any flush, so it never held pixels
        backend.destroy_surface(blank);
    }

    *atlas_size = grown;
    handles.rescale_all(grown);

    debug!(
        "Atlas grown from {}x{} to {}x{}",
        current.width, current.height, grown.width, grown.height
    );

    grown
}
