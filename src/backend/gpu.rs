// wgpu backend
// Atlas surfaces are 2D textures, batched geometry lives in GPU vertex/index buffers
// and every submit becomes one render pass with one draw_indexed call.

use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use iced_core::{Rectangle, Size};
use iced_wgpu::wgpu::{self, util::DeviceExt};

use crate::backend::{
    BlendMode, CullMode, DepthMode, DrawCall, GraphicsBackend, SamplerMode, Viewport,
};
use crate::batcher::Vertex;

#[allow(unused_imports)]
use log::{debug, info, warn};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// Match iced_wgpu: atlas content is stored as sRGB
const ATLAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

// position, color (RGBA8), tex_coords
const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: 8,
        shader_location: 1,
        format: wgpu::VertexFormat::Unorm8x4,
    },
    wgpu::VertexAttribute {
        offset: 12,
        shader_location: 2,
        format: wgpu::VertexFormat::Float32x2,
    },
];

/// `Transform` parameter of the sprite_batcher shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct TransformUniform {
    transform: [[f32; 4]; 4],
}

#[derive(Debug)]
pub struct AtlasTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: Size<u32>,
}

impl AtlasTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> Size<u32> {
        self.size
    }
}

type PipelineKey = (BlendMode, DepthMode, CullMode);

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    target_format: wgpu::TextureFormat,
    target: Option<wgpu::TextureView>,
    depth_target: Option<wgpu::TextureView>,
    viewport: Viewport,
    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    samplers: HashMap<SamplerMode, wgpu::Sampler>,
    transform_buffer: wgpu::Buffer,
}

impl WgpuBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target_format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Self {
        info!("Creating sprite_batcher pipeline layout for {:?}", target_format);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite_batcher shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./sprite_batcher.wgsl").into()),
        });

        // Atlas texture, its sampler and the Transform uniform
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite_batcher bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite_batcher pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let transform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_batcher transform buffer"),
            size: std::mem::size_of::<TransformUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            target_format,
            target: None,
            depth_target: None,
            viewport,
            shader,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            samplers: HashMap::new(),
            transform_buffer,
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Sets the color attachment the next draws render into.
    pub fn set_target(&mut self, target: wgpu::TextureView, viewport: Viewport) {
        self.target = Some(target);
        self.viewport = viewport;
    }

    /// Depth attachment used when a draw asks for depth testing. Must be `DEPTH_FORMAT`.
    pub fn set_depth_target(&mut self, depth_target: Option<wgpu::TextureView>) {
        self.depth_target = depth_target;
    }

    fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        }
    }

    fn create_pipeline(&self, (blend, depth, cull): PipelineKey) -> wgpu::RenderPipeline {
        debug!("Creating sprite_batcher pipeline: {:?} {:?} {:?}", blend, depth, cull);

        let blend = match blend {
            BlendMode::AlphaBlend => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
            BlendMode::NonPremultiplied => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Opaque => wgpu::BlendState::REPLACE,
            BlendMode::Additive => {
                let component = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                wgpu::BlendState { color: component, alpha: component }
            }
        };

        // Front faces are counter-clockwise
        let cull_mode = match cull {
            CullMode::None => None,
            CullMode::Clockwise => Some(wgpu::Face::Back),
            CullMode::CounterClockwise => Some(wgpu::Face::Front),
        };

        let depth_stencil = match depth {
            DepthMode::None => None,
            mode => Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: mode == DepthMode::ReadWrite,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
        };

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite_batcher pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: "vs_main",
                buffers: &[Self::vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.target_format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        })
    }

    fn create_sampler(&self, mode: SamplerMode) -> wgpu::Sampler {
        let filter = if mode.is_linear() {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let address_mode = if mode.wraps() {
            wgpu::AddressMode::Repeat
        } else {
            wgpu::AddressMode::ClampToEdge
        };

        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sprite_batcher sampler"),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    }
}

impl GraphicsBackend for WgpuBackend {
    type Surface = AtlasTexture;
    type VertexBuffer = wgpu::Buffer;
    type IndexBuffer = wgpu::Buffer;

    fn create_surface(&mut self, size: Size<u32>) -> AtlasTexture {
        debug!("Creating atlas texture {}x{}", size.width, size.height);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas_batcher::atlas texture"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: ATLAS_FORMAT,
            usage: wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        AtlasTexture { texture, view, size }
    }

    fn destroy_surface(&mut self, surface: AtlasTexture) {
        surface.texture.destroy();
    }

    fn write_pixels(&mut self, surface: &AtlasTexture, region: Rectangle<u32>, pixels: &[u8]) {
        let row_bytes = 4 * region.width as usize;
        if pixels.len() < row_bytes * region.height as usize {
            warn!(
                "Pixel block of {} bytes does not cover a {}x{} region",
                pixels.len(),
                region.width,
                region.height
            );
            return;
        }

        // It is a webgpu requirement that:
        //   BufferCopyView.layout.bytes_per_row % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT == 0
        // So we pad every row up to the next multiple of the alignment.
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padding = (align - (4 * region.width) % align) % align;
        let padded_width = row_bytes + padding as usize;
        let mut padded_data = vec![0; padded_width * region.height as usize];

        for row in 0..region.height as usize {
            let offset = row * padded_width;
            padded_data[offset..offset + row_bytes]
                .copy_from_slice(&pixels[row * row_bytes..(row + 1) * row_bytes]);
        }

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("atlas image upload buffer"),
            contents: &padded_data,
            usage: wgpu::BufferUsages::COPY_SRC,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("atlas upload encoder"),
        });

        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_width as u32),
                    rows_per_image: Some(region.height),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &surface.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: region.x, y: region.y, z: 0 },
                aspect: wgpu::TextureAspect::default(),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(Some(encoder.finish()));
    }

    fn copy_surface(&mut self, source: &AtlasTexture, destination: &AtlasTexture, region: Rectangle<u32>) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("atlas grow encoder"),
        });

        let origin = wgpu::Origin3d { x: region.x, y: region.y, z: 0 };

        encoder.copy_texture_to_texture(
            wgpu::ImageCopyTexture {
                texture: &source.texture,
                mip_level: 0,
                origin,
                aspect: wgpu::TextureAspect::default(),
            },
            wgpu::ImageCopyTexture {
                texture: &destination.texture,
                mip_level: 0,
                origin,
                aspect: wgpu::TextureAspect::default(),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(Some(encoder.finish()));
    }

    fn create_vertex_buffer(&mut self, capacity: usize) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sprite_batcher vertex buffer"),
            size: (capacity * std::mem::size_of::<Vertex>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn write_vertices(&mut self, buffer: &wgpu::Buffer, vertices: &[Vertex]) {
        self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(vertices));
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprite_batcher index buffer"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        })
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn draw_indexed(&mut self, call: DrawCall<'_, Self>) {
        let Some(target) = self.target.as_ref() else {
            warn!("sprite_batcher draw skipped: no render target set");
            return;
        };

        let depth = if call.state.depth != DepthMode::None && self.depth_target.is_none() {
            warn!("Depth mode {:?} requested without a depth target, drawing without depth", call.state.depth);
            DepthMode::None
        } else {
            call.state.depth
        };

        let key = (call.state.blend, depth, call.state.cull);
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.create_pipeline(key);
            self.pipelines.insert(key, pipeline);
        }
        if !self.samplers.contains_key(&call.state.sampler) {
            let sampler = self.create_sampler(call.state.sampler);
            self.samplers.insert(call.state.sampler, sampler);
        }

        let (Some(pipeline), Some(sampler)) = (self.pipelines.get(&key), self.samplers.get(&call.state.sampler)) else {
            return;
        };

        let uniform = TransformUniform {
            transform: call.transform.to_cols_array_2d(),
        };
        self.queue.write_buffer(&self.transform_buffer, 0, bytemuck::bytes_of(&uniform));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_batcher bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&call.atlas.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.transform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("sprite_batcher encoder"),
        });

        {
            let depth_stencil_attachment = match (depth, self.depth_target.as_ref()) {
                (DepthMode::None, _) | (_, None) => None,
                (_, Some(view)) => Some(wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sprite_batcher render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let viewport = self.viewport;
            render_pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.set_vertex_buffer(0, call.vertices.slice(..));
            render_pass.set_index_buffer(call.indices.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..call.index_count, 0, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));
    }
}
