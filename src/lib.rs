//! Skyline atlas packing and single-draw sprite batching.
//!
//! Images registered with an [`AtlasBatcher`] are packed into one growable atlas
//! surface; every quad drawn during a frame samples that surface, so the frame is
//! submitted as one indexed draw call.

pub mod atlas;
pub mod backend;
pub mod batcher;
pub mod build_info;
pub mod config;
pub mod error;
pub mod file_io;
pub mod logging;
pub mod manifest;
pub mod quad_renderer;
pub mod settings;
pub mod source;

pub use atlas::{BatcherId, Handle, ImageKey, PlacementRecord, SkylineAllocator};
pub use backend::{
    BlendMode, CullMode, DepthMode, GraphicsBackend, HeadlessBackend, RenderState, SamplerMode,
    Viewport, WgpuBackend,
};
pub use batcher::{AtlasBatcher, QuadView, SpriteEffects, SubmitOptions, SubmitReport, Vertex};
pub use config::BatcherConfig;
pub use error::{BatcherError, PackError, Result};
pub use quad_renderer::QuadRenderer;
pub use source::SourceImage;
