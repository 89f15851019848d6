//! Error types for atlas packing and batching.

use crate::atlas::{BatcherId, ImageKey};

/// Failures reported by the skyline allocator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("cannot pack a {width}x{height} rectangle: both dimensions must be positive")]
    InvalidSize { width: u32, height: u32 },

    #[error("atlas growth from {old_width}x{old_height} to {new_width}x{new_height} does not enlarge the region")]
    GrowthRejected {
        old_width: u32,
        old_height: u32,
        new_width: u32,
        new_height: u32,
    },

    #[error("skyline has no segment able to hold a {width} wide rectangle after growth")]
    CorruptSkyline { width: u32 },
}

/// Failures reported by [`AtlasBatcher`](crate::AtlasBatcher).
#[derive(thiserror::Error, Debug)]
pub enum BatcherError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("texture handle invalid: owned by batcher {found}, used with batcher {expected}")]
    InvalidHandle { expected: BatcherId, found: BatcherId },

    #[error("texture handle {0} has no placement on this batcher")]
    UnknownHandle(ImageKey),

    #[error("packing error: {0}")]
    Pack(#[from] PackError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatcherError {
    pub fn config<T: ToString>(msg: T) -> Self {
        BatcherError::InvalidConfig(msg.to_string())
    }
}

pub type Result<T, E = BatcherError> = std::result::Result<T, E>;
