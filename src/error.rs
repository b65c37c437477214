use thiserror::Error;

use crate::gi::axis::Axis;

/// Everything that can go wrong between loading a config and shading a pixel.
#[derive(Debug, Error)]
pub enum GiError {
    #[error("voxel resolution {0} must be a non-zero power of two")]
    InvalidResolution(u32),

    #[error("scene scale {0} must be finite and positive")]
    InvalidSceneScale(f32),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    // the volume and the captures disagree on size; the resolution changed mid-session
    #[error("capture for axis {axis:?} holds {actual} texels, expected {expected}")]
    CaptureSizeMismatch {
        axis: Axis,
        expected: usize,
        actual: usize,
    },

    // only this slice is lost, voxelization carries on
    #[error("render target for slice {slice} of axis {axis:?} is incomplete: {reason}")]
    RenderTargetIncomplete {
        axis: Axis,
        slice: u32,
        reason: String,
    },

    #[error("gpu error: {0}")]
    Gpu(String),

    // a preview worker thread went away without delivering its rows
    #[error("worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl GiError {
    /// Whether the voxelizer may skip the offending slice and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GiError::RenderTargetIncomplete { .. })
    }
}

/// Wraps any vulkano failure with a short description of what was being attempted.
pub fn gpu_err<E: std::fmt::Debug>(context: &'static str) -> impl FnOnce(E) -> GiError {
    move |e| GiError::Gpu(format!("{context}: {e:?}"))
}
