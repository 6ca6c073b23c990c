//! Render error types.

use ash::vk;
use quadra_gpu::GpuError;
use thiserror::Error;

/// Errors raised while setting up or driving the frame loop.
///
/// Everything except a stale swapchain (handled internally by rebuilding)
/// ends up here and is fatal to the loop.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// The in-flight fence for a frame slot did not signal in time.
    #[error("Timed out waiting for the fence of frame slot {slot}")]
    FenceTimeout { slot: usize },

    #[error("At least 2 frames in flight are required, got {0}")]
    InvalidFramesInFlight(usize),

    #[error("Surface reports no formats")]
    NoSurfaceFormats,

    /// A rebuilt swapchain came back in a format the render pass was not made for.
    #[error("Surface format changed from {old:?} to {new:?}")]
    SurfaceFormatChanged { old: vk::Format, new: vk::Format },

    /// The swapchain handed back an image index it never reported.
    #[error("Acquired image {index} but the swapchain has {count} images")]
    ImageOutOfRange { index: u32, count: usize },
}

pub type Result<T> = std::result::Result<T, RenderError>;
