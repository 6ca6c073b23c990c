//! Frame scheduling and presentation for the Quadra renderer.
//!
//! This crate provides:
//! - The frame loop: fence wait, acquire, record, submit, present
//! - Swapchain lifecycle, including rebuilds on resize and staleness
//! - Per-frame command and synchronization slots
//! - The Vulkan backend that owns the static pipeline and quad geometry

pub mod backend;
pub mod error;
pub mod frame_slots;
pub mod geometry;
pub mod presentation;
pub mod scheduler;
pub mod vulkan;

#[cfg(test)]
mod mock;

pub use backend::{DrawTarget, FrameBackend};
pub use error::{RenderError, Result};
pub use frame_slots::{FrameSlot, FrameSlots};
pub use geometry::QuadGeometry;
pub use presentation::{PresentableImage, PresentationSurface};
pub use scheduler::{FrameOutcome, FrameScheduler, FrameStats};
pub use vulkan::VulkanBackend;
