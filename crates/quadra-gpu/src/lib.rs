//! Vulkan abstraction layer for the Quadra renderer.
//!
//! This crate provides:
//! - Vulkan instance, validation and device management
//! - Window surface and swapchain negotiation
//! - Memory allocation via gpu-allocator
//! - Command buffers, render passes and graphics pipelines
//! - Frame synchronization primitives

pub mod capabilities;
pub mod command;
pub mod context;
pub mod debug;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use command::CommandPool;
pub use context::{GpuContext, GpuContextBuilder, QueueFamilyIndices};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{AcquireOutcome, ImageSharing, PresentOutcome, SwapchainRequest};
pub use sync::FrameSync;

// Re-export for downstream crates
pub use ash::vk;
pub use gpu_allocator::MemoryLocation;
