//! Core types and constants for the Quadra renderer.
//!
//! This crate provides the data the rest of the renderer treats as fixed:
//! - The vertex layout and the hardcoded quad mesh
//! - Frame pacing and presentation constants

pub mod mesh;

pub use mesh::{Vertex, QUAD_INDICES, QUAD_VERTICES};

/// Renderer-wide constants
pub mod constants {
    /// Number of frames whose GPU work may be outstanding at once
    pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
    /// Clear color for the single render pass (opaque black)
    pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
    /// Default window width in pixels
    pub const DEFAULT_WIDTH: u32 = 800;
    /// Default window height in pixels
    pub const DEFAULT_HEIGHT: u32 = 600;
    /// Default window title
    pub const DEFAULT_TITLE: &str = "Vulkan Renderer";
    /// Well-known location of the compiled vertex shader
    pub const VERTEX_SHADER_PATH: &str = "shaders/output/vert.spv";
    /// Well-known location of the compiled fragment shader
    pub const FRAGMENT_SHADER_PATH: &str = "shaders/output/frag.spv";
}
