//! The fixed mesh drawn every frame.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// A single vertex: 2D position and RGB color.
///
/// Layout is `repr(C)` so the GPU vertex input description can use field offsets directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub pos: Vec2,
    pub color: Vec3,
}

impl Vertex {
    /// Byte offset of the position attribute.
    pub const POS_OFFSET: u32 = std::mem::offset_of!(Self, pos) as u32;
    /// Byte offset of the color attribute.
    pub const COLOR_OFFSET: u32 = std::mem::offset_of!(Self, color) as u32;
    /// Distance in bytes between consecutive vertices.
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub const fn new(pos: Vec2, color: Vec3) -> Self {
        Self { pos, color }
    }
}

/// Quad corners in clip space, clockwise on screen.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new(Vec2::new(-0.5, -0.5), Vec3::new(1.0, 0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, -0.5), Vec3::new(0.0, 1.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 0.0, 1.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(1.0, 1.0, 1.0)),
];

/// Two triangles covering the quad.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];
