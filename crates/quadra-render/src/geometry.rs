//! Static quad geometry in device-local memory.
//!
//! Uploaded once through a host-visible staging buffer and read-only for the
//! rest of the renderer's life.

use ash::vk;
use gpu_allocator::MemoryLocation;
use quadra_core::{Vertex, QUAD_INDICES, QUAD_VERTICES};
use quadra_gpu::command::execute_single_time_commands;
use quadra_gpu::error::Result;
use quadra_gpu::memory::GpuBuffer;
use quadra_gpu::{CommandPool, GpuContext};

/// Vertex buffer binding for [`Vertex`].
pub fn vertex_bindings() -> Vec<vk::VertexInputBindingDescription> {
    vec![vk::VertexInputBindingDescription {
        binding: 0,
        stride: Vertex::STRIDE,
        input_rate: vk::VertexInputRate::VERTEX,
    }]
}

/// Position at location 0, color at location 1.
pub fn vertex_attributes() -> Vec<vk::VertexInputAttributeDescription> {
    vec![
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: Vertex::POS_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::COLOR_OFFSET,
        },
    ]
}

/// Vertex and index buffers for the quad.
pub struct QuadGeometry {
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,
    pub index_count: u32,
}

impl QuadGeometry {
    /// Upload the quad using one-shot transfers on the graphics queue.
    pub fn upload(context: &GpuContext, pool: &CommandPool) -> Result<Self> {
        let mut vertex_buffer = upload_buffer(
            context,
            pool,
            bytemuck::cast_slice(&QUAD_VERTICES),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "quad_vertices",
        )?;

        let index_buffer = match upload_buffer(
            context,
            pool,
            bytemuck::cast_slice(&QUAD_INDICES),
            vk::BufferUsageFlags::INDEX_BUFFER,
            "quad_indices",
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                let _ = context.allocator().lock().free_buffer(&mut vertex_buffer);
                return Err(e);
            }
        };

        tracing::debug!(
            "Uploaded quad: {} vertices, {} indices",
            QUAD_VERTICES.len(),
            QUAD_INDICES.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: QUAD_INDICES.len() as u32,
        })
    }

    /// Free both buffers. The device must not be using them.
    pub fn destroy(&mut self, context: &GpuContext) -> Result<()> {
        let mut allocator = context.allocator().lock();
        allocator.free_buffer(&mut self.vertex_buffer)?;
        allocator.free_buffer(&mut self.index_buffer)?;
        Ok(())
    }
}

/// Copy `bytes` into a new device-local buffer with `usage`.
fn upload_buffer(
    context: &GpuContext,
    pool: &CommandPool,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
    name: &str,
) -> Result<GpuBuffer> {
    let size = bytes.len() as u64;
    let mut allocator = context.allocator().lock();

    // Staging buffer (CPU-visible)
    let mut staging_buffer = allocator.create_buffer(
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::CpuToGpu,
        &format!("{name}_staging"),
    )?;

    let result = staging_buffer.write(bytes).and_then(|()| {
        allocator.create_buffer(
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            name,
        )
    });

    let mut device_buffer = match result {
        Ok(buffer) => buffer,
        Err(e) => {
            allocator.free_buffer(&mut staging_buffer)?;
            return Err(e);
        }
    };

    let device = context.device();
    let copied = unsafe {
        execute_single_time_commands(device, pool, context.graphics_queue(), |cmd| {
            let copy_region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            device.cmd_copy_buffer(cmd, staging_buffer.buffer, device_buffer.buffer, &[copy_region]);
        })
    };

    allocator.free_buffer(&mut staging_buffer)?;
    if let Err(e) = copied {
        allocator.free_buffer(&mut device_buffer)?;
        return Err(e);
    }

    Ok(device_buffer)
}
