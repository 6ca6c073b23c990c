//! Vulkan implementation of [`FrameBackend`].

use ash::vk;
use quadra_core::constants::CLEAR_COLOR;
use quadra_gpu::command::{
    begin_command_buffer, end_command_buffer, reset_command_buffer, submit_command_buffers,
};
use quadra_gpu::render_pass::create_color_render_pass;
use quadra_gpu::swapchain;
use quadra_gpu::sync::{reset_fence, wait_for_fence};
use quadra_gpu::{
    AcquireOutcome, CommandPool, FrameSync, GpuContext, GraphicsPipeline, GraphicsPipelineConfig,
    PresentOutcome, QueueFamilyIndices, SurfaceCapabilities, SwapchainRequest,
};
use quadra_shaders::ShaderPair;
use tracing::{debug, info, warn};

use crate::backend::{DrawTarget, FrameBackend};
use crate::error::{RenderError, Result};
use crate::frame_slots::FrameSlot;
use crate::geometry::{vertex_attributes, vertex_bindings, QuadGeometry};

/// The real GPU: owns the device context and every static object drawn with.
///
/// Dropping releases geometry, pipeline, render pass and command pool, then
/// the context itself (allocator, device, surface, instance).
pub struct VulkanBackend {
    geometry: QuadGeometry,
    pipeline: GraphicsPipeline,
    render_pass: vk::RenderPass,
    command_pool: CommandPool,
    context: GpuContext,
}

impl VulkanBackend {
    /// Build the render pass, pipeline, command pool and quad buffers.
    pub fn new(context: GpuContext, shaders: &ShaderPair) -> Result<Self> {
        let support = unsafe {
            context
                .surface()
                .capabilities(context.physical_device())?
        };
        let surface_format = support
            .recommended_format()
            .ok_or(RenderError::NoSurfaceFormats)?;

        let device = context.device();

        let render_pass = unsafe { create_color_render_pass(device, surface_format.format)? };

        let config = GraphicsPipelineConfig {
            vertex_shader: shaders.vertex.clone(),
            fragment_shader: shaders.fragment.clone(),
            vertex_bindings: vertex_bindings(),
            vertex_attributes: vertex_attributes(),
            ..Default::default()
        };
        let pipeline = match unsafe { GraphicsPipeline::new(device, render_pass, &config) } {
            Ok(pipeline) => pipeline,
            Err(e) => {
                unsafe { device.destroy_render_pass(render_pass, None) };
                return Err(e.into());
            }
        };

        let command_pool = match unsafe {
            CommandPool::new(
                device,
                context.queue_families().graphics,
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )
        } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe {
                    pipeline.destroy(device);
                    device.destroy_render_pass(render_pass, None);
                }
                return Err(e.into());
            }
        };

        let geometry = match QuadGeometry::upload(&context, &command_pool) {
            Ok(geometry) => geometry,
            Err(e) => {
                unsafe {
                    command_pool.destroy(device);
                    pipeline.destroy(device);
                    device.destroy_render_pass(render_pass, None);
                }
                return Err(e.into());
            }
        };

        info!(
            "Pipeline ready for {:?} (validation: {})",
            surface_format.format,
            context.validation_enabled()
        );

        Ok(Self {
            geometry,
            pipeline,
            render_pass,
            command_pool,
            context,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    fn device(&self) -> &ash::Device {
        self.context.device()
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            warn!("Failed to wait for device idle: {e}");
        }
        if let Err(e) = self.geometry.destroy(&self.context) {
            warn!("Failed to free quad buffers: {e}");
        }
        let device = self.context.device();
        unsafe {
            self.pipeline.destroy(device);
            device.destroy_render_pass(self.render_pass, None);
            self.command_pool.destroy(device);
        }
        debug!("Vulkan backend destroyed");
    }
}

impl FrameBackend for VulkanBackend {
    fn surface_support(&mut self) -> quadra_gpu::Result<SurfaceCapabilities> {
        unsafe {
            self.context
                .surface()
                .capabilities(self.context.physical_device())
        }
    }

    fn queue_families(&self) -> QueueFamilyIndices {
        self.context.queue_families()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn create_swapchain(&mut self, request: &SwapchainRequest) -> quadra_gpu::Result<vk::SwapchainKHR> {
        unsafe {
            swapchain::create_swapchain(
                self.context.swapchain_loader(),
                self.context.surface().surface,
                request,
            )
        }
    }

    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> quadra_gpu::Result<Vec<vk::Image>> {
        let images = unsafe {
            self.context
                .swapchain_loader()
                .get_swapchain_images(swapchain)?
        };
        Ok(images)
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> quadra_gpu::Result<vk::ImageView> {
        unsafe { swapchain::create_image_view(self.device(), image, format) }
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> quadra_gpu::Result<vk::Framebuffer> {
        unsafe { swapchain::create_framebuffer(self.device(), render_pass, view, extent) }
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        unsafe { self.device().destroy_framebuffer(framebuffer, None) };
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        unsafe { self.device().destroy_image_view(view, None) };
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        unsafe {
            self.context
                .swapchain_loader()
                .destroy_swapchain(swapchain, None);
        }
    }

    fn wait_idle(&mut self) -> quadra_gpu::Result<()> {
        self.context.wait_idle()
    }

    fn create_frame_slot(&mut self) -> quadra_gpu::Result<FrameSlot> {
        let device = self.context.device();
        let command_buffer = unsafe { self.command_pool.allocate_command_buffer(device)? };
        let sync = match unsafe { FrameSync::new(device) } {
            Ok(sync) => sync,
            Err(e) => {
                unsafe { self.command_pool.free_command_buffer(device, command_buffer) };
                return Err(e);
            }
        };
        Ok(FrameSlot {
            sync,
            command_buffer,
        })
    }

    fn destroy_frame_slot(&mut self, slot: &FrameSlot) {
        let device = self.context.device();
        unsafe {
            slot.sync.destroy(device);
            self.command_pool
                .free_command_buffer(device, slot.command_buffer);
        }
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> quadra_gpu::Result<bool> {
        unsafe { wait_for_fence(self.device(), fence, timeout_ns) }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> quadra_gpu::Result<()> {
        unsafe { reset_fence(self.device(), fence) }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_available: vk::Semaphore,
    ) -> quadra_gpu::Result<AcquireOutcome> {
        unsafe {
            swapchain::acquire_next_image(
                self.context.swapchain_loader(),
                swapchain,
                image_available,
                u64::MAX,
            )
        }
    }

    fn reset_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> quadra_gpu::Result<()> {
        unsafe { reset_command_buffer(self.device(), command_buffer) }
    }

    fn record_draw(&mut self, cmd: vk::CommandBuffer, target: &DrawTarget) -> quadra_gpu::Result<()> {
        let device = self.context.device();

        unsafe {
            begin_command_buffer(device, cmd, vk::CommandBufferUsageFlags::empty())?;

            let clear_values = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: CLEAR_COLOR,
                },
            }];
            let render_area = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: target.extent,
            };
            let render_pass_info = vk::RenderPassBeginInfo::default()
                .render_pass(self.render_pass)
                .framebuffer(target.framebuffer)
                .render_area(render_area)
                .clear_values(&clear_values);

            device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);

            device.cmd_bind_vertex_buffers(cmd, 0, &[self.geometry.vertex_buffer.buffer], &[0]);
            device.cmd_bind_index_buffer(
                cmd,
                self.geometry.index_buffer.buffer,
                0,
                vk::IndexType::UINT32,
            );

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: target.extent.width as f32,
                height: target.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[render_area]);

            device.cmd_draw_indexed(cmd, self.geometry.index_count, 1, 0, 0, 0);
            device.cmd_end_render_pass(cmd);

            end_command_buffer(device, cmd)
        }
    }

    fn submit(&mut self, slot: &FrameSlot) -> quadra_gpu::Result<()> {
        unsafe {
            submit_command_buffers(
                self.device(),
                self.context.graphics_queue(),
                &[slot.command_buffer],
                &[slot.sync.image_available],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                &[slot.sync.render_finished],
                slot.sync.in_flight,
            )
        }
    }

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        render_finished: vk::Semaphore,
    ) -> quadra_gpu::Result<PresentOutcome> {
        unsafe {
            swapchain::present(
                self.context.swapchain_loader(),
                self.context.present_queue(),
                swapchain,
                image_index,
                &[render_finished],
            )
        }
    }
}
