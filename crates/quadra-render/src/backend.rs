//! The GPU operations the frame loop is built from.
//!
//! [`FrameScheduler`](crate::FrameScheduler) and
//! [`PresentationSurface`](crate::PresentationSurface) only talk to the GPU
//! through this trait. The production implementation is
//! [`VulkanBackend`](crate::VulkanBackend).

use ash::vk;
use quadra_gpu::{
    AcquireOutcome, PresentOutcome, QueueFamilyIndices, Result, SurfaceCapabilities,
    SwapchainRequest,
};

use crate::frame_slots::FrameSlot;

/// Where a frame's draw lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawTarget {
    /// Framebuffer of the acquired swapchain image.
    pub framebuffer: vk::Framebuffer,
    /// Render area, viewport and scissor size.
    pub extent: vk::Extent2D,
}

/// Device-side operations needed to present frames.
///
/// Handles passed in were produced by the same backend. Implementations own
/// the static render pass, pipeline and geometry.
pub trait FrameBackend {
    /// Current surface capabilities, formats and present modes.
    fn surface_support(&mut self) -> Result<SurfaceCapabilities>;

    /// Graphics and present queue families.
    fn queue_families(&self) -> QueueFamilyIndices;

    /// The render pass every framebuffer is built against.
    fn render_pass(&self) -> vk::RenderPass;

    fn create_swapchain(&mut self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR>;

    /// Images owned by `swapchain`, in index order.
    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>>;

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView>;

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer);

    fn destroy_image_view(&mut self, view: vk::ImageView);

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR);

    /// Block until every queue is idle.
    fn wait_idle(&mut self) -> Result<()>;

    /// Allocate a command buffer and its synchronization objects.
    fn create_frame_slot(&mut self) -> Result<FrameSlot>;

    fn destroy_frame_slot(&mut self, slot: &FrameSlot);

    /// Wait for `fence`; `Ok(false)` means the timeout elapsed.
    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> Result<bool>;

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()>;

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_available: vk::Semaphore,
    ) -> Result<AcquireOutcome>;

    fn reset_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> Result<()>;

    /// Record the clear and the single indexed draw of the static mesh.
    fn record_draw(&mut self, command_buffer: vk::CommandBuffer, target: &DrawTarget) -> Result<()>;

    /// Submit the slot's command buffer on the graphics queue.
    ///
    /// Waits on `image_available` at color-attachment output, signals
    /// `render_finished` and the slot's fence.
    fn submit(&mut self, slot: &FrameSlot) -> Result<()>;

    /// Queue `image_index` for presentation once `render_finished` signals.
    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        render_finished: vk::Semaphore,
    ) -> Result<PresentOutcome>;
}

impl<T: FrameBackend + ?Sized> FrameBackend for &mut T {
    fn surface_support(&mut self) -> Result<SurfaceCapabilities> {
        (**self).surface_support()
    }

    fn queue_families(&self) -> QueueFamilyIndices {
        (**self).queue_families()
    }

    fn render_pass(&self) -> vk::RenderPass {
        (**self).render_pass()
    }

    fn create_swapchain(&mut self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR> {
        (**self).create_swapchain(request)
    }

    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        (**self).swapchain_images(swapchain)
    }

    fn create_image_view(&mut self, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
        (**self).create_image_view(image, format)
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        (**self).create_framebuffer(render_pass, view, extent)
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        (**self).destroy_framebuffer(framebuffer);
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        (**self).destroy_image_view(view);
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        (**self).destroy_swapchain(swapchain);
    }

    fn wait_idle(&mut self) -> Result<()> {
        (**self).wait_idle()
    }

    fn create_frame_slot(&mut self) -> Result<FrameSlot> {
        (**self).create_frame_slot()
    }

    fn destroy_frame_slot(&mut self, slot: &FrameSlot) {
        (**self).destroy_frame_slot(slot);
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> Result<bool> {
        (**self).wait_for_fence(fence, timeout_ns)
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        (**self).reset_fence(fence)
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_available: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        (**self).acquire_next_image(swapchain, image_available)
    }

    fn reset_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> Result<()> {
        (**self).reset_command_buffer(command_buffer)
    }

    fn record_draw(&mut self, command_buffer: vk::CommandBuffer, target: &DrawTarget) -> Result<()> {
        (**self).record_draw(command_buffer, target)
    }

    fn submit(&mut self, slot: &FrameSlot) -> Result<()> {
        (**self).submit(slot)
    }

    fn present(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        render_finished: vk::Semaphore,
    ) -> Result<PresentOutcome> {
        (**self).present(swapchain, image_index, render_finished)
    }
}
