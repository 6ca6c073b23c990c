//! Swapchain negotiation and the raw operations on swapchain objects.

use crate::error::{GpuError, Result};
use ash::vk;

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    /// Graphics and present run on the same family.
    Exclusive,
    /// Graphics and present families differ; both are declared.
    Concurrent { graphics: u32, present: u32 },
}

impl ImageSharing {
    /// Pick the sharing mode for the given queue families.
    pub fn for_families(graphics: u32, present: u32) -> Self {
        if graphics == present {
            Self::Exclusive
        } else {
            Self::Concurrent { graphics, present }
        }
    }
}

/// Everything needed to build a swapchain, already negotiated against the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainRequest {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub sharing: ImageSharing,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Result of asking the swapchain for the next image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` mirrors `VK_SUBOPTIMAL_KHR`.
    Acquired { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface. No image was acquired.
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the swapchain must be rebuilt after this presentation.
    pub fn is_stale(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// Select the best surface format.
///
/// Prefers `B8G8R8A8_SRGB` with the sRGB non-linear color space, otherwise
/// the first format offered. Returns `None` only for an empty list.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Select the best present mode.
///
/// Mailbox when offered, otherwise FIFO (always supported).
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
///
/// Uses the surface's current extent when it is defined, otherwise clamps the
/// window's framebuffer size into the supported range.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_width: u32,
    framebuffer_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: framebuffer_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Number of images to request: one above the minimum, capped when the
/// surface reports a maximum (zero means unbounded).
pub fn desired_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

/// Create a swapchain from a negotiated request.
///
/// # Safety
/// All handles must be valid and `surface` must not already own a live swapchain.
pub unsafe fn create_swapchain(
    swapchain_loader: &ash::khr::swapchain::Device,
    surface: vk::SurfaceKHR,
    request: &SwapchainRequest,
) -> Result<vk::SwapchainKHR> {
    let concurrent_families;
    let mut create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(request.image_count)
        .image_format(request.surface_format.format)
        .image_color_space(request.surface_format.color_space)
        .image_extent(request.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .pre_transform(request.pre_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(request.present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    create_info = match request.sharing {
        ImageSharing::Exclusive => create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE),
        ImageSharing::Concurrent { graphics, present } => {
            concurrent_families = [graphics, present];
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&concurrent_families)
        }
    };

    swapchain_loader
        .create_swapchain(&create_info, None)
        .map_err(|e| GpuError::SwapchainCreation(e.to_string()))
}

/// Create a 2D color view over a swapchain image.
///
/// # Safety
/// The device and image must be valid.
pub unsafe fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = device.create_image_view(&view_info, None)?;
    Ok(view)
}

/// Create a single-attachment framebuffer for `render_pass`.
///
/// # Safety
/// The device, render pass and view must be valid.
pub unsafe fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    view: vk::ImageView,
    extent: vk::Extent2D,
) -> Result<vk::Framebuffer> {
    let attachments = [view];
    let framebuffer_info = vk::FramebufferCreateInfo::default()
        .render_pass(render_pass)
        .attachments(&attachments)
        .width(extent.width)
        .height(extent.height)
        .layers(1);

    let framebuffer = device.create_framebuffer(&framebuffer_info, None)?;
    Ok(framebuffer)
}

/// Acquire the next image, signalling `semaphore` when it is ready.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn acquire_next_image(
    swapchain_loader: &ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    semaphore: vk::Semaphore,
    timeout_ns: u64,
) -> Result<AcquireOutcome> {
    match swapchain_loader.acquire_next_image(swapchain, timeout_ns, semaphore, vk::Fence::null()) {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(GpuError::from(e)),
    }
}

/// Present an image once `wait_semaphores` signal.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn present(
    swapchain_loader: &ash::khr::swapchain::Device,
    queue: vk::Queue,
    swapchain: vk::SwapchainKHR,
    image_index: u32,
    wait_semaphores: &[vk::Semaphore],
) -> Result<PresentOutcome> {
    let swapchains = [swapchain];
    let image_indices = [image_index];

    let present_info = vk::PresentInfoKHR::default()
        .wait_semaphores(wait_semaphores)
        .swapchains(&swapchains)
        .image_indices(&image_indices);

    match swapchain_loader.queue_present(queue, &present_info) {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
        Err(e) => Err(GpuError::from(e)),
    }
}
