//! Lifecycle of the swapchain and everything built on its images.

use ash::vk;
use quadra_gpu::swapchain::{calculate_extent, desired_image_count};
use quadra_gpu::{ImageSharing, QueueFamilyIndices, SurfaceCapabilities, SwapchainRequest};
use quadra_platform::WindowSystem;
use tracing::{debug, info, warn};

use crate::backend::FrameBackend;
use crate::error::{RenderError, Result};

/// A swapchain image with the view and framebuffer rendering targets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentableImage {
    /// Swapchain-owned image.
    pub image: vk::Image,
    /// Color view over `image`.
    pub view: vk::ImageView,
    /// Framebuffer binding `view` to the render pass.
    pub framebuffer: vk::Framebuffer,
}

/// Negotiate swapchain parameters against the surface.
///
/// `framebuffer_size` is only consulted when the surface leaves the extent
/// to the application.
pub fn negotiate(
    support: &SurfaceCapabilities,
    framebuffer_size: (u32, u32),
    queue_families: QueueFamilyIndices,
) -> Result<SwapchainRequest> {
    let surface_format = support
        .recommended_format()
        .ok_or(RenderError::NoSurfaceFormats)?;
    let caps = &support.capabilities;

    Ok(SwapchainRequest {
        surface_format,
        present_mode: support.recommended_present_mode(),
        extent: calculate_extent(caps, framebuffer_size.0, framebuffer_size.1),
        image_count: desired_image_count(caps),
        sharing: ImageSharing::for_families(queue_families.graphics, queue_families.present),
        pre_transform: caps.current_transform,
    })
}

/// The swapchain, its images and their framebuffers.
///
/// Owned by the frame scheduler and rebuilt as a whole whenever it goes stale.
#[derive(Debug)]
pub struct PresentationSurface {
    swapchain: vk::SwapchainKHR,
    images: Vec<PresentableImage>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl PresentationSurface {
    /// Negotiate and build the swapchain, one view and one framebuffer per image.
    pub fn create<B: FrameBackend>(
        backend: &mut B,
        framebuffer_size: (u32, u32),
        render_pass: vk::RenderPass,
    ) -> Result<Self> {
        let support = backend.surface_support()?;
        let request = negotiate(&support, framebuffer_size, backend.queue_families())?;

        let swapchain = backend.create_swapchain(&request)?;
        let mut surface = Self {
            swapchain,
            images: Vec::new(),
            format: request.surface_format,
            present_mode: request.present_mode,
            extent: request.extent,
        };

        if let Err(e) = surface.build_images(backend, render_pass) {
            surface.destroy(backend);
            return Err(e);
        }

        info!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            surface.extent.width,
            surface.extent.height,
            surface.images.len(),
            surface.format.format,
            surface.present_mode
        );

        Ok(surface)
    }

    fn build_images<B: FrameBackend>(&mut self, backend: &mut B, render_pass: vk::RenderPass) -> Result<()> {
        let images = backend.swapchain_images(self.swapchain)?;
        self.images.reserve(images.len());

        for image in images {
            let view = backend.create_image_view(image, self.format.format)?;
            let framebuffer = match backend.create_framebuffer(render_pass, view, self.extent) {
                Ok(framebuffer) => framebuffer,
                Err(e) => {
                    backend.destroy_image_view(view);
                    return Err(e.into());
                }
            };
            self.images.push(PresentableImage {
                image,
                view,
                framebuffer,
            });
        }

        Ok(())
    }

    /// Destroy framebuffers, then views, then the swapchain.
    ///
    /// The images go with the swapchain; the render pass is not touched.
    /// Calling this on an already destroyed surface does nothing.
    pub fn destroy<B: FrameBackend>(&mut self, backend: &mut B) {
        for image in &self.images {
            backend.destroy_framebuffer(image.framebuffer);
        }
        for image in self.images.drain(..) {
            backend.destroy_image_view(image.view);
        }
        if self.swapchain != vk::SwapchainKHR::null() {
            backend.destroy_swapchain(self.swapchain);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }

    /// Rebuild after the surface went stale or the window changed size.
    ///
    /// Waits out a minimised window, then for the device to go idle, then
    /// destroys and recreates everything. Returns `false` without touching the
    /// swapchain if the window was closed while minimised.
    ///
    /// Fails with [`RenderError::SurfaceFormatChanged`] if the surface now
    /// prefers a different pixel format than `render_pass` was created for;
    /// the surface is left destroyed in that case.
    pub fn recreate<B, W>(
        &mut self,
        backend: &mut B,
        window: &mut W,
        render_pass: vk::RenderPass,
    ) -> Result<bool>
    where
        B: FrameBackend,
        W: WindowSystem + ?Sized,
    {
        let (mut width, mut height) = window.framebuffer_size();
        while width == 0 || height == 0 {
            if window.should_close() {
                debug!("Window closed while minimised, skipping swapchain rebuild");
                return Ok(false);
            }
            window.wait_events();
            (width, height) = window.framebuffer_size();
        }

        backend.wait_idle()?;

        let old_format = self.format.format;
        self.destroy(backend);
        *self = Self::create(backend, (width, height), render_pass)?;

        // The render pass was built for the original format and is never rebuilt
        if self.format.format != old_format {
            let new_format = self.format.format;
            warn!("Surface format changed from {old_format:?} to {new_format:?} across rebuild");
            self.destroy(backend);
            return Err(RenderError::SurfaceFormatChanged {
                old: old_format,
                new: new_format,
            });
        }

        Ok(true)
    }

    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn images(&self) -> &[PresentableImage] {
        &self.images
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffer for a swapchain image index.
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.images
            .get(image_index as usize)
            .map(|image| image.framebuffer)
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Whether [`destroy`](Self::destroy) has run and nothing was rebuilt since.
    pub fn is_destroyed(&self) -> bool {
        self.swapchain == vk::SwapchainKHR::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockWindow};

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn create_builds_one_framebuffer_per_image() {
        let mut backend = MockBackend::new();
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();

        // min 2 + 1, below the cap of 8
        assert_eq!(surface.image_count(), 3);
        assert_eq!(backend.live_framebuffers(), 3);
        assert_eq!(backend.live_image_views(), 3);
        assert_eq!(surface.extent(), extent(800, 600));
        assert_eq!(surface.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(surface.format().format, vk::Format::B8G8R8A8_SRGB);
        assert!(surface
            .images()
            .iter()
            .all(|image| backend.framebuffer_render_pass(image.framebuffer) == Some(render_pass)));

        surface.destroy(&mut backend);
    }

    #[test]
    fn destroy_then_create_matches_reported_image_count() {
        let mut backend = MockBackend::new();
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();

        surface.destroy(&mut backend);
        assert!(surface.is_destroyed());
        assert_eq!(backend.live_framebuffers(), 0);
        assert_eq!(backend.live_image_views(), 0);
        assert_eq!(backend.live_swapchains(), 0);

        backend.support.capabilities.min_image_count = 4;
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        assert_eq!(surface.image_count(), 5);
        assert_eq!(backend.live_framebuffers(), backend.last_swapchain_image_count());

        surface.destroy(&mut backend);
    }

    #[test]
    fn destroy_releases_framebuffers_before_views_before_swapchain() {
        let mut backend = MockBackend::new();
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        backend.clear_calls();

        surface.destroy(&mut backend);

        let order = backend.destruction_order();
        assert_eq!(order.len(), 7);
        assert!(order[..3].iter().all(|kind| *kind == "framebuffer"));
        assert!(order[3..6].iter().all(|kind| *kind == "image_view"));
        assert_eq!(order[6], "swapchain");
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut backend = MockBackend::new();
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();

        surface.destroy(&mut backend);
        surface.destroy(&mut backend);
        assert_eq!(backend.swapchains_destroyed(), 1);
        assert!(backend.violations().is_empty());
    }

    #[test]
    fn unbounded_image_count_is_not_clamped() {
        let mut backend = MockBackend::new();
        backend.support.capabilities.min_image_count = 3;
        backend.support.capabilities.max_image_count = 0;
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();

        assert_eq!(surface.image_count(), 4);
        surface.destroy(&mut backend);
    }

    #[test]
    fn image_count_clamped_to_surface_maximum() {
        let mut backend = MockBackend::new();
        backend.support.capabilities.min_image_count = 3;
        backend.support.capabilities.max_image_count = 3;
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();

        assert_eq!(surface.image_count(), 3);
        surface.destroy(&mut backend);
    }

    #[test]
    fn sharing_follows_queue_families() {
        let mut backend = MockBackend::new();
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        assert_eq!(backend.last_request().map(|r| r.sharing), Some(ImageSharing::Exclusive));
        surface.destroy(&mut backend);

        backend.families = QueueFamilyIndices {
            graphics: 0,
            present: 1,
        };
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        assert_eq!(
            backend.last_request().map(|r| r.sharing),
            Some(ImageSharing::Concurrent {
                graphics: 0,
                present: 1
            })
        );
        surface.destroy(&mut backend);
    }

    #[test]
    fn defined_current_extent_wins_over_window_size() {
        let mut backend = MockBackend::new();
        backend.support.capabilities.current_extent = extent(1024, 768);
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();

        assert_eq!(surface.extent(), extent(1024, 768));
        surface.destroy(&mut backend);
    }

    #[test]
    fn empty_format_list_fails() {
        let mut backend = MockBackend::new();
        backend.support.formats.clear();
        let render_pass = backend.render_pass();
        let result = PresentationSurface::create(&mut backend, (800, 600), render_pass);

        assert!(matches!(result, Err(RenderError::NoSurfaceFormats)));
        assert_eq!(backend.live_swapchains(), 0);
    }

    #[test]
    fn failed_framebuffer_creation_cleans_up() {
        let mut backend = MockBackend::new();
        backend.fail_framebuffer_after = Some(2);
        let render_pass = backend.render_pass();
        let result = PresentationSurface::create(&mut backend, (800, 600), render_pass);

        assert!(result.is_err());
        assert_eq!(backend.live_framebuffers(), 0);
        assert_eq!(backend.live_image_views(), 0);
        assert_eq!(backend.live_swapchains(), 0);
    }

    #[test]
    fn recreate_twice_is_idempotent() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(1280, 720);
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, window.framebuffer_size(), render_pass).unwrap();

        assert!(surface.recreate(&mut backend, &mut window, render_pass).unwrap());
        let (count, size) = (surface.image_count(), surface.extent());

        assert!(surface.recreate(&mut backend, &mut window, render_pass).unwrap());
        assert_eq!(surface.image_count(), count);
        assert_eq!(surface.extent(), size);
        assert_eq!(size, extent(1280, 720));
        assert_eq!(backend.live_framebuffers(), count);
        assert_eq!(backend.live_swapchains(), 1);

        surface.destroy(&mut backend);
    }

    #[test]
    fn recreate_waits_for_idle_before_destroying() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(800, 600);
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        backend.clear_calls();

        surface.recreate(&mut backend, &mut window, render_pass).unwrap();

        let first_destroy = backend.destruction_calls_start().unwrap();
        let idle = backend.wait_idle_calls_at();
        assert!(idle.iter().any(|&at| at < first_destroy));

        surface.destroy(&mut backend);
    }

    #[test]
    fn recreate_blocks_while_minimised() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(0, 0);
        window.script_sizes([(0, 0), (0, 0), (640, 480)]);
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        let created_before = backend.swapchains_created();

        assert!(surface.recreate(&mut backend, &mut window, render_pass).unwrap());

        assert_eq!(window.waits(), 3);
        assert_eq!(backend.swapchains_created(), created_before + 1);
        assert_eq!(surface.extent(), extent(640, 480));

        surface.destroy(&mut backend);
    }

    #[test]
    fn recreate_aborts_when_closed_while_minimised() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(0, 0);
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        let created_before = backend.swapchains_created();

        // Nothing scripted: the mock closes on the first wait
        assert!(!surface.recreate(&mut backend, &mut window, render_pass).unwrap());

        assert_eq!(backend.swapchains_created(), created_before);
        assert!(!surface.is_destroyed());
        assert_eq!(surface.extent(), extent(800, 600));

        surface.destroy(&mut backend);
    }

    #[test]
    fn recreate_picks_up_new_window_size() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(800, 600);
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();

        window.resize(1920, 1080);
        surface.recreate(&mut backend, &mut window, render_pass).unwrap();
        assert_eq!(surface.extent(), extent(1920, 1080));

        // Clamped to the mock's 4096x4096 maximum
        window.resize(5000, 100);
        surface.recreate(&mut backend, &mut window, render_pass).unwrap();
        assert_eq!(surface.extent(), extent(4096, 100));

        surface.destroy(&mut backend);
    }

    #[test]
    fn recreate_rejects_a_changed_surface_format() {
        let mut backend = MockBackend::new();
        let mut window = MockWindow::new(800, 600);
        let render_pass = backend.render_pass();
        let mut surface = PresentationSurface::create(&mut backend, (800, 600), render_pass).unwrap();
        assert_eq!(surface.format().format, vk::Format::B8G8R8A8_SRGB);

        backend
            .support
            .formats
            .retain(|format| format.format != vk::Format::B8G8R8A8_SRGB);

        let err = surface.recreate(&mut backend, &mut window, render_pass).unwrap_err();
        assert!(matches!(
            err,
            RenderError::SurfaceFormatChanged {
                old: vk::Format::B8G8R8A8_SRGB,
                new: vk::Format::R8G8B8A8_UNORM,
            }
        ));
        assert!(surface.is_destroyed());
        assert_eq!(backend.live_framebuffers(), 0);
        assert_eq!(backend.live_image_views(), 0);
        assert_eq!(backend.live_swapchains(), 0);
    }
}
