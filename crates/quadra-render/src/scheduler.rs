//! The render loop and per-frame state machine.

use quadra_gpu::AcquireOutcome;
use quadra_platform::{ResizeSignal, WindowSystem};
use tracing::{debug, info, warn};

use crate::backend::{DrawTarget, FrameBackend};
use crate::error::{RenderError, Result};
use crate::frame_slots::FrameSlots;
use crate::presentation::PresentationSurface;

/// How long a fence wait may block before the frame is declared lost.
pub const FENCE_TIMEOUT_NS: u64 = u64::MAX;

/// Counters kept across the life of a scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames submitted and handed to the presentation engine.
    pub frames_presented: u64,
    /// Successful swapchain rebuilds.
    pub rebuilds: u64,
}

/// What a single [`FrameScheduler::draw_frame`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented. `rebuilt` is set only when the
    /// surface was actually recreated afterwards.
    Presented { image_index: u32, rebuilt: bool },
    /// The swapchain was stale at acquire time; nothing was submitted.
    Skipped,
}

/// Drives frames through wait, acquire, record, submit and present.
///
/// Owns the backend, the frame slots and the presentation surface. On drop
/// the device is drained and the slots and surface are released before the
/// backend itself.
pub struct FrameScheduler<B: FrameBackend> {
    slots: FrameSlots,
    surface: PresentationSurface,
    resize: ResizeSignal,
    stats: FrameStats,
    backend: B,
}

impl<B: FrameBackend> FrameScheduler<B> {
    /// Create the frame slots and the initial swapchain, and hook window resizes.
    pub fn new<W>(mut backend: B, window: &mut W, frames_in_flight: usize) -> Result<Self>
    where
        W: WindowSystem + ?Sized,
    {
        let mut slots = FrameSlots::new(&mut backend, frames_in_flight)?;

        let render_pass = backend.render_pass();
        let surface = match PresentationSurface::create(&mut backend, window.framebuffer_size(), render_pass) {
            Ok(surface) => surface,
            Err(e) => {
                slots.destroy(&mut backend);
                return Err(e);
            }
        };

        let resize = ResizeSignal::new();
        let raise = resize.clone();
        window.set_resize_callback(Box::new(move |_, _| raise.raise()));

        info!("Frame scheduler ready with {frames_in_flight} frames in flight");

        Ok(Self {
            slots,
            surface,
            resize,
            stats: FrameStats::default(),
            backend,
        })
    }

    /// Pump events and draw until the window asks to close, then drain the device.
    pub fn run<W>(&mut self, window: &mut W) -> Result<FrameStats>
    where
        W: WindowSystem + ?Sized,
    {
        info!("Entering render loop");

        loop {
            window.poll_events();
            if window.should_close() {
                break;
            }
            self.draw_frame(window)?;
        }

        self.backend.wait_idle()?;
        info!(
            "Render loop finished: {} frames presented, {} swapchain rebuilds",
            self.stats.frames_presented, self.stats.rebuilds
        );

        Ok(self.stats)
    }

    /// Render and present one frame.
    pub fn draw_frame<W>(&mut self, window: &mut W) -> Result<FrameOutcome>
    where
        W: WindowSystem + ?Sized,
    {
        let slot_index = self.slots.current_index();
        let slot = *self.slots.current();

        // The slot's previous submission must be finished before anything it used is touched
        if !self.backend.wait_for_fence(slot.sync.in_flight, FENCE_TIMEOUT_NS)? {
            return Err(RenderError::FenceTimeout { slot: slot_index });
        }

        let acquired = self
            .backend
            .acquire_next_image(self.surface.swapchain(), slot.sync.image_available)?;
        let image_index = match acquired {
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date at acquire");
                // Fence stays signaled so this slot can retry right away
                self.rebuild(window)?;
                return Ok(FrameOutcome::Skipped);
            }
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    warn!("Acquired image {image_index} from a suboptimal swapchain");
                }
                image_index
            }
        };

        let framebuffer = self
            .surface
            .framebuffer(image_index)
            .ok_or(RenderError::ImageOutOfRange {
                index: image_index,
                count: self.surface.image_count(),
            })?;

        self.backend.reset_fence(slot.sync.in_flight)?;

        self.backend.reset_command_buffer(slot.command_buffer)?;
        self.backend.record_draw(
            slot.command_buffer,
            &DrawTarget {
                framebuffer,
                extent: self.surface.extent(),
            },
        )?;

        self.backend.submit(&slot)?;

        let presented = self.backend.present(
            self.surface.swapchain(),
            image_index,
            slot.sync.render_finished,
        )?;
        self.stats.frames_presented += 1;

        let resized = self.resize.is_raised();
        let mut rebuilt = false;
        if presented.is_stale() || resized {
            debug!("Rebuilding after present ({presented:?}, resized: {resized})");
            rebuilt = self.rebuild(window)?;
        }

        self.slots.advance();

        Ok(FrameOutcome::Presented {
            image_index,
            rebuilt,
        })
    }

    /// Returns whether the surface was actually rebuilt.
    fn rebuild<W>(&mut self, window: &mut W) -> Result<bool>
    where
        W: WindowSystem + ?Sized,
    {
        let render_pass = self.backend.render_pass();
        let rebuilt = self.surface.recreate(&mut self.backend, window, render_pass)?;
        if rebuilt {
            // The rebuild used the latest size, so earlier resizes are covered
            self.resize.take();
            self.stats.rebuilds += 1;
        }
        Ok(rebuilt)
    }

    /// Index of the frame slot the next [`draw_frame`](Self::draw_frame) uses.
    pub fn current_frame(&self) -> usize {
        self.slots.current_index()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn surface(&self) -> &PresentationSurface {
        &self.surface
    }

    /// The flag raised by the window's resize hook.
    pub fn resize_signal(&self) -> &ResizeSignal {
        &self.resize
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: FrameBackend> Drop for FrameScheduler<B> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.wait_idle() {
            warn!("Failed to wait for device idle during teardown: {e}");
        }
        self.slots.destroy(&mut self.backend);
        self.surface.destroy(&mut self.backend);
        debug!("Frame scheduler destroyed");
    }
}
