//! Scriptable stand-ins for the GPU and the window.
//!
//! `MockBackend` fabricates handles and models fence state the way a queue
//! would: submitted work stays pending until someone waits on its fence or
//! the device is drained. Misuse is recorded as a violation instead of
//! panicking so tests can assert on the whole history.

use std::collections::{HashMap, HashSet, VecDeque};

use ash::vk::{self, Handle};
use quadra_gpu::{
    AcquireOutcome, FrameSync, PresentOutcome, QueueFamilyIndices, Result, SurfaceCapabilities,
    SwapchainRequest,
};
use quadra_platform::{ResizeCallback, WindowSystem};

use crate::backend::{DrawTarget, FrameBackend};
use crate::frame_slots::FrameSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending,
}

/// A backend call, in the order it was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    CreateSwapchain,
    DestroySwapchain,
    CreateImageView,
    DestroyImageView,
    CreateFramebuffer,
    DestroyFramebuffer,
    WaitIdle,
    WaitFence(vk::Fence),
    ResetFence(vk::Fence),
    Acquire {
        signal: vk::Semaphore,
    },
    ResetCommandBuffer(vk::CommandBuffer),
    Record {
        command_buffer: vk::CommandBuffer,
        target: DrawTarget,
    },
    Submit {
        command_buffer: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    },
    Present {
        image_index: u32,
        wait: vk::Semaphore,
    },
}

impl Call {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateSwapchain => "create_swapchain",
            Self::DestroySwapchain => "destroy_swapchain",
            Self::CreateImageView => "create_image_view",
            Self::DestroyImageView => "destroy_image_view",
            Self::CreateFramebuffer => "create_framebuffer",
            Self::DestroyFramebuffer => "destroy_framebuffer",
            Self::WaitIdle => "wait_idle",
            Self::WaitFence(_) => "wait_fence",
            Self::ResetFence(_) => "reset_fence",
            Self::Acquire { .. } => "acquire",
            Self::ResetCommandBuffer(_) => "reset_command_buffer",
            Self::Record { .. } => "record",
            Self::Submit { .. } => "submit",
            Self::Present { .. } => "present",
        }
    }
}

pub struct MockBackend {
    pub support: SurfaceCapabilities,
    pub families: QueueFamilyIndices,
    /// Fail framebuffer creation once this many have been created.
    pub fail_framebuffer_after: Option<usize>,
    /// Fail every submission with this result.
    pub fail_submit: Option<vk::Result>,

    render_pass: vk::RenderPass,
    next_handle: u64,
    hung: bool,

    fences: HashMap<vk::Fence, FenceState>,
    slot_fences: HashMap<vk::CommandBuffer, vk::Fence>,
    swapchains: HashMap<vk::SwapchainKHR, Vec<vk::Image>>,
    image_views: HashSet<vk::ImageView>,
    framebuffers: HashMap<vk::Framebuffer, vk::RenderPass>,
    recorded: HashMap<vk::CommandBuffer, DrawTarget>,
    in_use: HashMap<vk::Fence, vk::Framebuffer>,

    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    next_image: u32,

    last_request: Option<SwapchainRequest>,
    swapchains_created: usize,
    swapchains_destroyed: usize,
    framebuffers_created: usize,

    calls: Vec<Call>,
    violations: Vec<String>,
}

impl MockBackend {
    /// A surface offering 2..=8 images, BGRA sRGB and mailbox, with the
    /// extent left to the window.
    pub fn new() -> Self {
        let support = SurfaceCapabilities {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };

        let mut backend = Self {
            support,
            families: QueueFamilyIndices {
                graphics: 0,
                present: 0,
            },
            fail_framebuffer_after: None,
            fail_submit: None,
            render_pass: vk::RenderPass::null(),
            next_handle: 0,
            hung: false,
            fences: HashMap::new(),
            slot_fences: HashMap::new(),
            swapchains: HashMap::new(),
            image_views: HashSet::new(),
            framebuffers: HashMap::new(),
            recorded: HashMap::new(),
            in_use: HashMap::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            next_image: 0,
            last_request: None,
            swapchains_created: 0,
            swapchains_destroyed: 0,
            framebuffers_created: 0,
            calls: Vec::new(),
            violations: Vec::new(),
        };
        backend.render_pass = backend.handle();
        backend
    }

    fn handle<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(self.next_handle)
    }

    fn violation(&mut self, message: impl Into<String>) {
        self.violations.push(message.into());
    }

    fn complete(&mut self, fence: vk::Fence) {
        self.fences.insert(fence, FenceState::Signaled);
        self.in_use.remove(&fence);
    }

    /// Queue acquire results; once drained, images are handed out round-robin.
    pub fn script_acquire(&mut self, outcomes: impl IntoIterator<Item = AcquireOutcome>) {
        self.acquire_script.extend(outcomes);
    }

    /// Queue present results; once drained, every present succeeds.
    pub fn script_present(&mut self, outcomes: impl IntoIterator<Item = PresentOutcome>) {
        self.present_script.extend(outcomes);
    }

    /// Submitted work stops completing on fence waits.
    pub fn hang_gpu(&mut self) {
        self.hung = true;
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn live_slots(&self) -> usize {
        self.slot_fences.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn live_image_views(&self) -> usize {
        self.image_views.len()
    }

    pub fn live_swapchains(&self) -> usize {
        self.swapchains.len()
    }

    pub fn pending_submissions(&self) -> usize {
        self.fences
            .values()
            .filter(|state| **state == FenceState::Pending)
            .count()
    }

    pub fn framebuffer_render_pass(&self, framebuffer: vk::Framebuffer) -> Option<vk::RenderPass> {
        self.framebuffers.get(&framebuffer).copied()
    }

    pub fn last_request(&self) -> Option<SwapchainRequest> {
        self.last_request
    }

    pub fn last_swapchain_image_count(&self) -> usize {
        self.last_request.map_or(0, |r| r.image_count as usize)
    }

    pub fn swapchains_created(&self) -> usize {
        self.swapchains_created
    }

    pub fn swapchains_destroyed(&self) -> usize {
        self.swapchains_destroyed
    }

    /// Kinds of the destroy calls made, in order.
    pub fn destruction_order(&self) -> Vec<&'static str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::DestroyFramebuffer => Some("framebuffer"),
                Call::DestroyImageView => Some("image_view"),
                Call::DestroySwapchain => Some("swapchain"),
                _ => None,
            })
            .collect()
    }

    /// Position of the first destroy call in the call log.
    pub fn destruction_calls_start(&self) -> Option<usize> {
        self.calls.iter().position(|call| {
            matches!(
                call,
                Call::DestroyFramebuffer | Call::DestroyImageView | Call::DestroySwapchain
            )
        })
    }

    /// Positions of every idle wait in the call log.
    pub fn wait_idle_calls_at(&self) -> Vec<usize> {
        self.calls
            .iter()
            .enumerate()
            .filter(|(_, call)| **call == Call::WaitIdle)
            .map(|(at, _)| at)
            .collect()
    }
}

impl FrameBackend for MockBackend {
    fn surface_support(&mut self) -> Result<SurfaceCapabilities> {
        Ok(self.support.clone())
    }

    fn queue_families(&self) -> QueueFamilyIndices {
        self.families
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn create_swapchain(&mut self, request: &SwapchainRequest) -> Result<vk::SwapchainKHR> {
        self.calls.push(Call::CreateSwapchain);
        let swapchain = self.handle();
        let images = (0..request.image_count).map(|_| self.handle()).collect();
        self.swapchains.insert(swapchain, images);
        self.last_request = Some(*request);
        self.swapchains_created += 1;
        self.next_image = 0;
        Ok(swapchain)
    }

    fn swapchain_images(&mut self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>> {
        self.swapchains
            .get(&swapchain)
            .cloned()
            .ok_or_else(|| vk::Result::ERROR_SURFACE_LOST_KHR.into())
    }

    fn create_image_view(&mut self, _image: vk::Image, _format: vk::Format) -> Result<vk::ImageView> {
        self.calls.push(Call::CreateImageView);
        let view = self.handle();
        self.image_views.insert(view);
        Ok(view)
    }

    fn create_framebuffer(
        &mut self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        if self
            .fail_framebuffer_after
            .is_some_and(|limit| self.framebuffers_created >= limit)
        {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into());
        }
        if !self.image_views.contains(&view) {
            self.violation("framebuffer built on a dead image view");
        }
        self.calls.push(Call::CreateFramebuffer);
        let framebuffer = self.handle();
        self.framebuffers.insert(framebuffer, render_pass);
        self.framebuffers_created += 1;
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&mut self, framebuffer: vk::Framebuffer) {
        self.calls.push(Call::DestroyFramebuffer);
        if self.in_use.values().any(|used| *used == framebuffer) {
            self.violation("framebuffer destroyed while pending work references it");
        }
        if self.framebuffers.remove(&framebuffer).is_none() {
            self.violation("framebuffer destroyed twice");
        }
    }

    fn destroy_image_view(&mut self, view: vk::ImageView) {
        self.calls.push(Call::DestroyImageView);
        if !self.image_views.remove(&view) {
            self.violation("image view destroyed twice");
        }
    }

    fn destroy_swapchain(&mut self, swapchain: vk::SwapchainKHR) {
        self.calls.push(Call::DestroySwapchain);
        if !self.in_use.is_empty() {
            self.violation("swapchain destroyed with work in flight");
        }
        if self.swapchains.remove(&swapchain).is_none() {
            self.violation("swapchain destroyed twice");
        }
        self.swapchains_destroyed += 1;
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.calls.push(Call::WaitIdle);
        let pending: Vec<vk::Fence> = self
            .fences
            .iter()
            .filter(|(_, state)| **state == FenceState::Pending)
            .map(|(fence, _)| *fence)
            .collect();
        for fence in pending {
            self.complete(fence);
        }
        Ok(())
    }

    fn create_frame_slot(&mut self) -> Result<FrameSlot> {
        let slot = FrameSlot {
            sync: FrameSync {
                image_available: self.handle(),
                render_finished: self.handle(),
                in_flight: self.handle(),
            },
            command_buffer: self.handle(),
        };
        self.fences.insert(slot.sync.in_flight, FenceState::Signaled);
        self.slot_fences
            .insert(slot.command_buffer, slot.sync.in_flight);
        Ok(slot)
    }

    fn destroy_frame_slot(&mut self, slot: &FrameSlot) {
        if self.fences.get(&slot.sync.in_flight) == Some(&FenceState::Pending) {
            self.violation("frame slot destroyed while its work is pending");
        }
        self.fences.remove(&slot.sync.in_flight);
        self.slot_fences.remove(&slot.command_buffer);
        self.recorded.remove(&slot.command_buffer);
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, _timeout_ns: u64) -> Result<bool> {
        self.calls.push(Call::WaitFence(fence));
        match self.fences.get(&fence).copied() {
            Some(FenceState::Signaled) => Ok(true),
            Some(FenceState::Pending) if !self.hung => {
                self.complete(fence);
                Ok(true)
            }
            // Nothing will ever signal it
            Some(FenceState::Pending | FenceState::Unsignaled) => Ok(false),
            None => {
                self.violation("wait on unknown fence");
                Ok(false)
            }
        }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> Result<()> {
        self.calls.push(Call::ResetFence(fence));
        if self.fences.get(&fence) == Some(&FenceState::Pending) {
            self.violation("fence reset while its work is pending");
        }
        self.fences.insert(fence, FenceState::Unsignaled);
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        swapchain: vk::SwapchainKHR,
        image_available: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        self.calls.push(Call::Acquire {
            signal: image_available,
        });
        let Some(images) = self.swapchains.get(&swapchain) else {
            self.violation("acquire from a dead swapchain");
            return Ok(AcquireOutcome::OutOfDate);
        };
        let count = u32::try_from(images.len()).unwrap_or(u32::MAX).max(1);

        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = self.next_image % count;
        self.next_image += 1;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn reset_command_buffer(&mut self, command_buffer: vk::CommandBuffer) -> Result<()> {
        self.calls.push(Call::ResetCommandBuffer(command_buffer));
        let pending = self
            .slot_fences
            .get(&command_buffer)
            .and_then(|fence| self.fences.get(fence))
            == Some(&FenceState::Pending);
        if pending {
            self.violation("command buffer reset while its fence is pending");
        }
        self.recorded.remove(&command_buffer);
        Ok(())
    }

    fn record_draw(&mut self, command_buffer: vk::CommandBuffer, target: &DrawTarget) -> Result<()> {
        self.calls.push(Call::Record {
            command_buffer,
            target: *target,
        });
        if !self.framebuffers.contains_key(&target.framebuffer) {
            self.violation("recorded against a dead framebuffer");
        }
        self.recorded.insert(command_buffer, *target);
        Ok(())
    }

    fn submit(&mut self, slot: &FrameSlot) -> Result<()> {
        self.calls.push(Call::Submit {
            command_buffer: slot.command_buffer,
            wait: slot.sync.image_available,
            signal: slot.sync.render_finished,
            fence: slot.sync.in_flight,
        });
        if let Some(error) = self.fail_submit {
            return Err(error.into());
        }

        let fence = slot.sync.in_flight;
        if self.fences.get(&fence) != Some(&FenceState::Unsignaled) {
            self.violation("submitted with a fence that was not reset");
        }
        let Some(target) = self.recorded.get(&slot.command_buffer).copied() else {
            self.violation("submitted an unrecorded command buffer");
            return Ok(());
        };
        self.fences.insert(fence, FenceState::Pending);
        self.in_use.insert(fence, target.framebuffer);
        Ok(())
    }

    fn present(
        &mut self,
        _swapchain: vk::SwapchainKHR,
        image_index: u32,
        render_finished: vk::Semaphore,
    ) -> Result<PresentOutcome> {
        self.calls.push(Call::Present {
            image_index,
            wait: render_finished,
        });
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }
}

/// A window whose size and close signal are driven by the test.
pub struct MockWindow {
    size: (u32, u32),
    scripted_sizes: VecDeque<(u32, u32)>,
    close: bool,
    close_after_polls: Option<usize>,
    polls: usize,
    waits: usize,
    callback: Option<ResizeCallback>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            scripted_sizes: VecDeque::new(),
            close: false,
            close_after_polls: None,
            polls: 0,
            waits: 0,
            callback: None,
        }
    }

    /// Change the size and fire the resize hook.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if let Some(callback) = self.callback.as_mut() {
            callback(width, height);
        }
    }

    /// Change the size without firing the hook.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Sizes delivered one per `wait_events`. With none left, waiting closes the window.
    pub fn script_sizes(&mut self, sizes: impl IntoIterator<Item = (u32, u32)>) {
        self.scripted_sizes.extend(sizes);
    }

    /// Request close on the `n`th poll.
    pub fn close_after_polls(&mut self, n: usize) {
        self.close_after_polls = Some(n);
    }

    pub fn polls(&self) -> usize {
        self.polls
    }

    pub fn waits(&self) -> usize {
        self.waits
    }

    pub fn has_resize_callback(&self) -> bool {
        self.callback.is_some()
    }
}

impl WindowSystem for MockWindow {
    fn poll_events(&mut self) {
        self.polls += 1;
        if self.close_after_polls.is_some_and(|n| self.polls >= n) {
            self.close = true;
        }
    }

    fn wait_events(&mut self) {
        self.waits += 1;
        match self.scripted_sizes.pop_front() {
            Some((width, height)) => self.resize(width, height),
            None => self.close = true,
        }
    }

    fn should_close(&self) -> bool {
        self.close
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_resize_callback(&mut self, callback: ResizeCallback) {
        self.callback = Some(callback);
    }
}
