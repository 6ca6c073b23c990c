//! GPU context management.

use crate::debug::DebugMessenger;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, required_device_extensions, select_physical_device};
use crate::memory::GpuAllocator;
use crate::surface::SurfaceContext;
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::c_char;
use std::sync::Arc;

/// Queue families used for rendering and presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Whether one family serves both roles.
    pub fn is_same(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_same() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Pick graphics and present families from a device's queue families.
///
/// A family able to do both is preferred so images can be owned
/// exclusively. Returns `None` if either role cannot be filled.
pub fn pick_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> Result<Option<QueueFamilyIndices>>
where
    F: FnMut(u32) -> Result<bool>,
{
    let mut graphics = None;
    let mut present = None;

    for (i, family) in (0u32..).zip(families) {
        let is_graphics = family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let is_present = supports_present(i)?;

        if is_graphics && is_present {
            return Ok(Some(QueueFamilyIndices {
                graphics: i,
                present: i,
            }));
        }
        if is_graphics && graphics.is_none() {
            graphics = Some(i);
        }
        if is_present && present.is_none() {
            present = Some(i);
        }
    }

    Ok(graphics
        .zip(present)
        .map(|(graphics, present)| QueueFamilyIndices { graphics, present }))
}

/// Find graphics and present queue families for a physical device.
///
/// # Safety
/// The instance, physical device and surface must be valid.
pub unsafe fn find_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: &SurfaceContext,
) -> Result<Option<QueueFamilyIndices>> {
    let families = instance.get_physical_device_queue_family_properties(physical_device);
    pick_queue_families(&families, |family| {
        surface.supports_present(physical_device, family)
    })
}

/// Main GPU context holding Vulkan resources.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) debug_messenger: Option<DebugMessenger>,
    pub(crate) surface: SurfaceContext,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) queue_families: QueueFamilyIndices,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
    pub(crate) allocator: Mutex<GpuAllocator>,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the window surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the queue family indices.
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Whether the validation messenger is installed.
    pub fn validation_enabled(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocator frees its VkDeviceMemory and must go before the device
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Quadra".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context for rendering into `window`.
    ///
    /// The window must outlive the returned context.
    pub fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Loading(e.to_string()))?;

        let display_handle = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let (instance, validation) = unsafe {
            create_instance(&entry, &self.app_name, display_handle, self.enable_validation)
        }?;

        let debug_messenger = if validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    tracing::warn!("Debug messenger unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let destroy_instance = |debug_messenger: Option<DebugMessenger>| unsafe {
            if let Some(messenger) = debug_messenger {
                messenger.destroy();
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe { SurfaceContext::from_window(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        let created = unsafe { Self::create_device(&instance, &surface) };
        let (selected, device, graphics_queue, present_queue) = match created {
            Ok(parts) => parts,
            Err(e) => {
                unsafe { surface.destroy() };
                destroy_instance(debug_messenger);
                return Err(e);
            }
        };

        tracing::info!("Selected GPU: {}", selected.capabilities.summary());
        if !selected.queue_families.is_same() {
            tracing::info!(
                "Graphics family {} and present family {} differ; images will be shared concurrently",
                selected.queue_families.graphics,
                selected.queue_families.present
            );
        }

        let device = Arc::new(device);
        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        let allocator =
            match unsafe { GpuAllocator::new(&instance, device.clone(), selected.physical_device) } {
                Ok(allocator) => allocator,
                Err(e) => {
                    unsafe {
                        device.destroy_device(None);
                        surface.destroy();
                    }
                    destroy_instance(debug_messenger);
                    return Err(e);
                }
            };

        Ok(GpuContext {
            entry,
            instance,
            debug_messenger,
            surface,
            physical_device: selected.physical_device,
            device,
            queue_families: selected.queue_families,
            graphics_queue,
            present_queue,
            swapchain_loader,
            allocator: Mutex::new(allocator),
        })
    }

    /// Select a physical device, then create the logical device and its queues.
    ///
    /// # Safety
    /// The instance and surface must be valid.
    unsafe fn create_device(
        instance: &ash::Instance,
        surface: &SurfaceContext,
    ) -> Result<(crate::instance::SelectedDevice, ash::Device, vk::Queue, vk::Queue)> {
        let selected = select_physical_device(instance, surface)?;
        let queue_families = selected.queue_families;

        // One queue from each distinct family
        let queue_priority = 1.0_f32;
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(std::slice::from_ref(&queue_priority))
            })
            .collect();

        let extensions = required_device_extensions();
        let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = instance
            .create_device(selected.physical_device, &device_create_info, None)
            .map_err(GpuError::from)?;

        let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
        let present_queue = device.get_device_queue(queue_families.present, 0);

        Ok((selected, device, graphics_queue, present_queue))
    }
}
