//! Vulkan instance creation and physical device selection.

use crate::capabilities::GpuCapabilities;
use crate::context::{find_queue_families, QueueFamilyIndices};
use crate::debug::debug_messenger_create_info;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Validation layers to enable in debug builds.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Required device extensions.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Check whether every requested validation layer is installed.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
unsafe fn validation_layers_available(entry: &ash::Entry) -> Result<bool> {
    let available_layers = entry.enumerate_instance_layer_properties()?;
    for layer in validation_layers() {
        let found = available_layers.iter().any(|props| {
            let name = CStr::from_ptr(props.layer_name.as_ptr());
            name == layer
        });
        if !found {
            tracing::warn!("Validation layer {} not available", layer.to_string_lossy());
            return Ok(false);
        }
    }
    Ok(true)
}

/// Create a Vulkan instance able to present to the given display.
///
/// Returns the instance and whether validation ended up enabled.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display_handle: RawDisplayHandle,
    enable_validation: bool,
) -> Result<(ash::Instance, bool)> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::InvalidState(format!("Application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"Quadra")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    // Window-system extensions for this display
    let mut extension_names: Vec<*const c_char> =
        ash_window::enumerate_required_extensions(display_handle)?.to_vec();

    #[cfg(target_os = "macos")]
    extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());

    let validation = enable_validation && validation_layers_available(entry)?;
    if validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let layers = if validation {
        validation_layers()
    } else {
        vec![]
    };
    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    // Covers messages emitted during instance creation and destruction
    let mut debug_info = debug_messenger_create_info();

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);
    if validation {
        create_info = create_info.push_next(&mut debug_info);
    }

    let instance = entry.create_instance(&create_info, None)?;

    Ok((instance, validation))
}

/// A physical device that passed every suitability check.
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub capabilities: GpuCapabilities,
    pub queue_families: QueueFamilyIndices,
}

/// Select the best physical device able to render to and present on `surface`.
///
/// # Safety
/// The instance and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface: &SurfaceContext,
) -> Result<SelectedDevice> {
    let devices = instance.enumerate_physical_devices()?;

    if devices.is_empty() {
        return Err(GpuError::NoSuitableDevice);
    }

    let mut best: Option<(i32, SelectedDevice)> = None;

    for physical_device in devices {
        let capabilities = GpuCapabilities::query(instance, physical_device);
        let score = capabilities.suitability_score();

        if score <= 0 {
            tracing::debug!("Skipping {}: score {score}", capabilities.device_name);
            continue;
        }

        let Some(queue_families) = find_queue_families(instance, physical_device, surface)?
        else {
            tracing::debug!("Skipping {}: missing queue families", capabilities.device_name);
            continue;
        };

        let has_extensions = required_device_extensions()
            .iter()
            .all(|ext| capabilities.supports_extension(ext));
        if !has_extensions {
            tracing::debug!("Skipping {}: missing extensions", capabilities.device_name);
            continue;
        }

        // Swapchain support is only meaningful once the extension is known present
        let support = surface.capabilities(physical_device)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            tracing::debug!("Skipping {}: inadequate swapchain", capabilities.device_name);
            continue;
        }

        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((
                score,
                SelectedDevice {
                    physical_device,
                    capabilities,
                    queue_families,
                },
            ));
        }
    }

    best.map(|(_, selected)| selected)
        .ok_or(GpuError::NoSuitableDevice)
}
