//! Application runner.

use anyhow::Context;
use quadra_core::constants::{DEFAULT_HEIGHT, DEFAULT_TITLE, DEFAULT_WIDTH, MAX_FRAMES_IN_FLIGHT};
use quadra_gpu::GpuContextBuilder;
use quadra_platform::{DesktopWindow, PlatformConfig};
use quadra_render::{FrameScheduler, VulkanBackend};
use quadra_shaders::ShaderPaths;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Whether the user may resize the window.
    pub resizable: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Number of frames the CPU may record ahead of the GPU. Must be at least 2.
    pub frames_in_flight: usize,
    /// Compiled SPIR-V locations.
    pub shaders: ShaderPaths,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            resizable: true,
            validation: cfg!(debug_assertions),
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            shaders: ShaderPaths::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Allow or forbid window resizing.
    pub fn with_resizable(mut self, resizable: bool) -> Self {
        self.resizable = resizable;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set where the compiled shaders are loaded from.
    pub fn with_shaders(mut self, shaders: ShaderPaths) -> Self {
        self.shaders = shaders;
        self
    }

    fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            title: self.title.clone(),
            width: self.width,
            height: self.height,
            resizable: self.resizable,
        }
    }
}

/// Run the renderer with the given configuration.
///
/// Initializes logging, creates the window and GPU context, and draws until
/// the window is closed. Any unrecovered error is returned to the caller.
pub fn run_app(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting {}", config.title);

    let mut window = DesktopWindow::new(config.platform()).context("failed to create window")?;

    let context = GpuContextBuilder::new()
        .app_name(&config.title)
        .validation(config.validation)
        .build(&window)
        .context("failed to initialize Vulkan")?;

    let shaders = config.shaders.load().context("failed to load shaders")?;
    let backend = VulkanBackend::new(context, &shaders).context("failed to build pipeline")?;

    // Declared after the window so it is dropped first
    let mut scheduler = FrameScheduler::new(backend, &mut window, config.frames_in_flight)
        .context("failed to create frame scheduler")?;

    let stats = scheduler.run(&mut window)?;
    info!(
        "Exiting after {} frames ({} rebuilds)",
        stats.frames_presented, stats.rebuilds
    );

    Ok(())
}
