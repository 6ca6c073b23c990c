//! Platform abstraction for the Quadra renderer.
//!
//! Provides the windowing collaborator the frame scheduler drives: event
//! pumping, the close signal, framebuffer size queries and a resize hook.

pub mod resize;
pub mod window;

pub use resize::ResizeSignal;
pub use window::DesktopWindow;

use quadra_core::constants::{DEFAULT_HEIGHT, DEFAULT_TITLE, DEFAULT_WIDTH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// Platform configuration.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Window title.
    pub title: String,
    /// Initial framebuffer width in physical pixels.
    pub width: u32,
    /// Initial framebuffer height in physical pixels.
    pub height: u32,
    /// Whether the user may resize the window.
    pub resizable: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            resizable: true,
        }
    }
}

/// Callback invoked with the new framebuffer size whenever the window is resized.
pub type ResizeCallback = Box<dyn FnMut(u32, u32)>;

/// What the renderer needs from a window.
///
/// All methods are called from the single thread driving the render loop.
pub trait WindowSystem {
    /// Process pending events without blocking.
    fn poll_events(&mut self);

    /// Block until at least one event arrives, then process it.
    fn wait_events(&mut self);

    /// Whether the user asked the window to close.
    fn should_close(&self) -> bool;

    /// Current drawable size in pixels. `(0, 0)` while minimised.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Install the resize hook, replacing any previous one.
    fn set_resize_callback(&mut self, callback: ResizeCallback);
}
