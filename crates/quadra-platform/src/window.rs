//! Desktop window backed by winit.
//!
//! The render loop owns control flow, so the event loop is pumped on demand
//! instead of handing control to `EventLoop::run_app`.

use std::sync::Arc;
use std::time::Duration;

use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tracing::{debug, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

use crate::{PlatformConfig, PlatformError, ResizeCallback, Result, WindowSystem};

/// Event handler state, fed by each pump of the event loop.
struct WindowState {
    config: PlatformConfig,
    window: Option<Arc<Window>>,
    close_requested: bool,
    creation_error: Option<String>,
    resize_callback: Option<ResizeCallback>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(self.config.resizable);

        match event_loop.create_window(window_attrs) {
            Ok(window) => {
                info!(
                    "Created window '{}' ({}x{})",
                    self.config.title, self.config.width, self.config.height
                );
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                self.creation_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                if let Some(callback) = self.resize_callback.as_mut() {
                    callback(size.width, size.height);
                }
            }
            _ => {}
        }
    }
}

/// A native window plus the event loop that drives it.
pub struct DesktopWindow {
    event_loop: EventLoop<()>,
    state: WindowState,
    window: Arc<Window>,
}

impl DesktopWindow {
    /// Open a window and pump the event loop until it exists.
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let mut event_loop =
            EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Wait);

        let mut state = WindowState {
            config,
            window: None,
            close_requested: false,
            creation_error: None,
            resize_callback: None,
        };

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(16)), &mut state);

            if let Some(error) = state.creation_error.take() {
                return Err(PlatformError::WindowCreation(error));
            }
            if let Some(window) = &state.window {
                break Arc::clone(window);
            }
            if let PumpStatus::Exit(code) = status {
                return Err(PlatformError::EventLoop(format!(
                    "Event loop exited with code {code} before the window was created"
                )));
            }
        };

        Ok(Self {
            event_loop,
            state,
            window,
        })
    }

    /// The underlying winit window.
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            debug!("Event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }
}

impl WindowSystem for DesktopWindow {
    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn set_resize_callback(&mut self, callback: ResizeCallback) {
        self.state.resize_callback = Some(callback);
    }
}

impl HasWindowHandle for DesktopWindow {
    fn window_handle(&self) -> std::result::Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for DesktopWindow {
    fn display_handle(&self) -> std::result::Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}
