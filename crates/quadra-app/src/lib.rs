//! Application runner for the Quadra renderer.
//!
//! Wires the window, GPU context, shaders and frame scheduler together and
//! runs the loop until the window closes.
//!
//! # Example
//!
//! ```no_run
//! use quadra_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("Quad").with_size(1024, 768))
//! }
//! ```

mod runner;

pub use runner::{run_app, AppConfig};

pub use quadra_render::FrameStats;
pub use quadra_shaders::ShaderPaths;
