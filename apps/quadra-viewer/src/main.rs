//! Quadra Viewer
//!
//! Opens an 800x600 window and draws a vertex-colored quad until it is closed.
//! Compiled shaders are read from `shaders/output/` relative to the working
//! directory.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p quadra-viewer
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use quadra_app::{run_app, AppConfig};

fn main() -> anyhow::Result<()> {
    run_app(AppConfig::default())
}
