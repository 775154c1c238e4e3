//! Windowed harness for `gilded-device`.
//!
//! Opens a window, builds a [`RenderDevice`](gilded_device::RenderDevice) on
//! the wgpu backend and feeds it a synthetic scene through the native
//! callback table, the same path a UI library takes.

mod demo;
mod gpu;
mod runtime;
mod time;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gilded_device::logging::{LoggingConfig, init_logging};

#[derive(Parser, Debug)]
#[command(
    name = "gilded-viewer",
    about = "Render a synthetic UI scene through the gilded render device."
)]
struct Args {
    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 960)]
    width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    #[arg(long, default_value = "gilded viewer")]
    title: String,

    /// Load `<key>.wgsl` shader modules from this directory instead of the generated ones
    #[arg(long, value_name = "DIR")]
    shader_dir: Option<PathBuf>,

    /// Log filter in env_logger syntax (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// Render without a stencil attachment
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_stencil: bool,

    /// Log device statistics every N frames (0 disables)
    #[arg(long, value_name = "FRAMES", default_value_t = 0)]
    stats_every: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..Default::default()
    });

    runtime::run(runtime::ViewerConfig {
        title: args.title,
        width: args.width,
        height: args.height,
        shader_dir: args.shader_dir,
        stencil: !args.no_stencil,
        stats_every: args.stats_every,
    })
}
