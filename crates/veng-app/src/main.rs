// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use veng_core::init_tracing;
use veng_platform::Window;
use veng_render::Renderer;
use veng_render_vk::VkRenderer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = "veng.toml")]
    config: PathBuf,

    /// Move the window to this monitor (0-based) at startup
    #[arg(long)]
    monitor: Option<usize>,

    /// Force the validation layer on or off
    #[arg(long, action = clap::ArgAction::Set)]
    validation: Option<bool>,
}

fn run(args: Args) -> Result<()> {
    let mut cfg = config::load_cfg(&args.config);
    cfg.apply_overrides(args.monitor, args.validation);

    let mut window = Window::new(&cfg.window_config()).context("creating window")?;
    if let Some(monitor) = cfg.window.monitor {
        window.try_move_to_monitor(monitor);
    }

    // Declared after the window so it is dropped first.
    let mut renderer = VkRenderer::new(&window, &cfg.renderer_options())
        .context("initializing Vulkan renderer")?;
    info!(
        "rendering on {} (validation {})",
        renderer.device_name(),
        if renderer.validation_enabled() { "on" } else { "off" }
    );

    let drawn = frame_loop(
        || {
            window.poll_events();
            window.should_close()
        },
        || renderer.draw_frame().context("drawing frame"),
    )?;
    debug!("{drawn} frame(s) drawn");

    renderer.wait_idle().context("waiting for the GPU to finish")?;
    info!("{} frame(s) presented", renderer.frames_presented());
    Ok(())
}

/// Pumps events, then draws, until `pump` reports a close request. A close seen by the
/// pump ends the loop before another frame is drawn.
fn frame_loop(
    mut pump: impl FnMut() -> bool,
    mut draw: impl FnMut() -> Result<()>,
) -> Result<u64> {
    let mut drawn = 0;
    while !pump() {
        draw()?;
        drawn += 1;
    }
    Ok(drawn)
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
