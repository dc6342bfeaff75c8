//! cdp-compositor - Main entry point
//!
//! Brings up the headless framebuffer, input devices and the CDP socket,
//! then hands everything to the event loop.

mod args;

use args::Args;
use cdp_compositor::backend::{EvdevDevice, Font8x8, InputSource};
use cdp_compositor::compositor::render::load_wallpaper;
use cdp_compositor::compositor::{Compositor, HeadlessBackend, Renderer};
use cdp_compositor::config::Config;
use cdp_compositor::event_loop;
use cdp_compositor::server::Listener;
use clap::Parser;
use log::{error, info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();
    let loaded = args.load_config();

    let log_level = if args.verbose {
        "debug".to_string()
    } else {
        loaded
            .as_ref()
            .map(|cfg| cfg.logging.level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    env_logger::Builder::new()
        .parse_filters(&std::env::var("CDP_LOG").unwrap_or(log_level))
        .init();

    info!("cdp-compositor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match loaded {
        Ok(cfg) => {
            info!("Loaded configuration from {:?}", args.config);
            cfg
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            let mut cfg = Config::default();
            args.apply_overrides(&mut cfg);
            cfg
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e);
    }

    let (width, height) = (config.display.width, config.display.height);
    let backend = HeadlessBackend::allocate(width, height)?;

    let mut renderer = Renderer::new(Box::new(Font8x8));
    if let Some(ref path) = config.display.wallpaper {
        match load_wallpaper(path, width, height) {
            Ok(pixels) => {
                info!("Loaded wallpaper {:?}", path);
                renderer.set_wallpaper(pixels);
            }
            Err(e) => warn!("Failed to load wallpaper: {}, using gradient", e),
        }
    }

    let mut inputs: Vec<Box<dyn InputSource>> = Vec::with_capacity(config.input.devices.len());
    for device in &config.input.devices {
        match EvdevDevice::open(device) {
            Ok(dev) => inputs.push(Box::new(dev)),
            Err(e) => {
                error!("Failed to open input device: {}", e);
                return Err(e.into());
            }
        }
    }
    if inputs.is_empty() {
        info!("No input devices configured; running without local input");
    }

    let mut state = Compositor::new(&config);
    if config.server.demo_windows {
        state.spawn_demo_windows();
    }

    let listener = match Listener::open(&config.server.socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to open socket {:?}: {}", config.server.socket_path, e);
            return Err(e.into());
        }
    };

    event_loop::run(state, renderer, Box::new(backend), listener, inputs)?;
    info!("cdp-compositor exited cleanly");
    Ok(())
}
