use clap::Parser;
use std::path::PathBuf;

use cdp_compositor::config;

#[derive(Parser, Debug)]
#[command(name = "cdp-compositor")]
#[command(author = "CDP Team")]
#[command(version)]
#[command(about = "Minimal software display compositor speaking the CDP protocol", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/cdp-compositor.toml")]
    pub config: PathBuf,

    /// Display width (overrides config)
    #[arg(long)]
    pub width: Option<u32>,

    /// Display height (overrides config)
    #[arg(long)]
    pub height: Option<u32>,

    /// Listening socket path (overrides config)
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        let mut config = config::Config::load(&self.config)?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// Command line values win over the config file
    pub fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(width) = self.width {
            config.display.width = width;
        }
        if let Some(height) = self.height {
            config.display.height = height;
        }
        if let Some(ref socket) = self.socket {
            config.server.socket_path = socket.clone();
        }
    }
}
