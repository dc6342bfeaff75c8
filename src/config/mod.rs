//! Configuration management for cdp-compositor

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Display configuration
    #[serde(default)]
    pub display: DisplayConfig,

    /// Protocol server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Input device configuration
    #[serde(default)]
    pub input: InputConfig,

    /// Table capacities and window chrome metrics
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Screen width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Screen height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Optional raw XRGB8888 wallpaper, exactly width*height*4 bytes
    #[serde(default)]
    pub wallpaper: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Rendezvous socket path (ignored under LISTEN_FDS activation)
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Spawn the built-in local demo windows at startup
    #[serde(default = "default_demo_windows")]
    pub demo_windows: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Keyboard,
    PointerRelative,
    PointerAbsolute,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Keyboard => "keyboard",
            DeviceKind::PointerRelative => "pointer-relative",
            DeviceKind::PointerAbsolute => "pointer-absolute",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDeviceConfig {
    /// evdev node, e.g. /dev/input/event0
    pub path: PathBuf,

    /// How events from this device are interpreted
    pub kind: DeviceKind,

    /// Largest ABS_X value reported by an absolute pointer
    #[serde(default = "default_abs_max")]
    pub abs_max_x: i32,

    /// Largest ABS_Y value reported by an absolute pointer
    #[serde(default = "default_abs_max")]
    pub abs_max_y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    /// Input devices to open at startup
    #[serde(default)]
    pub devices: Vec<InputDeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of windows, local and client-backed
    #[serde(default = "default_max_windows")]
    pub max_windows: usize,

    /// Maximum number of opened input devices
    #[serde(default = "default_max_input_sources")]
    pub max_input_sources: usize,

    /// Maximum concurrent protocol connections
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Maximum live surfaces across all clients
    #[serde(default = "default_max_surfaces")]
    pub max_surfaces: usize,

    /// Titlebar height in pixels
    #[serde(default = "default_titlebar_height")]
    pub titlebar_height: i32,

    /// Width of each titlebar control button
    #[serde(default = "default_control_button_width")]
    pub control_button_width: i32,

    /// Thickness of the right/bottom resize edges
    #[serde(default = "default_resize_edge_thickness")]
    pub resize_edge_thickness: i32,

    /// Size of the bottom-right resize corner
    #[serde(default = "default_resize_corner")]
    pub resize_corner: i32,

    /// Minimum window width during interactive resize
    #[serde(default = "default_min_window_width")]
    pub min_window_width: i32,

    /// Minimum window height (titlebar included) during interactive resize
    #[serde(default = "default_min_window_height")]
    pub min_window_height: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter, env_logger syntax
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_width() -> u32 {
    1024
}

fn default_height() -> u32 {
    768
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/cdp-display-0")
}

fn default_demo_windows() -> bool {
    true
}

fn default_abs_max() -> i32 {
    32767
}

fn default_max_windows() -> usize {
    8
}

fn default_max_input_sources() -> usize {
    4
}

fn default_max_clients() -> usize {
    4
}

fn default_max_surfaces() -> usize {
    4
}

fn default_titlebar_height() -> i32 {
    24
}

fn default_control_button_width() -> i32 {
    20
}

fn default_resize_edge_thickness() -> i32 {
    4
}

fn default_resize_corner() -> i32 {
    8
}

fn default_min_window_width() -> i32 {
    100
}

fn default_min_window_height() -> i32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            wallpaper: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            demo_windows: default_demo_windows(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_windows: default_max_windows(),
            max_input_sources: default_max_input_sources(),
            max_clients: default_max_clients(),
            max_surfaces: default_max_surfaces(),
            titlebar_height: default_titlebar_height(),
            control_button_width: default_control_button_width(),
            resize_edge_thickness: default_resize_edge_thickness(),
            resize_corner: default_resize_corner(),
            min_window_width: default_min_window_width(),
            min_window_height: default_min_window_height(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err("Display dimensions must be non-zero".into());
        }
        if self.display.width > i32::MAX as u32 || self.display.height > i32::MAX as u32 {
            return Err("Display dimensions are out of range".into());
        }

        let limits = &self.limits;
        if limits.max_windows == 0 || limits.max_clients == 0 || limits.max_surfaces == 0 {
            return Err("Window, client and surface limits must be non-zero".into());
        }
        if limits.titlebar_height <= 0 || limits.control_button_width <= 0 {
            return Err("Titlebar metrics must be positive".into());
        }
        if limits.resize_edge_thickness <= 0 || limits.resize_corner < limits.resize_edge_thickness {
            return Err("Resize corner must be at least as large as the resize edge".into());
        }
        if limits.min_window_width < 3 * limits.control_button_width {
            return Err("Minimum window width must fit the three control buttons".into());
        }
        if limits.min_window_height <= limits.titlebar_height {
            return Err("Minimum window height must exceed the titlebar height".into());
        }

        if self.input.devices.len() > limits.max_input_sources {
            return Err(format!(
                "{} input devices configured, limit is {}",
                self.input.devices.len(),
                limits.max_input_sources
            )
            .into());
        }
        for device in &self.input.devices {
            if device.kind == DeviceKind::PointerAbsolute
                && (device.abs_max_x <= 0 || device.abs_max_y <= 0)
            {
                return Err(format!("Absolute pointer {:?} needs positive axis ranges", device.path).into());
            }
        }

        Ok(())
    }
}
