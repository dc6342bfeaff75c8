//! cdp-compositor - minimal software display compositor
//!
//! Clients connect over a Unix socket, share pixel buffers through
//! passed file descriptors and receive input for the window they own.

pub mod backend;
pub mod compositor;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod protocol;
pub mod server;

// Re-exports
pub use compositor::{Compositor, HeadlessBackend, Renderer};
pub use config::Config;
pub use error::CompositorError;
pub use protocol::{Event, Request};
