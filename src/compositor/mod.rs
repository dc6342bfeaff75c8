//! Window management core
//!
//! Window registry, damage tracking, input routing and frame composition
//! over a headless double-buffered framebuffer.

pub mod arena;
pub mod clipboard;
pub mod damage;
pub mod geometry;
pub mod grabs;
pub mod headless;
pub mod input;
pub mod keymap;
pub mod render;
pub mod state;
pub mod window;

pub use headless::HeadlessBackend;
pub use render::Renderer;
pub use state::Compositor;
