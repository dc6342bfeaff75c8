//! CDP display protocol: message codec and descriptor passing

pub mod fd;
pub mod wire;

pub use wire::{Event, Frame, FrameDecoder, PixelFormat, Request, WindowEntry, WireError};
