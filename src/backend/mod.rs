//! Collaborator interfaces: framebuffer driver, glyph renderer, input sources

pub mod canvas;
pub mod evdev;
pub mod font;

use std::io;
use std::os::fd::AsFd;

use crate::error::CompositorError;

pub use canvas::PixelBuffer;
pub use evdev::EvdevDevice;
pub use font::Font8x8;

/// Double-buffered display output
pub trait DisplayBackend {
    fn size(&self) -> (u32, u32);

    /// Buffer the next frame is composed into
    fn back_buffer(&mut self) -> PixelBuffer<'_>;

    /// Present the back buffer
    fn swap(&mut self) -> Result<(), CompositorError>;
}

pub trait GlyphRenderer {
    /// Cell size of one glyph
    fn glyph_size(&self) -> (i32, i32);

    fn draw_glyph(&self, buf: &mut PixelBuffer<'_>, x: i32, y: i32, ch: char, color: u32);

    fn draw_string(&self, buf: &mut PixelBuffer<'_>, x: i32, y: i32, text: &str, color: u32) {
        let (w, _) = self.glyph_size();
        for (i, ch) in text.chars().enumerate() {
            self.draw_glyph(buf, x + i as i32 * w, y, ch, color);
        }
    }

    fn measure(&self, text: &str) -> (i32, i32) {
        let (w, h) = self.glyph_size();
        (text.chars().count() as i32 * w, h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Released,
    Pressed,
    Repeat,
}

impl KeyState {
    pub fn from_value(value: i32) -> Self {
        match value {
            0 => KeyState::Released,
            2 => KeyState::Repeat,
            _ => KeyState::Pressed,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            KeyState::Released => 0,
            KeyState::Pressed => 1,
            KeyState::Repeat => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerRelative { dx: i32, dy: i32 },
    PointerAbsolute { x: i32, y: i32, max_x: i32, max_y: i32 },
    Button { code: u16, pressed: bool },
    Key { code: u16, state: KeyState },
}

/// A readable device that yields abstract input events
pub trait InputSource: AsFd {
    fn name(&self) -> &str;

    /// Drain pending events without blocking
    fn read_events(&mut self, out: &mut Vec<InputEvent>) -> io::Result<()>;
}
