//! Headless backend that renders into in-memory buffers
//!
//! Stands in for a mode-setting framebuffer: two XRGB8888 buffers, one
//! composed into while the other is "on screen". The front buffer is
//! readable so tests and tools can inspect presented frames.

use log::info;

use crate::backend::{DisplayBackend, PixelBuffer};
use crate::error::CompositorError;

pub struct HeadlessBackend {
    buffers: [Vec<u32>; 2],
    front: usize,
    width: u32,
    height: u32,
    frames_presented: u64,
}

impl HeadlessBackend {
    /// Allocate a double buffer with the given dimensions
    pub fn allocate(width: u32, height: u32) -> Result<Self, CompositorError> {
        if width == 0 || height == 0 {
            return Err(CompositorError::DeviceUnavailable(format!(
                "cannot allocate {}x{} framebuffer",
                width, height
            )));
        }
        let len = width as usize * height as usize;
        info!("Headless backend created: {}x{} (double buffered)", width, height);
        Ok(Self {
            buffers: [vec![0; len], vec![0; len]],
            front: 0,
            width,
            height,
            frames_presented: 0,
        })
    }

    /// Pixels of the most recently presented frame
    pub fn front(&self) -> &[u32] {
        &self.buffers[self.front]
    }

    pub fn front_pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.front()[y as usize * self.width as usize + x as usize])
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl DisplayBackend for HeadlessBackend {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn back_buffer(&mut self) -> PixelBuffer<'_> {
        let back = 1 - self.front;
        PixelBuffer::new(&mut self.buffers[back], self.width, self.height)
    }

    fn swap(&mut self) -> Result<(), CompositorError> {
        self.front = 1 - self.front;
        self.frames_presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_presents_back_buffer() {
        let mut backend = HeadlessBackend::allocate(4, 4).unwrap();
        backend.back_buffer().put_pixel(1, 1, 0xABCDEF);
        assert_eq!(backend.front_pixel(1, 1), Some(0));
        backend.swap().unwrap();
        assert_eq!(backend.front_pixel(1, 1), Some(0xABCDEF));
        assert_eq!(backend.frames_presented(), 1);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(
            HeadlessBackend::allocate(0, 10),
            Err(CompositorError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn front_pixel_indexes_last_row_and_rejects_outside() {
        let mut backend = HeadlessBackend::allocate(300, 200).unwrap();
        backend.back_buffer().put_pixel(299, 199, 0x123456);
        backend.swap().unwrap();
        assert_eq!(backend.front_pixel(299, 199), Some(0x123456));
        assert_eq!(backend.front_pixel(300, 0), None);
        assert_eq!(backend.front_pixel(0, u32::MAX), None);
    }
}
