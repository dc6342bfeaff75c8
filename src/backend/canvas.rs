//! Software drawing primitives over a 32-bit XRGB pixel buffer

use crate::compositor::geometry::Rect;

pub const fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Halve every channel; used for unfocused titlebars
pub fn dim(color: u32) -> u32 {
    (color >> 1) & 0x007F_7F7F
}

/// Source-over blend of straight-alpha ARGB `src` onto `dst`
pub fn blend(src: u32, dst: u32) -> u32 {
    let sa = src >> 24;
    if sa == 255 {
        return src & 0x00FF_FFFF;
    }
    if sa == 0 {
        return dst;
    }
    let channel = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        ((s * sa + d * (255 - sa)) / 255) << shift
    };
    channel(16) | channel(8) | channel(0)
}

/// Mutable view of a row-major pixel buffer
pub struct PixelBuffer<'a> {
    pixels: &'a mut [u32],
    width: u32,
    height: u32,
}

impl<'a> PixelBuffer<'a> {
    pub fn new(pixels: &'a mut [u32], width: u32, height: u32) -> Self {
        debug_assert!(pixels.len() >= (width * height) as usize);
        Self { pixels, width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.offset(x, y).map(|i| self.pixels[i])
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, color: u32) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i] = color;
        }
    }

    pub fn blend_pixel(&mut self, x: i32, y: i32, argb: u32) {
        if let Some(i) = self.offset(x, y) {
            self.pixels[i] = blend(argb, self.pixels[i]);
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, color: u32) {
        let Some(r) = rect.intersection(&self.bounds()) else {
            return;
        };
        let stride = self.width as usize;
        for y in r.y..r.bottom() {
            let start = y as usize * stride + r.x as usize;
            self.pixels[start..start + r.w as usize].fill(color);
        }
    }

    pub fn blend_rect(&mut self, rect: Rect, argb: u32) {
        let Some(r) = rect.intersection(&self.bounds()) else {
            return;
        };
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                self.blend_pixel(x, y, argb);
            }
        }
    }

    /// Copy a whole frame in, e.g. a cached background
    pub fn copy_from(&mut self, src: &[u32]) {
        let n = self.pixels.len().min(src.len());
        self.pixels[..n].copy_from_slice(&src[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_extremes() {
        assert_eq!(blend(0xFF11_2233, 0x00AA_BBCC), 0x0011_2233);
        assert_eq!(blend(0x0011_2233, 0x00AA_BBCC), 0x00AA_BBCC);
    }

    #[test]
    fn blend_half_alpha_averages() {
        let out = blend(0x80FF_0000, 0x0000_0000);
        assert_eq!((out >> 16) & 0xFF, 0x80);
        assert_eq!(out & 0xFFFF, 0);
    }

    #[test]
    fn fill_rect_clips_to_buffer() {
        let mut pixels = vec![0u32; 16];
        let mut buf = PixelBuffer::new(&mut pixels, 4, 4);
        buf.fill_rect(Rect::new(2, 2, 10, 10), 7);
        assert_eq!(buf.pixel(3, 3), Some(7));
        assert_eq!(buf.pixel(1, 1), Some(0));
        assert_eq!(buf.pixel(4, 4), None);
    }

    #[test]
    fn dim_halves_channels() {
        assert_eq!(dim(rgb(200, 100, 50)), rgb(100, 50, 25));
    }
}
