//! Built-in 8x8 bitmap font

use font8x8::legacy::BASIC_LEGACY;

use super::{GlyphRenderer, PixelBuffer};

pub const GLYPH_WIDTH: i32 = 8;
pub const GLYPH_HEIGHT: i32 = 8;

#[derive(Debug, Default, Clone, Copy)]
pub struct Font8x8;

impl GlyphRenderer for Font8x8 {
    fn glyph_size(&self) -> (i32, i32) {
        (GLYPH_WIDTH, GLYPH_HEIGHT)
    }

    fn draw_glyph(&self, buf: &mut PixelBuffer<'_>, x: i32, y: i32, ch: char, color: u32) {
        let code = if ch.is_ascii() { ch as usize } else { b'?' as usize };
        let glyph = BASIC_LEGACY[code];
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                // bit 0 is the leftmost pixel
                if bits & (1 << col) != 0 {
                    buf.put_pixel(x + col, y + row as i32, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_visible_pixels_for_letters_only() {
        let mut pixels = vec![0u32; 16 * 8];
        let mut buf = PixelBuffer::new(&mut pixels, 16, 8);
        Font8x8.draw_string(&mut buf, 0, 0, "A ", 0xFFFFFF);
        drop(buf);
        assert!(pixels.chunks(16).any(|row| row[..8].contains(&0xFFFFFF)));
        assert!(pixels.chunks(16).all(|row| !row[8..].contains(&0xFFFFFF)));
    }

    #[test]
    fn measure_counts_chars() {
        assert_eq!(Font8x8.measure("abc"), (24, 8));
    }
}
