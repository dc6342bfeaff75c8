//! Frame composition
//!
//! Painter's algorithm over the window stack. The layer plan is computed
//! separately from drawing so the ordering rules can be checked without
//! touching pixels.

use std::fs;
use std::path::Path;

use log::{debug, info};

use super::geometry::{Point, Rect};
use super::state::Compositor;
use super::window::{ControlButton, Window, WindowId, WindowRegistry};
use crate::backend::canvas::{dim, rgb};
use crate::backend::{DisplayBackend, GlyphRenderer, PixelBuffer};
use crate::error::CompositorError;
use crate::protocol::PixelFormat;
use crate::server::ShmBuffer;

const SHADOW_OFFSET: i32 = 4;
const SHADOW_COLOR: u32 = 0x4000_0000;
const BORDER_WIDTH: i32 = 2;
const BORDER_FOCUSED: u32 = rgb(100, 150, 255);
const BORDER_UNFOCUSED: u32 = rgb(60, 60, 80);
const BUTTON_CLOSE: u32 = rgb(200, 60, 60);
const BUTTON_OTHER: u32 = rgb(80, 80, 100);
const CLIENT_BACKGROUND: u32 = rgb(25, 25, 35);
const PANEL_BACKGROUND: u32 = rgb(40, 40, 50);
const TEXT_COLOR: u32 = rgb(230, 230, 230);
const STATUS_BAR_HEIGHT: i32 = 20;
const STATUS_BAR_COLOR: u32 = rgb(15, 15, 25);
const TITLE_INSET: i32 = 6;
const TEXT_PADDING: i32 = 4;
const LINE_GAP: i32 = 2;

const CURSOR_ROWS: i32 = 12;
const CURSOR_FILL: u32 = rgb(255, 255, 255);
const CURSOR_OUTLINE: u32 = rgb(0, 0, 0);

/// One step of the paint plan, back to front
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Background,
    Window(WindowId),
    Panel(WindowId),
    Cursor,
}

/// Visible windows bottom-up, then panels, with the cursor always last
pub fn paint_order(windows: &WindowRegistry) -> Vec<Layer> {
    let mut plan = vec![Layer::Background];
    plan.extend(
        windows
            .stacked()
            .filter(|(_, w)| w.visible)
            .map(|(id, _)| Layer::Window(id)),
    );
    plan.extend(
        windows
            .panels()
            .filter(|(_, w)| w.visible)
            .map(|(id, _)| Layer::Panel(id)),
    );
    plan.push(Layer::Cursor);
    plan
}

/// Read a raw little-endian XRGB8888 image of exactly `width`x`height`
pub fn load_wallpaper(path: &Path, width: u32, height: u32) -> Result<Vec<u32>, CompositorError> {
    let bytes = fs::read(path)?;
    let expected = width as usize * height as usize * 4;
    if bytes.len() < expected {
        return Err(CompositorError::ResourceUnavailable(format!(
            "wallpaper {:?} has {} bytes, {}x{} needs {}",
            path,
            bytes.len(),
            width,
            height,
            expected
        )));
    }
    Ok(bytes[..expected]
        .chunks_exact(4)
        .map(|px| u32::from_le_bytes([px[0], px[1], px[2], px[3]]) & 0x00FF_FFFF)
        .collect())
}

fn gradient(width: u32, height: u32) -> Vec<u32> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    let h = height.max(1);
    for y in 0..height {
        let t = y * 255 / h;
        let row = rgb((20 + t * 30 / 255) as u8, (30 + t * 40 / 255) as u8, (60 + t * 60 / 255) as u8);
        pixels.extend(std::iter::repeat(row).take(width as usize));
    }
    pixels
}

pub struct Renderer {
    font: Box<dyn GlyphRenderer>,
    wallpaper: Option<Vec<u32>>,
    /// Background for the current output size, rebuilt on size change
    background: Vec<u32>,
    background_size: (u32, u32),
}

impl Renderer {
    pub fn new(font: Box<dyn GlyphRenderer>) -> Self {
        Self {
            font,
            wallpaper: None,
            background: Vec::new(),
            background_size: (0, 0),
        }
    }

    pub fn set_wallpaper(&mut self, pixels: Vec<u32>) {
        self.wallpaper = Some(pixels);
        self.background_size = (0, 0);
    }

    /// Compose and present one frame if anything is damaged.
    ///
    /// Returns whether a frame was presented.
    pub fn render(&mut self, state: &mut Compositor, backend: &mut dyn DisplayBackend) -> Result<bool, CompositorError> {
        if !state.needs_redraw || !state.damage.has_any() {
            return Ok(false);
        }

        let (width, height) = backend.size();
        self.prepare_background(width, height);
        {
            let mut buf = backend.back_buffer();
            for layer in paint_order(&state.windows) {
                match layer {
                    Layer::Background => self.draw_background(&mut buf, state),
                    Layer::Window(id) => self.draw_window(&mut buf, state, id),
                    Layer::Panel(id) => self.draw_panel(&mut buf, state, id),
                    Layer::Cursor => draw_cursor(&mut buf, state.input.pointer),
                }
            }
        }
        backend.swap()?;

        state.send_frame_callbacks();
        state.damage.reset();
        state.needs_redraw = false;
        Ok(true)
    }

    fn prepare_background(&mut self, width: u32, height: u32) {
        if self.background_size == (width, height) {
            return;
        }
        let len = width as usize * height as usize;
        self.background = match &self.wallpaper {
            Some(pixels) if pixels.len() == len => pixels.clone(),
            Some(_) => {
                info!("Wallpaper does not match {}x{}, using gradient", width, height);
                gradient(width, height)
            }
            None => gradient(width, height),
        };
        self.background_size = (width, height);
        debug!("Background rebuilt for {}x{}", width, height);
    }

    fn draw_background(&self, buf: &mut PixelBuffer<'_>, state: &Compositor) {
        buf.copy_from(&self.background);
        let bar = Rect::new(0, 0, buf.width() as i32, STATUS_BAR_HEIGHT);
        buf.fill_rect(bar, STATUS_BAR_COLOR);

        let open = state.windows.stacked().filter(|(_, w)| w.visible).count();
        let status = format!("CDP Compositor | {} windows | {} clients", open, state.clients.len());
        let (_, glyph_h) = self.font.glyph_size();
        self.font
            .draw_string(buf, TEXT_PADDING, (STATUS_BAR_HEIGHT - glyph_h) / 2, &status, TEXT_COLOR);
    }

    fn draw_window(&self, buf: &mut PixelBuffer<'_>, state: &Compositor, id: WindowId) {
        let Some(window) = state.windows.get(id) else {
            return;
        };
        let m = &state.metrics;
        let focused = state.focus == Some(id);
        let g = window.geometry;

        buf.blend_rect(g.translate(SHADOW_OFFSET, SHADOW_OFFSET), SHADOW_COLOR);
        buf.fill_rect(
            g.inflate(BORDER_WIDTH),
            if focused { BORDER_FOCUSED } else { BORDER_UNFOCUSED },
        );

        let titlebar_color = if focused { window.color } else { dim(window.color) };
        buf.fill_rect(window.titlebar(m), titlebar_color);
        self.font
            .draw_string(buf, g.x + TITLE_INSET, g.y + TITLE_INSET, &window.title, TEXT_COLOR);

        for (button, label) in [
            (ControlButton::Minimize, '_'),
            (ControlButton::Maximize, if window.maximized { 'o' } else { '+' }),
            (ControlButton::Close, 'x'),
        ] {
            let rect = window.control_rect(button, m);
            let color = if button == ControlButton::Close { BUTTON_CLOSE } else { BUTTON_OTHER };
            buf.fill_rect(rect, color);
            let (gw, gh) = self.font.glyph_size();
            self.font
                .draw_glyph(buf, rect.x + (rect.w - gw) / 2, rect.y + (rect.h - gh) / 2, label, TEXT_COLOR);
        }

        let area = window.client_area(m);
        buf.fill_rect(area, CLIENT_BACKGROUND);
        match renderable_buffer(state, window) {
            Some(buffer) => blit(buf, area, buffer),
            None if window.surface.is_none() => self.draw_text(buf, area, &window.text, focused),
            None => {}
        }
    }

    fn draw_panel(&self, buf: &mut PixelBuffer<'_>, state: &Compositor, id: WindowId) {
        let Some(window) = state.windows.get(id) else {
            return;
        };
        buf.fill_rect(window.geometry, PANEL_BACKGROUND);
        if let Some(buffer) = renderable_buffer(state, window) {
            blit(buf, window.geometry, buffer);
        }
    }

    /// Wrapped local text, clipped to the client area
    fn draw_text(&self, buf: &mut PixelBuffer<'_>, area: Rect, text: &str, focused: bool) {
        let (gw, gh) = self.font.glyph_size();
        let columns = ((area.w - 2 * TEXT_PADDING) / gw).max(1) as usize;
        let line_height = gh + LINE_GAP;

        let chars: Vec<char> = text.chars().collect();
        let mut x = area.x + TEXT_PADDING;
        let mut y = area.y + TEXT_PADDING;
        for (i, line) in chars.chunks(columns).enumerate() {
            y = area.y + TEXT_PADDING + i as i32 * line_height;
            if y + gh > area.bottom() {
                return;
            }
            let line: String = line.iter().collect();
            self.font.draw_string(buf, area.x + TEXT_PADDING, y, &line, TEXT_COLOR);
            x = area.x + TEXT_PADDING + line.chars().count() as i32 * gw;
        }

        if focused {
            if x + 2 > area.right() - TEXT_PADDING {
                x = area.x + TEXT_PADDING;
                y += line_height;
            }
            if y + gh <= area.bottom() {
                buf.fill_rect(Rect::new(x, y, 2, gh), TEXT_COLOR);
            }
        }
    }
}

fn renderable_buffer<'s>(state: &'s Compositor, window: &Window) -> Option<&'s ShmBuffer> {
    let surface = state.surfaces.get(window.surface?)?;
    if !surface.is_renderable() {
        return None;
    }
    surface.buffer.as_ref()
}

/// Copy or blend a client buffer into `area`, clipped to both
fn blit(buf: &mut PixelBuffer<'_>, area: Rect, buffer: &ShmBuffer) {
    let src = Rect::new(area.x, area.y, buffer.width() as i32, buffer.height() as i32);
    let Some(clip) = src
        .intersection(&area)
        .and_then(|r| r.intersection(&buf.bounds()))
    else {
        return;
    };
    let alpha = buffer.format() == PixelFormat::Argb8888;
    for y in clip.y..clip.bottom() {
        for x in clip.x..clip.right() {
            let px = buffer.pixel((x - area.x) as u32, (y - area.y) as u32);
            if alpha {
                buf.blend_pixel(x, y, px);
            } else {
                buf.put_pixel(x, y, px & 0x00FF_FFFF);
            }
        }
    }
}

/// Outlined arrow with its hotspot at the top-left
fn draw_cursor(buf: &mut PixelBuffer<'_>, at: Point) {
    for row in 0..CURSOR_ROWS {
        let width = (row + 1).min(CURSOR_ROWS * 2 / 3);
        for col in 0..width {
            let edge = col == 0 || col == width - 1 || row == CURSOR_ROWS - 1;
            buf.put_pixel(at.x + col, at.y + row, if edge { CURSOR_OUTLINE } else { CURSOR_FILL });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::fd::OwnedFd;

    use super::*;
    use crate::backend::Font8x8;
    use crate::compositor::window::PanelEdge;
    use crate::compositor::HeadlessBackend;
    use crate::config::Config;
    use crate::protocol::{Event, Request};
    use crate::server::testing::{connect, create_surface, drain_events, send};

    fn setup() -> (Compositor, Renderer, HeadlessBackend) {
        let state = Compositor::new(&Config::default());
        let backend = HeadlessBackend::allocate(1024, 768).unwrap();
        (state, Renderer::new(Box::new(Font8x8)), backend)
    }

    fn shm(pixels: &[u32]) -> OwnedFd {
        let mut file = tempfile::tempfile().unwrap();
        for px in pixels {
            file.write_all(&px.to_ne_bytes()).unwrap();
        }
        OwnedFd::from(file)
    }

    #[test]
    fn panels_paint_after_windows_and_cursor_last() {
        let screen = Rect::new(0, 0, 800, 600);
        let mut windows = WindowRegistry::new(8);
        let a = windows.create(Rect::new(0, 0, 100, 100), "a", 0).unwrap();
        let panel = windows.create(Rect::new(0, 0, 1, 1), "panel", 0).unwrap();
        windows.make_panel(panel, screen, PanelEdge::Bottom, 30);
        let b = windows.create(Rect::new(10, 10, 100, 100), "b", 0).unwrap();
        let hidden = windows.create(Rect::new(20, 20, 100, 100), "hidden", 0).unwrap();
        windows.hide(hidden);
        windows.focus_and_raise(a);

        assert_eq!(
            paint_order(&windows),
            vec![Layer::Background, Layer::Window(b), Layer::Window(a), Layer::Panel(panel), Layer::Cursor]
        );
    }

    #[test]
    fn nothing_is_drawn_without_damage() {
        let (mut state, mut renderer, mut backend) = setup();
        assert!(renderer.render(&mut state, &mut backend).unwrap());
        assert!(!state.damage.has_any());
        assert!(!state.needs_redraw);
        assert!(!renderer.render(&mut state, &mut backend).unwrap());

        state.needs_redraw = true;
        assert!(!renderer.render(&mut state, &mut backend).unwrap());
        assert_eq!(backend.frames_presented(), 1);
    }

    #[test]
    fn committed_buffer_appears_pixel_for_pixel() {
        let (mut state, mut renderer, mut backend) = setup();
        let (client, mut peer) = connect(&mut state);
        let surface = create_surface(&mut state, client, &mut peer, 10, 100, 4, 3);

        let pixels: Vec<u32> = (0..12).map(|i| 0x0010_2030 + i * 0x0001_0101).collect();
        let attach = Request::AttachBuffer { surface, width: 4, height: 3, stride: 16, format: 0 };
        send(&mut state, client, attach, Some(shm(&pixels)));
        send(&mut state, client, Request::Commit { surface }, None);
        assert!(renderer.render(&mut state, &mut backend).unwrap());

        let area_y = 100 + state.metrics.titlebar_height as u32;
        for y in 0..3u32 {
            for x in 0..4u32 {
                assert_eq!(backend.front_pixel(10 + x, area_y + y), Some(pixels[(y * 4 + x) as usize]));
            }
        }
    }

    #[test]
    fn uncommitted_buffer_is_not_shown() {
        let (mut state, mut renderer, mut backend) = setup();
        let (client, mut peer) = connect(&mut state);
        let surface = create_surface(&mut state, client, &mut peer, 10, 100, 2, 2);
        let attach = Request::AttachBuffer { surface, width: 2, height: 2, stride: 8, format: 0 };
        send(&mut state, client, attach, Some(shm(&[0x00FF_0000; 4])));
        renderer.render(&mut state, &mut backend).unwrap();

        let area_y = 100 + state.metrics.titlebar_height as u32;
        assert_eq!(backend.front_pixel(10, area_y), Some(CLIENT_BACKGROUND));
    }

    #[test]
    fn transparent_argb_pixels_show_what_is_beneath() {
        let (mut state, mut renderer, mut backend) = setup();
        let (client, mut peer) = connect(&mut state);
        let surface = create_surface(&mut state, client, &mut peer, 10, 100, 2, 1);
        let attach = Request::AttachBuffer { surface, width: 2, height: 1, stride: 8, format: 1 };
        send(&mut state, client, attach, Some(shm(&[0x00FF_FFFF, 0xFF00_FF00])));
        send(&mut state, client, Request::Commit { surface }, None);
        renderer.render(&mut state, &mut backend).unwrap();

        let area_y = 100 + state.metrics.titlebar_height as u32;
        assert_eq!(backend.front_pixel(10, area_y), Some(CLIENT_BACKGROUND));
        assert_eq!(backend.front_pixel(11, area_y), Some(0x0000_FF00));
    }

    #[test]
    fn frame_done_is_sent_once_after_presentation() {
        let (mut state, mut renderer, mut backend) = setup();
        let (client, mut peer) = connect(&mut state);
        let surface = create_surface(&mut state, client, &mut peer, 100, 100, 100, 100);
        assert_eq!(surface, 1);

        let attach = Request::AttachBuffer { surface, width: 100, height: 100, stride: 400, format: 0 };
        send(&mut state, client, attach, Some(shm(&vec![0; 100 * 100])));
        send(&mut state, client, Request::Commit { surface }, None);
        send(&mut state, client, Request::Frame { surface }, None);
        assert!(drain_events(&mut peer).is_empty());

        renderer.render(&mut state, &mut backend).unwrap();
        let frames: Vec<_> = drain_events(&mut peer)
            .into_iter()
            .filter(|e| matches!(e, Event::FrameDone { .. }))
            .collect();
        assert_eq!(frames, vec![Event::FrameDone { surface: 1 }]);

        let sid = state.surfaces.lookup_any(1).unwrap();
        assert!(!state.surfaces.get(sid).unwrap().frame_requested);
        state.add_full_damage();
        renderer.render(&mut state, &mut backend).unwrap();
        assert!(drain_events(&mut peer).is_empty());
    }

    #[test]
    fn focused_titlebar_is_brighter() {
        let (mut state, mut renderer, mut backend) = setup();
        let color = rgb(200, 100, 50);
        let a = state.create_window(Rect::new(10, 100, 200, 100), "a", color).unwrap();
        let b = state.create_window(Rect::new(400, 100, 200, 100), "b", color).unwrap();
        state.focus_and_raise(a);
        renderer.render(&mut state, &mut backend).unwrap();

        assert_eq!(backend.front_pixel(12, 102), Some(color));
        assert_eq!(backend.front_pixel(402, 102), Some(dim(color)));
        assert!(state.windows.contains(b));
    }

    #[test]
    fn wallpaper_must_cover_the_screen() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x11, 0x22, 0x33, 0xFF].repeat(4)).unwrap();
        assert_eq!(load_wallpaper(file.path(), 2, 2).unwrap(), vec![0x0033_2211; 4]);
        assert!(matches!(
            load_wallpaper(file.path(), 4, 4),
            Err(CompositorError::ResourceUnavailable(_))
        ));
    }
}
