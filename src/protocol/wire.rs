//! CDP message framing and payload codecs
//!
//! Every message is an 8-byte little-endian header `{type, payload_size}`
//! followed by `payload_size` bytes. Payloads are fixed little-endian
//! structs, except the clipboard and window-list messages which carry a
//! length-prefixed tail.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

pub const HEADER_LEN: usize = 8;

/// Largest payload a peer may declare
pub const MAX_PAYLOAD: usize = 4096;

pub const PROTOCOL_VERSION: u32 = 1;

/// Fixed title field in SetTitle, NUL-terminated
pub const TITLE_LEN: usize = 60;

/// Title field of a WindowList entry
pub const LIST_TITLE_LEN: usize = 32;

pub const MAX_LIST_ENTRIES: usize = 16;

/// Largest clipboard text carried in one message
pub const CLIPBOARD_MAX: usize = 4000;

pub const MOD_SHIFT: u32 = 1 << 0;
pub const MOD_CTRL: u32 = 1 << 1;

pub mod request {
    pub const CREATE_SURFACE: u32 = 1;
    pub const DESTROY_SURFACE: u32 = 2;
    pub const ATTACH_BUFFER: u32 = 3;
    pub const COMMIT: u32 = 4;
    pub const FRAME: u32 = 5;
    pub const SET_TITLE: u32 = 6;
    pub const SET_PANEL: u32 = 7;
    pub const DAMAGE: u32 = 8;
    pub const SET_MODE: u32 = 9;
    pub const LIST_WINDOWS: u32 = 10;
    pub const RAISE_SURFACE: u32 = 11;
    pub const CLIPBOARD_SET: u32 = 12;
    pub const CLIPBOARD_GET: u32 = 13;
}

pub mod event {
    pub const WELCOME: u32 = 100;
    pub const SURFACE_ID: u32 = 101;
    pub const FRAME_DONE: u32 = 102;
    pub const CONFIGURE: u32 = 103;
    pub const POINTER_MOTION: u32 = 110;
    pub const POINTER_BUTTON: u32 = 111;
    pub const KEY: u32 = 120;
    pub const FOCUS_IN: u32 = 121;
    pub const FOCUS_OUT: u32 = 122;
    pub const WINDOW_LIST: u32 = 130;
    pub const CLIPBOARD_DATA: u32 = 131;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Opaque; the high byte is ignored
    Xrgb8888,
    /// Straight alpha in the high byte
    Argb8888,
}

impl PixelFormat {
    pub fn from_wire(code: u32) -> Option<Self> {
        match code {
            0 => Some(PixelFormat::Xrgb8888),
            1 => Some(PixelFormat::Argb8888),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            PixelFormat::Xrgb8888 => 0,
            PixelFormat::Argb8888 => 1,
        }
    }
}

#[derive(Debug)]
pub enum WireError {
    PayloadTooLarge(usize),
    Truncated { kind: u32, expected: usize, actual: usize },
    UnknownEvent(u32),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::PayloadTooLarge(size) => {
                write!(f, "declared payload of {} bytes exceeds {}", size, MAX_PAYLOAD)
            }
            WireError::Truncated { kind, expected, actual } => write!(
                f,
                "message type {} needs {} payload bytes, got {}",
                kind, expected, actual
            ),
            WireError::UnknownEvent(kind) => write!(f, "unknown event type {}", kind),
        }
    }
}

impl std::error::Error for WireError {}

/// One undecoded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u32,
    pub payload: Bytes,
}

/// Stateful decoder for a CDP byte stream.
///
/// Handles partial reads across socket boundaries.
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(HEADER_LEN + MAX_PAYLOAD),
        }
    }

    /// Append received bytes to the internal buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extract the next complete message, if available
    pub fn next_frame(&mut self) -> Result<Option<Frame>, WireError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = &self.buf[..HEADER_LEN];
        let kind = header.get_u32_le();
        let size = header.get_u32_le() as usize;
        if size > MAX_PAYLOAD {
            return Err(WireError::PayloadTooLarge(size));
        }
        if self.buf.len() < HEADER_LEN + size {
            return Ok(None);
        }
        self.buf.advance(HEADER_LEN);
        let payload = self.buf.split_to(size).freeze();
        Ok(Some(Frame { kind, payload }))
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateSurface { x: i32, y: i32, width: i32, height: i32 },
    DestroySurface { surface: u32 },
    AttachBuffer { surface: u32, width: u32, height: u32, stride: u32, format: u32 },
    Commit { surface: u32 },
    Frame { surface: u32 },
    SetTitle { surface: u32, title: String },
    SetPanel { surface: u32, edge: u32, height: u32 },
    Damage { surface: u32, x: i32, y: i32, width: i32, height: i32 },
    SetMode { width: u32, height: u32, refresh: u32 },
    ListWindows,
    RaiseSurface { surface: u32 },
    ClipboardSet { data: Vec<u8> },
    ClipboardGet,
    Unknown(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowEntry {
    /// 0 for windows drawn by the compositor itself
    pub surface: u32,
    pub title: String,
    pub minimized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Welcome { width: u32, height: u32, version: u32 },
    SurfaceId { surface: u32 },
    FrameDone { surface: u32 },
    Configure { surface: u32, width: u32, height: u32 },
    PointerMotion { surface: u32, x: i32, y: i32 },
    PointerButton { surface: u32, button: u32, state: u32 },
    Key { keycode: u32, state: u32, character: u32, modifiers: u32 },
    FocusIn { surface: u32 },
    FocusOut { surface: u32 },
    WindowList(Vec<WindowEntry>),
    ClipboardData(Vec<u8>),
}

fn ensure(frame: &Frame, expected: usize) -> Result<Bytes, WireError> {
    if frame.payload.len() < expected {
        return Err(WireError::Truncated {
            kind: frame.kind,
            expected,
            actual: frame.payload.len(),
        });
    }
    Ok(frame.payload.clone())
}

/// Read a NUL-terminated fixed-width string field
fn get_fixed_str(p: &mut Bytes, len: usize) -> String {
    let field = p.split_to(len);
    let end = field.iter().position(|b| *b == 0).unwrap_or(len);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn put_fixed_str(out: &mut BytesMut, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len - 1);
    out.put_slice(&bytes[..n]);
    out.put_bytes(0, len - n);
}

fn get_blob(frame: &Frame) -> Result<Vec<u8>, WireError> {
    let mut p = ensure(frame, 4)?;
    let len = p.get_u32_le() as usize;
    if p.len() < len {
        return Err(WireError::Truncated {
            kind: frame.kind,
            expected: 4 + len,
            actual: frame.payload.len(),
        });
    }
    Ok(p[..len].to_vec())
}

fn put_blob(out: &mut BytesMut, data: &[u8]) {
    let data = &data[..data.len().min(CLIPBOARD_MAX)];
    out.put_u32_le(data.len() as u32);
    out.put_slice(data);
}

fn finish(kind: u32, payload: BytesMut) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.put_u32_le(kind);
    out.put_u32_le(payload.len() as u32);
    out.extend_from_slice(&payload);
    out
}

impl Request {
    pub fn decode(frame: &Frame) -> Result<Request, WireError> {
        use request::*;
        let request = match frame.kind {
            CREATE_SURFACE => {
                let mut p = ensure(frame, 16)?;
                Request::CreateSurface {
                    x: p.get_i32_le(),
                    y: p.get_i32_le(),
                    width: p.get_i32_le(),
                    height: p.get_i32_le(),
                }
            }
            DESTROY_SURFACE => Request::DestroySurface { surface: ensure(frame, 4)?.get_u32_le() },
            ATTACH_BUFFER => {
                let mut p = ensure(frame, 20)?;
                Request::AttachBuffer {
                    surface: p.get_u32_le(),
                    width: p.get_u32_le(),
                    height: p.get_u32_le(),
                    stride: p.get_u32_le(),
                    format: p.get_u32_le(),
                }
            }
            COMMIT => Request::Commit { surface: ensure(frame, 4)?.get_u32_le() },
            FRAME => Request::Frame { surface: ensure(frame, 4)?.get_u32_le() },
            SET_TITLE => {
                let mut p = ensure(frame, 4 + TITLE_LEN)?;
                let surface = p.get_u32_le();
                Request::SetTitle { surface, title: get_fixed_str(&mut p, TITLE_LEN) }
            }
            SET_PANEL => {
                let mut p = ensure(frame, 12)?;
                Request::SetPanel {
                    surface: p.get_u32_le(),
                    edge: p.get_u32_le(),
                    height: p.get_u32_le(),
                }
            }
            DAMAGE => {
                let mut p = ensure(frame, 20)?;
                Request::Damage {
                    surface: p.get_u32_le(),
                    x: p.get_i32_le(),
                    y: p.get_i32_le(),
                    width: p.get_i32_le(),
                    height: p.get_i32_le(),
                }
            }
            SET_MODE => {
                let mut p = ensure(frame, 12)?;
                Request::SetMode {
                    width: p.get_u32_le(),
                    height: p.get_u32_le(),
                    refresh: p.get_u32_le(),
                }
            }
            LIST_WINDOWS => Request::ListWindows,
            RAISE_SURFACE => Request::RaiseSurface { surface: ensure(frame, 4)?.get_u32_le() },
            CLIPBOARD_SET => Request::ClipboardSet { data: get_blob(frame)? },
            CLIPBOARD_GET => Request::ClipboardGet,
            other => Request::Unknown(other),
        };
        Ok(request)
    }

    pub fn kind(&self) -> u32 {
        use request::*;
        match self {
            Request::CreateSurface { .. } => CREATE_SURFACE,
            Request::DestroySurface { .. } => DESTROY_SURFACE,
            Request::AttachBuffer { .. } => ATTACH_BUFFER,
            Request::Commit { .. } => COMMIT,
            Request::Frame { .. } => FRAME,
            Request::SetTitle { .. } => SET_TITLE,
            Request::SetPanel { .. } => SET_PANEL,
            Request::Damage { .. } => DAMAGE,
            Request::SetMode { .. } => SET_MODE,
            Request::ListWindows => LIST_WINDOWS,
            Request::RaiseSurface { .. } => RAISE_SURFACE,
            Request::ClipboardSet { .. } => CLIPBOARD_SET,
            Request::ClipboardGet => CLIPBOARD_GET,
            Request::Unknown(kind) => *kind,
        }
    }

    /// Client-side encoding, header included
    pub fn encode(&self) -> Vec<u8> {
        let mut p = BytesMut::new();
        match self {
            Request::CreateSurface { x, y, width, height } => {
                p.put_i32_le(*x);
                p.put_i32_le(*y);
                p.put_i32_le(*width);
                p.put_i32_le(*height);
            }
            Request::DestroySurface { surface }
            | Request::Commit { surface }
            | Request::Frame { surface }
            | Request::RaiseSurface { surface } => p.put_u32_le(*surface),
            Request::AttachBuffer { surface, width, height, stride, format } => {
                for v in [surface, width, height, stride, format] {
                    p.put_u32_le(*v);
                }
            }
            Request::SetTitle { surface, title } => {
                p.put_u32_le(*surface);
                put_fixed_str(&mut p, title, TITLE_LEN);
            }
            Request::SetPanel { surface, edge, height } => {
                for v in [surface, edge, height] {
                    p.put_u32_le(*v);
                }
            }
            Request::Damage { surface, x, y, width, height } => {
                p.put_u32_le(*surface);
                for v in [x, y, width, height] {
                    p.put_i32_le(*v);
                }
            }
            Request::SetMode { width, height, refresh } => {
                for v in [width, height, refresh] {
                    p.put_u32_le(*v);
                }
            }
            Request::ClipboardSet { data } => put_blob(&mut p, data),
            Request::ListWindows | Request::ClipboardGet | Request::Unknown(_) => {}
        }
        finish(self.kind(), p)
    }
}

impl Event {
    pub fn kind(&self) -> u32 {
        use event::*;
        match self {
            Event::Welcome { .. } => WELCOME,
            Event::SurfaceId { .. } => SURFACE_ID,
            Event::FrameDone { .. } => FRAME_DONE,
            Event::Configure { .. } => CONFIGURE,
            Event::PointerMotion { .. } => POINTER_MOTION,
            Event::PointerButton { .. } => POINTER_BUTTON,
            Event::Key { .. } => KEY,
            Event::FocusIn { .. } => FOCUS_IN,
            Event::FocusOut { .. } => FOCUS_OUT,
            Event::WindowList(_) => WINDOW_LIST,
            Event::ClipboardData(_) => CLIPBOARD_DATA,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut p = BytesMut::new();
        match self {
            Event::Welcome { width, height, version } => {
                for v in [width, height, version] {
                    p.put_u32_le(*v);
                }
            }
            Event::SurfaceId { surface }
            | Event::FrameDone { surface }
            | Event::FocusIn { surface }
            | Event::FocusOut { surface } => p.put_u32_le(*surface),
            Event::Configure { surface, width, height } => {
                for v in [surface, width, height] {
                    p.put_u32_le(*v);
                }
            }
            Event::PointerMotion { surface, x, y } => {
                p.put_u32_le(*surface);
                p.put_i32_le(*x);
                p.put_i32_le(*y);
            }
            Event::PointerButton { surface, button, state } => {
                for v in [surface, button, state] {
                    p.put_u32_le(*v);
                }
            }
            Event::Key { keycode, state, character, modifiers } => {
                for v in [keycode, state, character, modifiers] {
                    p.put_u32_le(*v);
                }
            }
            Event::WindowList(entries) => {
                let entries = &entries[..entries.len().min(MAX_LIST_ENTRIES)];
                p.put_u32_le(entries.len() as u32);
                for entry in entries {
                    p.put_u32_le(entry.surface);
                    put_fixed_str(&mut p, &entry.title, LIST_TITLE_LEN);
                    p.put_u32_le(entry.minimized as u32);
                }
            }
            Event::ClipboardData(data) => put_blob(&mut p, data),
        }
        finish(self.kind(), p)
    }

    /// Client-side decoding
    pub fn decode(frame: &Frame) -> Result<Event, WireError> {
        use event::*;
        let event = match frame.kind {
            WELCOME => {
                let mut p = ensure(frame, 12)?;
                Event::Welcome {
                    width: p.get_u32_le(),
                    height: p.get_u32_le(),
                    version: p.get_u32_le(),
                }
            }
            SURFACE_ID => Event::SurfaceId { surface: ensure(frame, 4)?.get_u32_le() },
            FRAME_DONE => Event::FrameDone { surface: ensure(frame, 4)?.get_u32_le() },
            FOCUS_IN => Event::FocusIn { surface: ensure(frame, 4)?.get_u32_le() },
            FOCUS_OUT => Event::FocusOut { surface: ensure(frame, 4)?.get_u32_le() },
            CONFIGURE => {
                let mut p = ensure(frame, 12)?;
                Event::Configure {
                    surface: p.get_u32_le(),
                    width: p.get_u32_le(),
                    height: p.get_u32_le(),
                }
            }
            POINTER_MOTION => {
                let mut p = ensure(frame, 12)?;
                Event::PointerMotion {
                    surface: p.get_u32_le(),
                    x: p.get_i32_le(),
                    y: p.get_i32_le(),
                }
            }
            POINTER_BUTTON => {
                let mut p = ensure(frame, 12)?;
                Event::PointerButton {
                    surface: p.get_u32_le(),
                    button: p.get_u32_le(),
                    state: p.get_u32_le(),
                }
            }
            KEY => {
                let mut p = ensure(frame, 16)?;
                Event::Key {
                    keycode: p.get_u32_le(),
                    state: p.get_u32_le(),
                    character: p.get_u32_le(),
                    modifiers: p.get_u32_le(),
                }
            }
            WINDOW_LIST => {
                let mut p = ensure(frame, 4)?;
                let count = p.get_u32_le() as usize;
                let entry_len = 4 + LIST_TITLE_LEN + 4;
                if count > MAX_LIST_ENTRIES || p.len() < count * entry_len {
                    return Err(WireError::Truncated {
                        kind: frame.kind,
                        expected: 4 + count * entry_len,
                        actual: frame.payload.len(),
                    });
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let surface = p.get_u32_le();
                    let title = get_fixed_str(&mut p, LIST_TITLE_LEN);
                    let minimized = p.get_u32_le() != 0;
                    entries.push(WindowEntry { surface, title, minimized });
                }
                Event::WindowList(entries)
            }
            CLIPBOARD_DATA => Event::ClipboardData(get_blob(frame)?),
            other => return Err(WireError::UnknownEvent(other)),
        };
        Ok(event)
    }
}
