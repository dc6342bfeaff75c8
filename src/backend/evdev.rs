//! Raw Linux evdev input source
//!
//! Reads `struct input_event` records from a non-blocking device node and
//! folds them into abstract `InputEvent`s. Motion is accumulated until the
//! next SYN_REPORT so one physical movement becomes one event.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::mem;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use log::{debug, info};

use super::{InputEvent, InputSource, KeyState};
use crate::config::{DeviceKind, InputDeviceConfig};
use crate::error::CompositorError;

const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const EV_REL: u16 = 0x02;
const EV_ABS: u16 = 0x03;
const SYN_REPORT: u16 = 0;
const REL_X: u16 = 0x00;
const REL_Y: u16 = 0x01;
const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;

/// Key codes at or above this are pointer buttons
const BTN_MISC: u16 = 0x100;

const EVENT_SIZE: usize = mem::size_of::<libc::input_event>();

pub struct EvdevDevice {
    file: File,
    name: String,
    kind: DeviceKind,
    abs_max: (i32, i32),
    abs: (i32, i32),
    abs_dirty: bool,
    rel: (i32, i32),
}

impl EvdevDevice {
    pub fn open(config: &InputDeviceConfig) -> Result<Self, CompositorError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(&config.path)
            .map_err(|e| {
                CompositorError::DeviceUnavailable(format!("{}: {}", config.path.display(), e))
            })?;
        info!("Opened {} device {}", config.kind.as_str(), config.path.display());
        Ok(Self::from_file(file, &config.path, config.kind, (config.abs_max_x, config.abs_max_y)))
    }

    fn from_file(file: File, path: &Path, kind: DeviceKind, abs_max: (i32, i32)) -> Self {
        Self {
            file,
            name: path.display().to_string(),
            kind,
            abs_max,
            abs: (0, 0),
            abs_dirty: false,
            rel: (0, 0),
        }
    }

    fn translate(&mut self, type_: u16, code: u16, value: i32, out: &mut Vec<InputEvent>) {
        match (type_, self.kind) {
            (EV_SYN, _) if code == SYN_REPORT => self.flush_motion(out),
            (EV_KEY, DeviceKind::Keyboard) if code < BTN_MISC => out.push(InputEvent::Key {
                code,
                state: KeyState::from_value(value),
            }),
            (EV_KEY, DeviceKind::PointerRelative | DeviceKind::PointerAbsolute) if code >= BTN_MISC => {
                self.flush_motion(out);
                out.push(InputEvent::Button { code, pressed: value != 0 });
            }
            (EV_REL, DeviceKind::PointerRelative) => match code {
                REL_X => self.rel.0 += value,
                REL_Y => self.rel.1 += value,
                _ => {}
            },
            (EV_ABS, DeviceKind::PointerAbsolute) => match code {
                ABS_X => {
                    self.abs.0 = value;
                    self.abs_dirty = true;
                }
                ABS_Y => {
                    self.abs.1 = value;
                    self.abs_dirty = true;
                }
                _ => {}
            },
            _ => debug!("{}: ignoring event type {} code {}", self.name, type_, code),
        }
    }

    fn flush_motion(&mut self, out: &mut Vec<InputEvent>) {
        if self.rel != (0, 0) {
            out.push(InputEvent::PointerRelative { dx: self.rel.0, dy: self.rel.1 });
            self.rel = (0, 0);
        }
        if self.abs_dirty {
            out.push(InputEvent::PointerAbsolute {
                x: self.abs.0,
                y: self.abs.1,
                max_x: self.abs_max.0,
                max_y: self.abs_max.1,
            });
            self.abs_dirty = false;
        }
    }
}

impl AsFd for EvdevDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl InputSource for EvdevDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_events(&mut self, out: &mut Vec<InputEvent>) -> io::Result<()> {
        let mut buf = [0u8; EVENT_SIZE * 32];
        loop {
            let n = match self.file.read(&mut buf) {
                Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "device closed")),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            for record in buf[..n].chunks_exact(EVENT_SIZE) {
                // SAFETY: input_event is plain old data and the chunk is exactly its size.
                let ev: libc::input_event =
                    unsafe { std::ptr::read_unaligned(record.as_ptr() as *const libc::input_event) };
                self.translate(ev.type_, ev.code, ev.value, out);
            }
        }
    }
}
