//! Surface table and shared-memory client buffers

use std::fs::File;
use std::os::fd::OwnedFd;

use memmap2::{Mmap, MmapOptions};

use super::client::ClientId;
use crate::compositor::arena::{Arena, Handle};
use crate::compositor::window::WindowId;
use crate::error::CompositorError;
use crate::protocol::PixelFormat;

/// Upper bound on a single client buffer dimension
pub const MAX_BUFFER_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub(crate) Handle);

impl SurfaceId {
    pub fn to_wire(self) -> u32 {
        self.0.to_wire()
    }

    pub fn from_wire(id: u32) -> Option<Self> {
        Handle::from_wire(id).map(SurfaceId)
    }
}

/// Read-only mapping of a client's pixel buffer
pub struct ShmBuffer {
    map: Mmap,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
}

impl ShmBuffer {
    pub fn map(fd: OwnedFd, width: u32, height: u32, stride: u32, format: u32) -> Result<Self, CompositorError> {
        let format = PixelFormat::from_wire(format)
            .ok_or_else(|| CompositorError::ResourceUnavailable(format!("unknown pixel format {}", format)))?;
        if width == 0 || height == 0 || width > MAX_BUFFER_DIMENSION || height > MAX_BUFFER_DIMENSION {
            return Err(CompositorError::ResourceUnavailable(format!(
                "invalid buffer size {}x{}",
                width, height
            )));
        }
        if (stride as u64) < width as u64 * 4 {
            return Err(CompositorError::ResourceUnavailable(format!(
                "stride {} too small for width {}",
                stride, width
            )));
        }

        let len = stride as usize * height as usize;
        let file = File::from(fd);
        let file_len = file.metadata()?.len();
        if file_len < len as u64 {
            return Err(CompositorError::ResourceUnavailable(format!(
                "buffer file holds {} bytes, {} required",
                file_len, len
            )));
        }

        // SAFETY: the mapping is read-only and the length is within the file.
        // The client may keep writing concurrently; torn frames are tolerated.
        let map = unsafe { MmapOptions::new().len(len).map(&file) }
            .map_err(|e| CompositorError::ResourceUnavailable(format!("mmap failed: {}", e)))?;

        Ok(Self { map, width, height, stride, format })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Native-endian pixel at (x, y); caller keeps coordinates in range
    pub fn pixel(&self, x: u32, y: u32) -> u32 {
        let at = y as usize * self.stride as usize + x as usize * 4;
        let bytes = &self.map[at..at + 4];
        u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

pub struct Surface {
    pub owner: ClientId,
    pub window: WindowId,
    pub buffer: Option<ShmBuffer>,
    pub committed: bool,
    pub frame_requested: bool,
}

impl Surface {
    pub fn new(owner: ClientId, window: WindowId) -> Self {
        Self {
            owner,
            window,
            buffer: None,
            committed: false,
            frame_requested: false,
        }
    }

    /// Buffer attached and committed
    pub fn is_renderable(&self) -> bool {
        self.committed && self.buffer.is_some()
    }
}

pub struct SurfaceTable {
    arena: Arena<Surface>,
}

impl SurfaceTable {
    pub fn new(capacity: usize) -> Self {
        Self { arena: Arena::with_capacity(capacity) }
    }

    pub fn insert(&mut self, surface: Surface) -> Result<SurfaceId, CompositorError> {
        self.arena
            .insert(surface)
            .map(SurfaceId)
            .map_err(|_| CompositorError::CapacityExceeded("surface"))
    }

    pub fn remove(&mut self, id: SurfaceId) -> Option<Surface> {
        self.arena.remove(id.0)
    }

    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.arena.get(id.0)
    }

    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.arena.get_mut(id.0)
    }

    pub fn is_full(&self) -> bool {
        self.arena.is_full()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Resolve a wire id owned by `client`
    pub fn lookup(&self, wire_id: u32, client: ClientId) -> Result<SurfaceId, CompositorError> {
        self.lookup_any(wire_id)
            .filter(|id| self.get(*id).map(|s| s.owner == client).unwrap_or(false))
            .ok_or_else(|| CompositorError::InvalidReference(format!("surface {}", wire_id)))
    }

    /// Resolve a wire id regardless of owner
    pub fn lookup_any(&self, wire_id: u32) -> Option<SurfaceId> {
        SurfaceId::from_wire(wire_id).filter(|id| self.arena.contains(id.0))
    }

    pub fn owned_by(&self, client: ClientId) -> Vec<SurfaceId> {
        self.arena
            .iter()
            .filter(|(_, s)| s.owner == client)
            .map(|(h, _)| SurfaceId(h))
            .collect()
    }

    /// Clear every pending frame request, returning who to notify
    pub fn take_frame_requests(&mut self) -> Vec<(SurfaceId, ClientId)> {
        self.arena
            .iter_mut()
            .filter(|(_, s)| s.frame_requested)
            .map(|(h, s)| {
                s.frame_requested = false;
                (SurfaceId(h), s.owner)
            })
            .collect()
    }
}
