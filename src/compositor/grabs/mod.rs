//! Window grab implementations (move and resize)

pub mod move_grab;
pub mod resize_grab;

pub use move_grab::MoveSurfaceGrab;
pub use resize_grab::ResizeSurfaceGrab;

use super::geometry::Point;
use super::window::{Metrics, WindowId, WindowRegistry};

/// Active pointer grab; at most one exists at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grab {
    Move(MoveSurfaceGrab),
    Resize(ResizeSurfaceGrab),
}

impl Grab {
    pub fn window(&self) -> WindowId {
        match self {
            Grab::Move(grab) => grab.window,
            Grab::Resize(grab) => grab.window,
        }
    }

    pub fn motion(&self, windows: &mut WindowRegistry, location: Point, metrics: &Metrics) {
        match self {
            Grab::Move(grab) => grab.motion(windows, location),
            Grab::Resize(grab) => grab.motion(windows, location, metrics),
        }
    }
}
