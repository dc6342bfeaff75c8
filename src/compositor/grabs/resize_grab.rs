//! Window resize grab

use crate::compositor::geometry::{Point, Rect};
use crate::compositor::window::{Metrics, ResizeEdge, WindowId, WindowRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeSurfaceGrab {
    pub window: WindowId,
    pub edge: ResizeEdge,
    pub start: Point,
    pub initial_geometry: Rect,
}

impl ResizeSurfaceGrab {
    /// Grow or shrink along the grabbed edges, never below the minimum size
    pub fn motion(&self, windows: &mut WindowRegistry, location: Point, metrics: &Metrics) {
        let delta = location - self.start;
        let Some(window) = windows.get_mut(self.window) else {
            return;
        };
        if self.edge.resizes_width() {
            window.geometry.w = (self.initial_geometry.w + delta.x).max(metrics.min_width);
        }
        if self.edge.resizes_height() {
            window.geometry.h = (self.initial_geometry.h + delta.y).max(metrics.min_height);
        }
    }
}
