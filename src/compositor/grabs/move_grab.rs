//! Window move grab

use crate::compositor::geometry::Point;
use crate::compositor::window::{WindowId, WindowRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSurfaceGrab {
    pub window: WindowId,
    /// Pointer location when the titlebar was pressed
    pub start: Point,
    pub initial_window_location: Point,
}

impl MoveSurfaceGrab {
    pub fn motion(&self, windows: &mut WindowRegistry, location: Point) {
        let delta = location - self.start;
        let new_location = self.initial_window_location + delta;
        if let Some(window) = windows.get_mut(self.window) {
            window.geometry.x = new_location.x;
            window.geometry.y = new_location.y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::geometry::Rect;

    #[test]
    fn window_follows_pointer_delta() {
        let mut windows = WindowRegistry::new(2);
        let id = windows.create(Rect::new(200, 150, 280, 180), "B", 0).unwrap();
        let grab = MoveSurfaceGrab {
            window: id,
            start: Point::new(250, 160),
            initial_window_location: Point::new(200, 150),
        };
        grab.motion(&mut windows, Point::new(260, 155));
        assert_eq!(windows.get(id).unwrap().geometry, Rect::new(210, 145, 280, 180));
    }
}
