//! Per-frame damage accumulation
//!
//! Rectangles are collected until the cap is hit, after which the tracker
//! degrades to a single full-screen redraw for the rest of the frame.

use super::geometry::Rect;

pub const MAX_DAMAGE_RECTS: usize = 32;

/// Extra margin around window damage so borders and shadows are repainted
pub const WINDOW_DAMAGE_BORDER: i32 = 2;

#[derive(Debug, Clone)]
pub struct DamageTracker {
    screen: Rect,
    regions: Vec<Rect>,
    full_damage: bool,
}

impl DamageTracker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            screen: Rect::new(0, 0, width as i32, height as i32),
            regions: Vec::with_capacity(MAX_DAMAGE_RECTS),
            full_damage: false,
        }
    }

    pub fn reset(&mut self) {
        self.regions.clear();
        self.full_damage = false;
    }

    pub fn add(&mut self, rect: Rect) {
        if self.full_damage {
            return;
        }
        let Some(clipped) = rect.intersection(&self.screen) else {
            return;
        };
        if self.regions.len() >= MAX_DAMAGE_RECTS {
            self.add_full();
            return;
        }
        self.regions.push(clipped);
    }

    pub fn add_full(&mut self) {
        self.regions.clear();
        self.full_damage = true;
    }

    pub fn add_window(&mut self, bounds: Rect) {
        self.add(bounds.inflate(WINDOW_DAMAGE_BORDER));
    }

    pub fn has_any(&self) -> bool {
        self.full_damage || !self.regions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.full_damage
    }

    pub fn count(&self) -> usize {
        self.regions.len()
    }

    pub fn regions(&self) -> &[Rect] {
        &self.regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_full_is_idempotent() {
        let mut damage = DamageTracker::new(640, 480);
        damage.add_full();
        let once = (damage.is_full(), damage.count());
        damage.add_full();
        assert_eq!((damage.is_full(), damage.count()), once);
        assert!(damage.has_any());
    }

    #[test]
    fn reset_clears_everything() {
        let mut damage = DamageTracker::new(640, 480);
        damage.add(Rect::new(1, 1, 10, 10));
        damage.add_full();
        damage.reset();
        assert!(!damage.has_any());
        assert_eq!(damage.count(), 0);
    }

    #[test]
    fn collapses_to_full_past_the_cap() {
        let mut damage = DamageTracker::new(640, 480);
        for i in 0..MAX_DAMAGE_RECTS as i32 {
            damage.add(Rect::new(i, 0, 1, 1));
        }
        assert!(!damage.is_full());
        damage.add(Rect::new(100, 100, 1, 1));
        assert!(damage.is_full());
        assert_eq!(damage.count(), 0);
    }

    #[test]
    fn offscreen_and_empty_rects_are_ignored() {
        let mut damage = DamageTracker::new(640, 480);
        damage.add(Rect::new(700, 10, 20, 20));
        damage.add(Rect::new(10, 10, 0, 5));
        assert!(!damage.has_any());
    }

    #[test]
    fn window_damage_includes_border() {
        let mut damage = DamageTracker::new(640, 480);
        damage.add_window(Rect::new(50, 50, 100, 100));
        assert_eq!(damage.regions(), &[Rect::new(48, 48, 104, 104)]);
    }
}
