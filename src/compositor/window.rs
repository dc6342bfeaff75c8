//! Window registry
//!
//! Windows live in a generational arena and are addressed by stable
//! `WindowId`s. Stacking order is a separate list of ids; raising a window
//! only moves its id within that list, so surfaces that point at a window
//! never need to be patched when the order changes.

use super::arena::{Arena, Handle};
use super::geometry::{Point, Rect};
use crate::config::LimitsConfig;
use crate::error::CompositorError;
use crate::server::SurfaceId;

/// Maximum bytes of locally typed text in a surfaceless window
pub const WIN_TEXT_MAX: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub(crate) Handle);

/// Chrome layout metrics shared by hit-testing, resizing and rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub titlebar_height: i32,
    pub control_button_width: i32,
    pub resize_edge_thickness: i32,
    pub resize_corner: i32,
    pub min_width: i32,
    pub min_height: i32,
}

impl From<&LimitsConfig> for Metrics {
    fn from(limits: &LimitsConfig) -> Self {
        Self {
            titlebar_height: limits.titlebar_height,
            control_button_width: limits.control_button_width,
            resize_edge_thickness: limits.resize_edge_thickness,
            resize_corner: limits.resize_corner,
            min_width: limits.min_window_width,
            min_height: limits.min_window_height,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlButton {
    Minimize,
    Maximize,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Right,
    Bottom,
    Corner,
}

impl ResizeEdge {
    pub fn resizes_width(self) -> bool {
        matches!(self, ResizeEdge::Right | ResizeEdge::Corner)
    }

    pub fn resizes_height(self) -> bool {
        matches!(self, ResizeEdge::Bottom | ResizeEdge::Corner)
    }
}

/// What part of a window a point falls on, in hit priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Control(ControlButton),
    Resize(ResizeEdge),
    Titlebar,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEdge {
    Bottom,
    Top,
}

impl PanelEdge {
    pub fn from_wire(edge: u32) -> Self {
        if edge == 1 {
            PanelEdge::Top
        } else {
            PanelEdge::Bottom
        }
    }
}

#[derive(Debug, Clone)]
pub struct Window {
    /// Outer bounds; height includes the titlebar for non-panels
    pub geometry: Rect,
    pub title: String,
    /// 0x00RRGGBB titlebar color
    pub color: u32,
    pub visible: bool,
    pub is_panel: bool,
    pub minimized: bool,
    pub maximized: bool,
    pub saved_geometry: Option<Rect>,
    pub surface: Option<SurfaceId>,
    /// Locally typed text for surfaceless windows
    pub text: String,
}

impl Window {
    pub fn new(geometry: Rect, title: &str, color: u32) -> Self {
        Self {
            geometry,
            title: title.to_string(),
            color,
            visible: true,
            is_panel: false,
            minimized: false,
            maximized: false,
            saved_geometry: None,
            surface: None,
            text: String::new(),
        }
    }

    pub fn titlebar(&self, m: &Metrics) -> Rect {
        let g = self.geometry;
        Rect::new(g.x, g.y, g.w, m.titlebar_height)
    }

    /// Area the client draws into; panels have no chrome
    pub fn client_area(&self, m: &Metrics) -> Rect {
        let g = self.geometry;
        if self.is_panel {
            return g;
        }
        Rect::new(g.x, g.y + m.titlebar_height, g.w, g.h - m.titlebar_height)
    }

    /// Size reported to clients in Configure
    pub fn content_size(&self, m: &Metrics) -> (u32, u32) {
        let area = self.client_area(m);
        (area.w.max(0) as u32, area.h.max(0) as u32)
    }

    /// Buttons sit right-aligned as [minimize][maximize][close]
    pub fn control_rect(&self, button: ControlButton, m: &Metrics) -> Rect {
        let slot = match button {
            ControlButton::Close => 1,
            ControlButton::Maximize => 2,
            ControlButton::Minimize => 3,
        };
        let g = self.geometry;
        Rect::new(g.right() - slot * m.control_button_width, g.y, m.control_button_width, m.titlebar_height)
    }

    pub fn control_at(&self, p: Point, m: &Metrics) -> Option<ControlButton> {
        if self.is_panel {
            return None;
        }
        [ControlButton::Close, ControlButton::Maximize, ControlButton::Minimize]
            .into_iter()
            .find(|b| self.control_rect(*b, m).contains(p))
    }

    pub fn resize_edge_at(&self, p: Point, m: &Metrics) -> Option<ResizeEdge> {
        if self.is_panel || self.maximized || !self.geometry.contains(p) {
            return None;
        }
        let g = self.geometry;
        let in_right_corner = p.x >= g.right() - m.resize_corner;
        let in_bottom_corner = p.y >= g.bottom() - m.resize_corner;
        if in_right_corner && in_bottom_corner {
            return Some(ResizeEdge::Corner);
        }
        if p.x >= g.right() - m.resize_edge_thickness && p.y >= g.y + m.titlebar_height {
            return Some(ResizeEdge::Right);
        }
        if p.y >= g.bottom() - m.resize_edge_thickness {
            return Some(ResizeEdge::Bottom);
        }
        None
    }

    pub fn classify(&self, p: Point, m: &Metrics) -> Option<Region> {
        if !self.geometry.contains(p) {
            return None;
        }
        if self.is_panel {
            return Some(Region::Client);
        }
        if let Some(button) = self.control_at(p, m) {
            return Some(Region::Control(button));
        }
        if let Some(edge) = self.resize_edge_at(p, m) {
            return Some(Region::Resize(edge));
        }
        if self.titlebar(m).contains(p) {
            return Some(Region::Titlebar);
        }
        Some(Region::Client)
    }

    pub fn push_char(&mut self, ch: char) {
        if self.text.len() + ch.len_utf8() < WIN_TEXT_MAX {
            self.text.push(ch);
        }
    }
}

/// A non-panel window as reported to ListWindows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSummary {
    pub surface: Option<SurfaceId>,
    pub title: String,
    pub minimized: bool,
}

pub struct WindowRegistry {
    arena: Arena<Window>,
    /// Stacking order, bottom first
    order: Vec<WindowId>,
}

impl WindowRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: Arena::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    /// Create a window on top of the stack, recycling a closed local window if one exists
    pub fn create(&mut self, geometry: Rect, title: &str, color: u32) -> Result<WindowId, CompositorError> {
        let reusable = self.order.iter().copied().find(|id| {
            self.get(*id)
                .map(|w| !w.visible && !w.minimized && w.surface.is_none())
                .unwrap_or(false)
        });
        if let Some(old) = reusable {
            self.order.retain(|id| *id != old);
            self.arena.remove(old.0);
        }

        let handle = self
            .arena
            .insert(Window::new(geometry, title, color))
            .map_err(|_| CompositorError::CapacityExceeded("window"))?;
        let id = WindowId(handle);
        self.order.push(id);
        Ok(id)
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.arena.get(id.0)
    }

    pub fn get_mut(&mut self, id: WindowId) -> Option<&mut Window> {
        self.arena.get_mut(id.0)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.arena.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Full stacking order, bottom first, panels included
    pub fn order(&self) -> &[WindowId] {
        &self.order
    }

    /// Move `id` to the top of the stack; no-op for unknown ids
    pub fn focus_and_raise(&mut self, id: WindowId) {
        let Some(pos) = self.order.iter().position(|w| *w == id) else {
            return;
        };
        if !self.contains(id) {
            return;
        }
        let entry = self.order.remove(pos);
        self.order.push(entry);
    }

    /// Non-panel windows, bottom first
    pub fn stacked(&self) -> impl Iterator<Item = (WindowId, &Window)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.get(*id).map(|w| (*id, w)))
            .filter(|(_, w)| !w.is_panel)
    }

    pub fn panels(&self) -> impl Iterator<Item = (WindowId, &Window)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.get(*id).map(|w| (*id, w)))
            .filter(|(_, w)| w.is_panel)
    }

    pub fn topmost(&self) -> Option<WindowId> {
        self.stacked().last().map(|(id, _)| id)
    }

    pub fn hit_test(&self, p: Point) -> Option<WindowId> {
        if let Some((id, _)) = self
            .panels()
            .find(|(_, w)| w.visible && w.geometry.contains(p))
        {
            return Some(id);
        }
        let stacked: Vec<_> = self.stacked().collect();
        stacked
            .into_iter()
            .rev()
            .find(|(_, w)| w.visible && w.geometry.contains(p))
            .map(|(id, _)| id)
    }

    pub fn hide(&mut self, id: WindowId) {
        if let Some(window) = self.get_mut(id) {
            window.visible = false;
        }
    }

    /// Screen area left over after visible panels are carved off
    pub fn work_area(&self, screen: Rect) -> Rect {
        let mut area = screen;
        for (_, panel) in self.panels().filter(|(_, w)| w.visible) {
            let h = panel.geometry.h;
            if panel.geometry.y <= screen.y {
                area.y += h;
            }
            area.h -= h;
        }
        area
    }

    pub fn maximize(&mut self, id: WindowId, screen: Rect) -> bool {
        let area = self.work_area(screen);
        let Some(window) = self.get_mut(id) else {
            return false;
        };
        if window.is_panel || window.maximized {
            return false;
        }
        window.saved_geometry = Some(window.geometry);
        window.geometry = area;
        window.maximized = true;
        true
    }

    pub fn restore(&mut self, id: WindowId) -> bool {
        let Some(window) = self.get_mut(id) else {
            return false;
        };
        if !window.maximized {
            return false;
        }
        if let Some(saved) = window.saved_geometry.take() {
            window.geometry = saved;
        }
        window.maximized = false;
        true
    }

    /// Turn `id` into a chrome-less panel pinned to a screen edge
    pub fn make_panel(&mut self, id: WindowId, screen: Rect, edge: PanelEdge, height: i32) -> bool {
        let Some(window) = self.get_mut(id) else {
            return false;
        };
        let height = height.clamp(1, screen.h);
        let y = match edge {
            PanelEdge::Bottom => screen.bottom() - height,
            PanelEdge::Top => screen.y,
        };
        window.is_panel = true;
        window.maximized = false;
        window.saved_geometry = None;
        window.geometry = Rect::new(screen.x, y, screen.w, height);
        true
    }

    pub fn windows_for_listing(&self) -> Vec<WindowSummary> {
        self.stacked()
            .filter(|(_, w)| w.visible || w.minimized)
            .map(|(_, w)| WindowSummary {
                surface: w.surface,
                title: w.title.clone(),
                minimized: w.minimized,
            })
            .collect()
    }
}
