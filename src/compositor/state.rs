//! Compositor state
//!
//! One `Compositor` value owns every table the server, input router and
//! renderer operate on. Nothing is global; each component receives the
//! state explicitly.

use log::{debug, info, warn};

use super::clipboard::Clipboard;
use super::damage::DamageTracker;
use super::geometry::Rect;
use super::input::InputState;
use super::window::{Metrics, WindowId, WindowRegistry};
use crate::backend::canvas::rgb;
use crate::config::Config;
use crate::error::CompositorError;
use crate::protocol::Event;
use crate::server::{ClientId, ClientRegistry, SurfaceId, SurfaceTable};

pub struct Compositor {
    pub screen: Rect,
    pub metrics: Metrics,

    pub windows: WindowRegistry,
    pub surfaces: SurfaceTable,
    pub clients: ClientRegistry,

    pub damage: DamageTracker,
    pub input: InputState,

    /// Window receiving keys; always a visible window when set
    pub focus: Option<WindowId>,

    pub clipboard: Clipboard,

    /// Set by any state change that alters the screen, cleared after rendering
    pub needs_redraw: bool,

    /// Cleared by the quit key
    pub running: bool,

    /// Clients dropped since the event loop last looked
    pub disconnected: Vec<ClientId>,
}

impl Compositor {
    pub fn new(config: &Config) -> Self {
        let screen = Rect::new(0, 0, config.display.width as i32, config.display.height as i32);
        let limits = &config.limits;
        let mut damage = DamageTracker::new(config.display.width, config.display.height);
        damage.add_full();

        Self {
            screen,
            metrics: Metrics::from(limits),
            windows: WindowRegistry::new(limits.max_windows),
            surfaces: SurfaceTable::new(limits.max_surfaces),
            clients: ClientRegistry::new(limits.max_clients),
            damage,
            input: InputState::new(screen),
            focus: None,
            clipboard: Clipboard::default(),
            needs_redraw: true,
            running: true,
            disconnected: Vec::new(),
        }
    }

    pub fn add_damage(&mut self, rect: Rect) {
        self.damage.add(rect);
        self.needs_redraw = true;
    }

    pub fn add_full_damage(&mut self) {
        self.damage.add_full();
        self.needs_redraw = true;
    }

    pub fn damage_window(&mut self, id: WindowId) {
        if let Some(window) = self.windows.get(id) {
            let bounds = window.geometry;
            self.damage.add_window(bounds);
            self.needs_redraw = true;
        }
    }

    /// Local windows drawn by the compositor itself
    pub fn spawn_demo_windows(&mut self) {
        let demos = [
            (Rect::new(50, 50, 300, 200), "Terminal", rgb(60, 120, 200)),
            (Rect::new(200, 150, 280, 180), "Editor", rgb(80, 160, 80)),
            (Rect::new(400, 80, 250, 160), "Info", rgb(180, 100, 60)),
        ];
        for (geometry, title, color) in demos {
            match self.windows.create(geometry, title, color) {
                Ok(id) => {
                    if let Some(window) = self.windows.get_mut(id) {
                        window.text = format!("{} window", title);
                    }
                }
                Err(e) => warn!("Failed to create demo window {}: {}", title, e),
            }
        }
        self.add_full_damage();
    }

    /// Surface linked to a window together with its owning client
    pub fn window_surface(&self, id: WindowId) -> Option<(SurfaceId, ClientId)> {
        let sid = self.windows.get(id)?.surface?;
        let surface = self.surfaces.get(sid)?;
        Some((sid, surface.owner))
    }

    /// Change keyboard focus, notifying the clients on either side
    pub fn set_focus(&mut self, id: Option<WindowId>) {
        let id = id.filter(|id| self.windows.get(*id).map(|w| w.visible).unwrap_or(false));
        if self.focus == id {
            return;
        }
        if let Some(old) = self.focus.take() {
            if let Some((sid, owner)) = self.window_surface(old) {
                self.send_to_client(owner, Event::FocusOut { surface: sid.to_wire() });
            }
            self.damage_window(old);
        }
        self.focus = id;
        if let Some(new) = id {
            if let Some((sid, owner)) = self.window_surface(new) {
                self.send_to_client(owner, Event::FocusIn { surface: sid.to_wire() });
            }
            self.damage_window(new);
        }
    }

    pub fn focus_and_raise(&mut self, id: WindowId) {
        if !self.windows.contains(id) {
            return;
        }
        self.windows.focus_and_raise(id);
        self.set_focus(Some(id));
        self.damage_window(id);
    }

    pub fn hide_window(&mut self, id: WindowId) {
        self.windows.hide(id);
        if self.input.grab.is_some_and(|grab| grab.window() == id) {
            self.input.grab = None;
        }
        if self.focus == Some(id) {
            self.set_focus(None);
        }
        self.add_full_damage();
    }

    pub fn minimize(&mut self, id: WindowId) {
        if let Some(window) = self.windows.get_mut(id) {
            window.minimized = true;
        }
        self.hide_window(id);
    }

    /// Bring a window back from minimized or hidden and give it focus
    pub fn unminimize(&mut self, id: WindowId) {
        let Some(window) = self.windows.get_mut(id) else {
            return;
        };
        window.minimized = false;
        window.visible = true;
        self.focus_and_raise(id);
        self.add_full_damage();
    }

    /// Toggle maximize and tell the client its new content size
    pub fn toggle_maximize(&mut self, id: WindowId) {
        let Some(window) = self.windows.get(id) else {
            return;
        };
        let changed = if window.maximized {
            self.windows.restore(id)
        } else {
            self.windows.maximize(id, self.screen)
        };
        if changed {
            self.send_configure(id);
            self.add_full_damage();
        }
    }

    pub fn send_configure(&mut self, id: WindowId) {
        let metrics = self.metrics;
        let Some((width, height)) = self.windows.get(id).map(|w| w.content_size(&metrics)) else {
            return;
        };
        if let Some((sid, owner)) = self.window_surface(id) {
            self.send_to_client(
                owner,
                Event::Configure { surface: sid.to_wire(), width, height },
            );
        }
    }

    /// Close button: client windows take their whole connection down
    pub fn close_window(&mut self, id: WindowId) {
        match self.window_surface(id) {
            Some((_, owner)) => self.disconnect_client(owner),
            None => self.hide_window(id),
        }
    }

    pub fn send_to_client(&mut self, id: ClientId, event: Event) {
        let Some(client) = self.clients.get_mut(id) else {
            return;
        };
        if let Err(e) = client.send(&event) {
            warn!("Dropping client after failed send of event {}: {}", event.kind(), e);
            self.disconnect_client(id);
        }
    }

    /// Push queued events to clients whose sockets drained since the last send
    pub fn flush_clients(&mut self) {
        for id in self.clients.flush_all() {
            warn!("Dropping client whose socket failed");
            self.disconnect_client(id);
        }
    }

    /// Release a surface and hide the window it was shown in
    pub fn destroy_surface(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.remove(id) else {
            return;
        };
        if let Some(window) = self.windows.get_mut(surface.window) {
            window.surface = None;
            window.minimized = false;
        }
        self.hide_window(surface.window);
        debug!("Surface {} destroyed", id.to_wire());
    }

    pub fn disconnect_client(&mut self, id: ClientId) {
        // Removed first so the cascade below sends nothing to the departing client
        let removed = self.clients.remove(id).is_some();
        for sid in self.surfaces.owned_by(id) {
            self.destroy_surface(sid);
        }
        if removed {
            info!("Client disconnected ({} remaining)", self.clients.len());
            self.disconnected.push(id);
        }
        self.add_full_damage();
    }

    /// Notify every surface that asked for a frame callback
    pub fn send_frame_callbacks(&mut self) {
        for (sid, owner) in self.surfaces.take_frame_requests() {
            self.send_to_client(owner, Event::FrameDone { surface: sid.to_wire() });
        }
    }

    pub fn request_quit(&mut self) {
        info!("Quit requested");
        self.running = false;
    }

    pub fn create_window(&mut self, geometry: Rect, title: &str, color: u32) -> Result<WindowId, CompositorError> {
        let id = self.windows.create(geometry, title, color)?;
        self.add_full_damage();
        Ok(id)
    }
}
