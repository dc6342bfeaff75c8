//! Request handlers
//!
//! Every request is validated against the surface and client tables
//! before it touches compositor state. Failures are logged and the
//! request is dropped; the protocol has no error reply.

use log::{debug, info, warn};

use super::client::{ClientId, Incoming};
use super::surface::{ShmBuffer, Surface, SurfaceId};
use crate::backend::canvas::rgb;
use crate::compositor::geometry::Rect;
use crate::compositor::window::{PanelEdge, WindowId};
use crate::compositor::Compositor;
use crate::error::CompositorError;
use crate::protocol::wire::MAX_LIST_ENTRIES;
use crate::protocol::{Event, Request, WindowEntry};

const CLIENT_WINDOW_TITLE: &str = "CDP Client";
const CLIENT_WINDOW_COLOR: u32 = rgb(80, 160, 220);

/// Largest coordinate or extent taken from a CreateSurface request
const MAX_CLIENT_COORD: i32 = 1 << 15;

pub fn handle_request(state: &mut Compositor, client: ClientId, incoming: Incoming) {
    let kind = incoming.request.kind();
    if let Err(e) = apply(state, client, incoming) {
        match e {
            CompositorError::InvalidReference(_) => debug!("Dropped request {}: {}", kind, e),
            _ => warn!("Dropped request {}: {}", kind, e),
        }
    }
}

fn apply(state: &mut Compositor, client: ClientId, incoming: Incoming) -> Result<(), CompositorError> {
    let Incoming { request, fd } = incoming;
    match request {
        Request::CreateSurface { x, y, width, height } => {
            let sid = create_surface(state, client, Rect::new(x, y, width, height))?;
            state.send_to_client(client, Event::SurfaceId { surface: sid.to_wire() });
        }

        Request::AttachBuffer { surface, width, height, stride, format } => {
            let sid = state.surfaces.lookup(surface, client)?;
            // The prior buffer is released before the new one is validated
            let shown = state.surfaces.get_mut(sid).and_then(|surf| {
                let renderable = surf.is_renderable();
                surf.buffer = None;
                surf.committed = false;
                renderable.then_some(surf.window)
            });
            if let Some(window) = shown {
                state.damage_window(window);
            }

            let fd = fd.ok_or_else(|| {
                CompositorError::ResourceUnavailable(format!("no descriptor for surface {}", surface))
            })?;
            let buffer = ShmBuffer::map(fd, width, height, stride, format)?;
            if let Some(surf) = state.surfaces.get_mut(sid) {
                surf.buffer = Some(buffer);
            }
            debug!("Surface {} attached {}x{} buffer", surface, width, height);
        }

        Request::Commit { surface } => {
            let sid = state.surfaces.lookup(surface, client)?;
            let window = state.surfaces.get_mut(sid).map(|s| {
                s.committed = true;
                s.window
            });
            if let Some(window) = window {
                state.damage_window(window);
            }
        }

        Request::Frame { surface } => {
            let sid = state.surfaces.lookup(surface, client)?;
            if let Some(surf) = state.surfaces.get_mut(sid) {
                surf.frame_requested = true;
            }
        }

        Request::SetTitle { surface, title } => {
            let window = surface_window(state, surface, client)?;
            if let Some(w) = state.windows.get_mut(window) {
                w.title = title;
            }
            state.damage_window(window);
        }

        Request::SetPanel { surface, edge, height } => {
            let window = surface_window(state, surface, client)?;
            let edge = PanelEdge::from_wire(edge);
            let height = height.min(i32::MAX as u32) as i32;
            if state.windows.make_panel(window, state.screen, edge, height) {
                if state.focus == Some(window) {
                    state.set_focus(None);
                }
                info!("Surface {} is now a {:?} panel", surface, edge);
                state.add_full_damage();
            }
        }

        Request::DestroySurface { surface } => {
            let sid = state.surfaces.lookup(surface, client)?;
            state.destroy_surface(sid);
        }

        Request::Damage { surface, x, y, width, height } => {
            let window = surface_window(state, surface, client)?;
            let metrics = state.metrics;
            if let Some(area) = state.windows.get(window).map(|w| w.client_area(&metrics)) {
                let x = area.x.saturating_add(x);
                let y = area.y.saturating_add(y);
                state.add_damage(Rect::new(x, y, width, height));
            }
        }

        Request::SetMode { width, height, refresh } => {
            info!("Mode change to {}x{}@{} requested; not supported", width, height, refresh);
        }

        Request::ListWindows => {
            let entries = state
                .windows
                .windows_for_listing()
                .into_iter()
                .take(MAX_LIST_ENTRIES)
                .map(|w| WindowEntry {
                    surface: w.surface.map(SurfaceId::to_wire).unwrap_or(0),
                    title: w.title,
                    minimized: w.minimized,
                })
                .collect();
            state.send_to_client(client, Event::WindowList(entries));
        }

        Request::RaiseSurface { surface } => {
            // Taskbars raise windows that belong to other clients
            let sid = state
                .surfaces
                .lookup_any(surface)
                .ok_or_else(|| CompositorError::InvalidReference(format!("surface {}", surface)))?;
            if let Some(window) = state.surfaces.get(sid).map(|s| s.window) {
                state.unminimize(window);
            }
        }

        Request::ClipboardSet { data } => state.clipboard.set(&data),

        Request::ClipboardGet => {
            let data = state.clipboard.get().to_vec();
            state.send_to_client(client, Event::ClipboardData(data));
        }

        Request::Unknown(kind) => debug!("Ignoring unknown request type {}", kind),
    }
    Ok(())
}

fn create_surface(state: &mut Compositor, client: ClientId, area: Rect) -> Result<SurfaceId, CompositorError> {
    if state.surfaces.is_full() {
        return Err(CompositorError::CapacityExceeded("surface"));
    }
    let titlebar = state.metrics.titlebar_height;
    let geometry = Rect::new(
        area.x.clamp(-MAX_CLIENT_COORD, MAX_CLIENT_COORD),
        area.y.clamp(-MAX_CLIENT_COORD, MAX_CLIENT_COORD),
        area.w.clamp(1, MAX_CLIENT_COORD),
        area.h.clamp(0, MAX_CLIENT_COORD).saturating_add(titlebar),
    );
    let window = state.create_window(geometry, CLIENT_WINDOW_TITLE, CLIENT_WINDOW_COLOR)?;

    let sid = match state.surfaces.insert(Surface::new(client, window)) {
        Ok(sid) => sid,
        Err(e) => {
            state.windows.hide(window);
            return Err(e);
        }
    };
    if let Some(w) = state.windows.get_mut(window) {
        w.surface = Some(sid);
    }
    info!(
        "Surface {} created ({}x{} at {},{})",
        sid.to_wire(),
        area.w,
        area.h,
        area.x,
        area.y
    );
    Ok(sid)
}

fn surface_window(state: &Compositor, surface: u32, client: ClientId) -> Result<WindowId, CompositorError> {
    let sid = state.surfaces.lookup(surface, client)?;
    state
        .surfaces
        .get(sid)
        .map(|s| s.window)
        .ok_or_else(|| CompositorError::InvalidReference(format!("surface {}", surface)))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::fd::OwnedFd;

    use super::*;
    use crate::config::Config;
    use crate::protocol::wire::CLIPBOARD_MAX;
    use crate::server::testing::{connect, create_surface as create, drain_events, send};

    fn shm(len: usize) -> OwnedFd {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&vec![0u8; len]).unwrap();
        file.into()
    }

    fn compositor() -> Compositor {
        Compositor::new(&Config::default())
    }

    #[test]
    fn create_surface_replies_with_first_id() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 100, 100, 100, 100);
        assert_eq!(surface, 1);

        let window = state.surfaces.get(state.surfaces.lookup_any(1).unwrap()).unwrap().window;
        let w = state.windows.get(window).unwrap();
        assert_eq!(w.geometry, Rect::new(100, 100, 100, 124));
        assert_eq!(w.title, "CDP Client");
        assert_eq!(state.windows.topmost(), Some(window));
        assert_eq!(state.focus, None);
    }

    #[test]
    fn capacity_exhaustion_sends_nothing() {
        let mut config = Config::default();
        config.limits.max_surfaces = 1;
        let mut state = Compositor::new(&config);
        let (client, mut peer) = connect(&mut state);
        create(&mut state, client, &mut peer, 0, 0, 10, 10);

        send(&mut state, client, Request::CreateSurface { x: 0, y: 0, width: 10, height: 10 }, None);
        assert!(drain_events(&mut peer).is_empty());
        assert_eq!(state.surfaces.len(), 1);
    }

    #[test]
    fn foreign_surfaces_are_invalid_references() {
        let mut state = compositor();
        let (owner, mut owner_peer) = connect(&mut state);
        let (other, _other_peer) = connect(&mut state);
        let surface = create(&mut state, owner, &mut owner_peer, 0, 0, 10, 10);

        send(&mut state, other, Request::SetTitle { surface, title: "hijack".into() }, None);
        send(&mut state, other, Request::DestroySurface { surface }, None);

        let sid = state.surfaces.lookup_any(surface).unwrap();
        let window = state.surfaces.get(sid).unwrap().window;
        assert_eq!(state.windows.get(window).unwrap().title, "CDP Client");
    }

    #[test]
    fn attach_without_descriptor_leaves_surface_bare() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 0, 0, 10, 10);
        let attach = Request::AttachBuffer { surface, width: 10, height: 10, stride: 40, format: 0 };
        send(&mut state, client, attach, None);
        send(&mut state, client, Request::Commit { surface }, None);

        let sid = state.surfaces.lookup_any(surface).unwrap();
        assert!(!state.surfaces.get(sid).unwrap().is_renderable());
    }

    #[test]
    fn set_panel_pins_to_bottom_edge() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 5, 5, 50, 50);
        send(&mut state, client, Request::SetPanel { surface, edge: 0, height: 32 }, None);

        let sid = state.surfaces.lookup_any(surface).unwrap();
        let window = state.windows.get(state.surfaces.get(sid).unwrap().window).unwrap();
        assert!(window.is_panel);
        assert_eq!(window.geometry, Rect::new(0, 768 - 32, 1024, 32));
        assert!(state.damage.is_full());
    }

    #[test]
    fn damage_is_translated_to_client_area() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 100, 200, 300, 300);
        state.damage.reset();

        send(&mut state, client, Request::Damage { surface, x: 5, y: 6, width: 10, height: 10 }, None);
        assert_eq!(state.damage.regions(), &[Rect::new(105, 230, 10, 10)]);
    }

    #[test]
    fn destroy_hides_window_and_frees_slot() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 0, 0, 10, 10);
        let window = state.surfaces.get(state.surfaces.lookup_any(surface).unwrap()).unwrap().window;

        send(&mut state, client, Request::DestroySurface { surface }, None);
        assert!(state.surfaces.is_empty());
        assert!(!state.windows.get(window).unwrap().visible);
        assert!(state.surfaces.lookup_any(surface).is_none());
    }

    #[test]
    fn raise_restores_minimized_window_of_another_client() {
        let mut state = compositor();
        let (owner, mut owner_peer) = connect(&mut state);
        let (taskbar, _taskbar_peer) = connect(&mut state);
        let surface = create(&mut state, owner, &mut owner_peer, 0, 0, 10, 10);
        let window = state.surfaces.get(state.surfaces.lookup_any(surface).unwrap()).unwrap().window;
        state.minimize(window);

        send(&mut state, taskbar, Request::RaiseSurface { surface }, None);
        let w = state.windows.get(window).unwrap();
        assert!(w.visible && !w.minimized);
        assert_eq!(state.focus, Some(window));
        assert!(drain_events(&mut owner_peer).contains(&Event::FocusIn { surface }));
    }

    #[test]
    fn list_windows_reports_client_and_local_windows() {
        let mut state = compositor();
        state.spawn_demo_windows();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 0, 0, 10, 10);

        send(&mut state, client, Request::ListWindows, None);
        let events = drain_events(&mut peer);
        let Some(Event::WindowList(entries)) = events.last() else {
            panic!("expected a window list, got {:?}", events);
        };
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].surface, 0);
        assert_eq!(entries[0].title, "Terminal");
        assert_eq!(entries[3].surface, surface);
    }

    #[test]
    fn clipboard_round_trip() {
        let mut state = compositor();
        let (writer, _writer_peer) = connect(&mut state);
        let (reader, mut reader_peer) = connect(&mut state);
        drain_events(&mut reader_peer);

        send(&mut state, writer, Request::ClipboardSet { data: b"copied".to_vec() }, None);
        send(&mut state, reader, Request::ClipboardGet, None);
        assert_eq!(drain_events(&mut reader_peer), vec![Event::ClipboardData(b"copied".to_vec())]);
    }

    #[test]
    fn extreme_create_geometry_is_clamped() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, i32::MIN, i32::MAX, 10, i32::MAX);

        let window = state.surfaces.get(state.surfaces.lookup_any(surface).unwrap()).unwrap().window;
        let g = state.windows.get(window).unwrap().geometry;
        let titlebar = state.metrics.titlebar_height;
        assert_eq!(g, Rect::new(-MAX_CLIENT_COORD, MAX_CLIENT_COORD, 10, MAX_CLIENT_COORD + titlebar));
    }

    #[test]
    fn damage_at_integer_limits_is_clipped() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 100, 100, 50, 50);
        state.damage.reset();

        let far = Request::Damage { surface, x: i32::MAX, y: i32::MAX, width: i32::MAX, height: i32::MAX };
        send(&mut state, client, far, None);
        assert!(!state.damage.has_any());

        let huge = Request::Damage { surface, x: -200, y: -200, width: i32::MAX, height: i32::MAX };
        send(&mut state, client, huge, None);
        assert_eq!(state.damage.regions(), &[state.screen]);
    }

    #[test]
    fn reattach_releases_prior_buffer() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 0, 0, 2, 2);
        let sid = state.surfaces.lookup_any(surface).unwrap();

        let attach = Request::AttachBuffer { surface, width: 2, height: 2, stride: 8, format: 0 };
        send(&mut state, client, attach.clone(), Some(shm(16)));
        send(&mut state, client, Request::Commit { surface }, None);
        assert!(state.surfaces.get(sid).unwrap().is_renderable());

        send(&mut state, client, attach, Some(shm(16)));
        let surf = state.surfaces.get(sid).unwrap();
        assert!(surf.buffer.is_some());
        assert!(!surf.committed);

        send(&mut state, client, Request::Commit { surface }, None);
        assert!(state.surfaces.get(sid).unwrap().is_renderable());
    }

    #[test]
    fn failed_attach_leaves_surface_uncommitted() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        let surface = create(&mut state, client, &mut peer, 0, 0, 2, 2);
        let sid = state.surfaces.lookup_any(surface).unwrap();

        let attach = Request::AttachBuffer { surface, width: 2, height: 2, stride: 8, format: 0 };
        send(&mut state, client, attach, Some(shm(16)));
        send(&mut state, client, Request::Commit { surface }, None);
        state.damage.reset();

        let bad_stride = Request::AttachBuffer { surface, width: 2, height: 2, stride: 1, format: 0 };
        send(&mut state, client, bad_stride, Some(shm(16)));
        let surf = state.surfaces.get(sid).unwrap();
        assert!(surf.buffer.is_none());
        assert!(!surf.committed);
        assert!(state.damage.has_any());

        send(&mut state, client, Request::Commit { surface }, None);
        assert!(!state.surfaces.get(sid).unwrap().is_renderable());
    }

    #[test]
    fn clipboard_set_outside_limits_is_ignored() {
        let mut state = compositor();
        let (client, mut peer) = connect(&mut state);
        drain_events(&mut peer);

        send(&mut state, client, Request::ClipboardSet { data: b"kept".to_vec() }, None);
        send(&mut state, client, Request::ClipboardSet { data: Vec::new() }, None);
        send(&mut state, client, Request::ClipboardSet { data: vec![b'x'; CLIPBOARD_MAX + 1] }, None);
        send(&mut state, client, Request::ClipboardGet, None);
        assert_eq!(drain_events(&mut peer), vec![Event::ClipboardData(b"kept".to_vec())]);
    }
}
