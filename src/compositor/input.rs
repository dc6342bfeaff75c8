//! Input router
//!
//! Turns abstract device events into window management actions and
//! protocol events. Pointer and key events only ever reach one client:
//! the hovered panel's or the focused window's.

use log::debug;

use super::geometry::{Point, Rect};
use super::grabs::{Grab, MoveSurfaceGrab, ResizeSurfaceGrab};
use super::keymap::{self, Modifiers, KEY_BACKSPACE, KEY_ENTER, KEY_ESC};
use super::state::Compositor;
use super::window::{ControlButton, Region, WindowId};
use crate::backend::{InputEvent, KeyState};
use crate::protocol::Event;

pub const BTN_LEFT: u16 = 0x110;

/// Edge length of the square damaged around the cursor
pub const CURSOR_SIZE: i32 = 12;

#[derive(Debug, Clone)]
pub struct InputState {
    pub pointer: Point,
    pub modifiers: Modifiers,
    pub grab: Option<Grab>,
}

impl InputState {
    pub fn new(screen: Rect) -> Self {
        Self {
            pointer: Point::new(screen.x + screen.w / 2, screen.y + screen.h / 2),
            modifiers: Modifiers::default(),
            grab: None,
        }
    }
}

fn cursor_rect(p: Point) -> Rect {
    Rect::new(p.x, p.y, CURSOR_SIZE, CURSOR_SIZE)
}

pub fn handle_event(state: &mut Compositor, event: InputEvent) {
    match event {
        InputEvent::PointerRelative { dx, dy } => {
            let target = state.input.pointer.offset(dx, dy);
            pointer_motion(state, target);
        }
        InputEvent::PointerAbsolute { x, y, max_x, max_y } => {
            let screen = state.screen;
            let scale = |value: i32, max: i32, extent: i32| {
                if max <= 0 {
                    return 0;
                }
                (value as i64 * (extent - 1) as i64 / max as i64) as i32
            };
            let target = Point::new(scale(x, max_x, screen.w), scale(y, max_y, screen.h));
            pointer_motion(state, target);
        }
        InputEvent::Button { code, pressed } => pointer_button(state, code, pressed),
        InputEvent::Key { code, state: key_state } => {
            let mods = state.input.modifiers;
            state.input.modifiers = key(state, code, key_state, mods);
        }
    }
}

fn pointer_motion(state: &mut Compositor, target: Point) {
    let screen = state.screen;
    let new = Point::new(
        target.x.clamp(screen.x, screen.right() - 1),
        target.y.clamp(screen.y, screen.bottom() - 1),
    );
    let old = state.input.pointer;
    if new == old {
        return;
    }
    state.input.pointer = new;
    state.add_damage(cursor_rect(old));
    state.add_damage(cursor_rect(new));

    if let Some(grab) = state.input.grab {
        let metrics = state.metrics;
        grab.motion(&mut state.windows, new, &metrics);
        state.add_full_damage();
        return;
    }

    let Some(target) = pointer_target(state, new) else {
        return;
    };
    let metrics = state.metrics;
    let Some(area) = state.windows.get(target).map(|w| w.client_area(&metrics)) else {
        return;
    };
    if let Some((sid, owner)) = state.window_surface(target) {
        state.send_to_client(
            owner,
            Event::PointerMotion {
                surface: sid.to_wire(),
                x: new.x - area.x,
                y: new.y - area.y,
            },
        );
    }
}

/// Hovered panel wins over the focused window
fn pointer_target(state: &Compositor, p: Point) -> Option<WindowId> {
    let hovered_panel = state
        .windows
        .hit_test(p)
        .filter(|id| state.windows.get(*id).map(|w| w.is_panel).unwrap_or(false));
    hovered_panel.or(state.focus)
}

fn forward_button(state: &mut Compositor, target: Option<WindowId>, code: u16, pressed: bool) {
    let Some((sid, owner)) = target.and_then(|id| state.window_surface(id)) else {
        return;
    };
    state.send_to_client(
        owner,
        Event::PointerButton {
            surface: sid.to_wire(),
            button: code as u32,
            state: pressed as u32,
        },
    );
}

fn pointer_button(state: &mut Compositor, code: u16, pressed: bool) {
    if code != BTN_LEFT {
        let target = pointer_target(state, state.input.pointer);
        forward_button(state, target, code, pressed);
        return;
    }
    if pressed {
        left_pressed(state);
    } else {
        left_released(state);
    }
}

fn left_pressed(state: &mut Compositor) {
    let p = state.input.pointer;
    let metrics = state.metrics;
    let Some(id) = state.windows.hit_test(p) else {
        state.set_focus(None);
        return;
    };
    let Some((is_panel, region, geometry)) = state
        .windows
        .get(id)
        .map(|w| (w.is_panel, w.classify(p, &metrics), w.geometry))
    else {
        return;
    };

    if is_panel {
        forward_button(state, Some(id), BTN_LEFT, true);
        return;
    }

    match region {
        Some(Region::Control(ControlButton::Close)) => {
            debug!("Close button pressed");
            state.close_window(id);
        }
        Some(Region::Control(ControlButton::Minimize)) => state.minimize(id),
        Some(Region::Control(ControlButton::Maximize)) => {
            state.focus_and_raise(id);
            state.toggle_maximize(id);
        }
        Some(Region::Resize(edge)) => {
            state.focus_and_raise(id);
            state.input.grab = Some(Grab::Resize(ResizeSurfaceGrab {
                window: id,
                edge,
                start: p,
                initial_geometry: geometry,
            }));
        }
        Some(Region::Titlebar) => {
            state.focus_and_raise(id);
            state.input.grab = Some(Grab::Move(MoveSurfaceGrab {
                window: id,
                start: p,
                initial_window_location: geometry.origin(),
            }));
        }
        Some(Region::Client) | None => {
            state.focus_and_raise(id);
            forward_button(state, Some(id), BTN_LEFT, true);
        }
    }
}

fn left_released(state: &mut Compositor) {
    match state.input.grab.take() {
        Some(Grab::Resize(grab)) => {
            state.send_configure(grab.window);
            state.add_full_damage();
        }
        Some(Grab::Move(_)) => state.add_full_damage(),
        None => {
            let target = pointer_target(state, state.input.pointer);
            forward_button(state, target, BTN_LEFT, false);
        }
    }
}

/// Route one key event; returns the modifier state for the next event
fn key(state: &mut Compositor, code: u16, key_state: KeyState, mods: Modifiers) -> Modifiers {
    if let Some(updated) = mods.update(code, key_state != KeyState::Released) {
        return updated;
    }
    if key_state == KeyState::Released {
        return mods;
    }
    if code == KEY_ESC {
        state.request_quit();
        return mods;
    }
    let Some(focus) = state.focus else {
        return mods;
    };

    let character = keymap::translate(code, mods);
    if let Some((sid, owner)) = state.window_surface(focus) {
        debug!("Key {} -> surface {}", code, sid.to_wire());
        state.send_to_client(
            owner,
            Event::Key {
                keycode: code as u32,
                state: key_state.to_wire(),
                character: character.unwrap_or(0) as u32,
                modifiers: mods.bits(),
            },
        );
        return mods;
    }

    if let Some(window) = state.windows.get_mut(focus) {
        match code {
            KEY_BACKSPACE => {
                window.text.pop();
            }
            KEY_ENTER => window.push_char(' '),
            _ => {
                if let Some(ch) = character {
                    window.push_char(ch as char);
                }
            }
        }
    }
    state.damage_window(focus);
    mods
}
