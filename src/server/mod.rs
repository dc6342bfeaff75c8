//! CDP protocol server
//!
//! Owns client connections, the surfaces they create and the listening
//! socket. Requests mutate the shared `Compositor` through `handlers`.

pub mod client;
pub mod handlers;
pub mod socket;
pub mod surface;

use std::os::unix::net::UnixStream;

use log::{info, warn};

use crate::compositor::Compositor;
use crate::error::CompositorError;
use crate::protocol::wire::PROTOCOL_VERSION;
use crate::protocol::Event;

pub use client::{Client, ClientId, ClientRegistry, Incoming};
pub use handlers::handle_request;
pub use socket::Listener;
pub use surface::{ShmBuffer, Surface, SurfaceId, SurfaceTable};

/// Register a new connection and greet it with the screen size
pub fn accept_client(state: &mut Compositor, stream: UnixStream) -> Result<ClientId, CompositorError> {
    if state.clients.is_full() {
        return Err(CompositorError::CapacityExceeded("client"));
    }
    stream.set_nonblocking(true)?;
    let id = state.clients.insert(Client::new(stream))?;
    state.send_to_client(
        id,
        Event::Welcome {
            width: state.screen.w as u32,
            height: state.screen.h as u32,
            version: PROTOCOL_VERSION,
        },
    );
    info!("Client connected ({} total)", state.clients.len());
    Ok(id)
}

/// Read and apply everything a readable client has sent.
///
/// Returns `false` once the client is gone.
pub fn dispatch_client(state: &mut Compositor, id: ClientId) -> bool {
    let result = match state.clients.get_mut(id) {
        Some(client) => client.read_requests(),
        None => return false,
    };

    match result {
        Ok(outcome) => {
            for incoming in outcome.requests {
                if !state.clients.contains(id) {
                    return false;
                }
                handle_request(state, id, incoming);
            }
            if outcome.closed {
                state.disconnect_client(id);
                return false;
            }
            state.clients.contains(id)
        }
        Err(e) if e.is_fatal_for_client() => {
            warn!("Dropping client: {}", e);
            state.disconnect_client(id);
            false
        }
        Err(e) => {
            warn!("Client read failed: {}", e);
            true
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Read};
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;

    use super::*;
    use crate::protocol::{FrameDecoder, Request};

    pub fn connect(state: &mut Compositor) -> (ClientId, UnixStream) {
        let (server, peer) = UnixStream::pair().unwrap();
        let id = accept_client(state, server).unwrap();
        (id, peer)
    }

    pub fn send(state: &mut Compositor, client: ClientId, request: Request, fd: Option<OwnedFd>) {
        handle_request(state, client, Incoming { request, fd });
    }

    /// Create a surface and return its wire id
    pub fn create_surface(
        state: &mut Compositor,
        client: ClientId,
        peer: &mut UnixStream,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> u32 {
        send(state, client, Request::CreateSurface { x, y, width, height }, None);
        drain_events(peer)
            .into_iter()
            .rev()
            .find_map(|e| match e {
                Event::SurfaceId { surface } => Some(surface),
                _ => None,
            })
            .expect("no SurfaceId reply")
    }

    /// Every event queued on the client side of the connection
    pub fn drain_events(peer: &mut UnixStream) -> Vec<Event> {
        peer.set_nonblocking(true).unwrap();
        let mut decoder = FrameDecoder::new();
        let mut chunk = [0u8; 4096];
        loop {
            match peer.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => decoder.extend(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("read failed: {}", e),
            }
        }
        peer.set_nonblocking(false).unwrap();

        let mut events = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            events.push(Event::decode(&frame).unwrap());
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::fd::AsFd;

    use super::testing::{self, connect, drain_events};
    use super::*;
    use crate::backend::InputEvent;
    use crate::compositor::input;
    use crate::config::Config;
    use crate::protocol::fd::send_with_fd;
    use crate::protocol::Request;

    #[test]
    fn welcome_carries_screen_size() {
        let mut state = Compositor::new(&Config::default());
        let (_, mut peer) = connect(&mut state);
        assert_eq!(
            drain_events(&mut peer),
            vec![Event::Welcome { width: 1024, height: 768, version: 1 }]
        );
    }

    #[test]
    fn connections_beyond_capacity_are_refused() {
        let mut config = Config::default();
        config.limits.max_clients = 1;
        let mut state = Compositor::new(&config);
        connect(&mut state);
        let (server, _peer) = UnixStream::pair().unwrap();
        assert!(matches!(
            accept_client(&mut state, server),
            Err(CompositorError::CapacityExceeded("client"))
        ));
    }

    #[test]
    fn requests_flow_through_the_socket() {
        let mut state = Compositor::new(&Config::default());
        let (id, mut peer) = connect(&mut state);
        peer.write_all(&Request::CreateSurface { x: 0, y: 0, width: 2, height: 2 }.encode()).unwrap();

        let mut shm = tempfile::tempfile().unwrap();
        shm.write_all(&[0u8; 16]).unwrap();
        let attach = Request::AttachBuffer { surface: 1, width: 2, height: 2, stride: 8, format: 0 };
        send_with_fd(peer.as_fd(), &attach.encode(), shm.as_fd()).unwrap();
        peer.write_all(&Request::Commit { surface: 1 }.encode()).unwrap();

        assert!(dispatch_client(&mut state, id));
        let sid = state.surfaces.lookup(1, id).unwrap();
        assert!(state.surfaces.get(sid).unwrap().is_renderable());
        assert!(drain_events(&mut peer).contains(&Event::SurfaceId { surface: 1 }));
    }

    #[test]
    fn malformed_message_disconnects_and_cleans_up() {
        let mut state = Compositor::new(&Config::default());
        let (id, mut peer) = connect(&mut state);
        peer.write_all(&Request::CreateSurface { x: 0, y: 0, width: 20, height: 20 }.encode()).unwrap();
        assert!(dispatch_client(&mut state, id));
        let window = state.windows.topmost().unwrap();

        // Commit with a payload one byte short
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 0, 0]);
        peer.write_all(&bytes).unwrap();

        assert!(!dispatch_client(&mut state, id));
        assert!(!state.clients.contains(id));
        assert!(state.surfaces.is_empty());
        assert!(!state.windows.get(window).unwrap().visible);
        assert!(state.damage.is_full());
    }

    #[test]
    fn hangup_releases_surfaces() {
        let mut state = Compositor::new(&Config::default());
        let (id, mut peer) = connect(&mut state);
        peer.write_all(&Request::CreateSurface { x: 0, y: 0, width: 20, height: 20 }.encode()).unwrap();
        peer.write_all(&Request::Frame { surface: 1 }.encode()).unwrap();
        drop(peer);

        assert!(!dispatch_client(&mut state, id));
        assert!(state.surfaces.owned_by(id).is_empty());
        assert!(state.surfaces.take_frame_requests().is_empty());
        assert_eq!(state.disconnected, vec![id]);
    }

    #[test]
    fn client_that_stops_reading_is_dropped_not_waited_on() {
        let mut state = Compositor::new(&Config::default());
        let (id, mut peer) = testing::connect(&mut state);
        let surface = testing::create_surface(&mut state, id, &mut peer, 100, 100, 200, 200);
        let window = state.surfaces.get(state.surfaces.lookup(surface, id).unwrap()).unwrap().window;
        state.focus_and_raise(window);

        // The peer never reads again; every motion becomes a queued event
        for i in 0..200_000 {
            let dx = if i % 2 == 0 { 1 } else { -1 };
            input::handle_event(&mut state, InputEvent::PointerRelative { dx, dy: 0 });
            if !state.clients.contains(id) {
                break;
            }
        }

        assert!(!state.clients.contains(id));
        assert!(state.surfaces.is_empty());
        assert_eq!(state.focus, None);
        assert_eq!(state.disconnected, vec![id]);
        drop(peer);
    }
}
