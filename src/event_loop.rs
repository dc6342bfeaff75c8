//! Main event loop
//!
//! A single-threaded calloop reactor waits on the listening socket, every
//! input device and every client connection. Each readiness callback runs
//! to completion; after every dispatch the loop reaps dropped clients and
//! renders if anything was damaged.

use std::collections::HashMap;
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use calloop::generic::Generic;
use calloop::{EventLoop, Interest, LoopHandle, Mode, PostAction, RegistrationToken};
use log::{debug, error, info, warn};

use crate::backend::{DisplayBackend, InputEvent, InputSource};
use crate::compositor::{input, Compositor, Renderer};
use crate::error::CompositorError;
use crate::server::{self, ClientId, Listener};

/// Upper bound on one wait so rendering is never starved
const DISPATCH_TIMEOUT: Duration = Duration::from_millis(100);

fn loop_error(e: calloop::Error) -> CompositorError {
    CompositorError::DeviceUnavailable(format!("event loop: {}", e))
}

pub struct LoopData {
    pub state: Compositor,
    renderer: Renderer,
    backend: Box<dyn DisplayBackend>,
    listener: Listener,
    inputs: Vec<Box<dyn InputSource>>,
    client_tokens: HashMap<ClientId, RegistrationToken>,
    handle: LoopHandle<'static, LoopData>,
    /// Scratch buffer reused across device reads
    events: Vec<InputEvent>,
}

impl LoopData {
    fn new(
        state: Compositor,
        renderer: Renderer,
        backend: Box<dyn DisplayBackend>,
        listener: Listener,
        inputs: Vec<Box<dyn InputSource>>,
        handle: LoopHandle<'static, LoopData>,
    ) -> Self {
        Self {
            state,
            renderer,
            backend,
            listener,
            inputs,
            client_tokens: HashMap::new(),
            handle,
            events: Vec::new(),
        }
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok(Some(stream)) => self.register_client(stream),
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    break;
                }
            }
        }
    }

    fn register_client(&mut self, stream: UnixStream) {
        let fd = match stream.as_fd().try_clone_to_owned() {
            Ok(fd) => fd,
            Err(e) => {
                warn!("Failed to duplicate client socket: {}", e);
                return;
            }
        };
        let id = match server::accept_client(&mut self.state, stream) {
            Ok(id) => id,
            Err(e) => {
                warn!("Rejected connection: {}", e);
                return;
            }
        };

        let source = Generic::new(fd, Interest::READ, Mode::Level);
        let inserted = self.handle.insert_source(source, move |_, _, data: &mut LoopData| {
            if server::dispatch_client(&mut data.state, id) {
                return Ok(PostAction::Continue);
            }
            data.client_tokens.remove(&id);
            Ok(PostAction::Remove)
        });
        match inserted {
            Ok(token) => {
                self.client_tokens.insert(id, token);
            }
            Err(e) => {
                warn!("Failed to watch client socket: {}", e.error);
                self.state.disconnect_client(id);
            }
        }
    }

    /// Stop watching clients the compositor dropped outside their own callback
    fn reap_disconnected(&mut self) {
        for id in self.state.disconnected.drain(..) {
            if let Some(token) = self.client_tokens.remove(&id) {
                self.handle.remove(token);
            }
        }
    }

    /// Returns `false` when the device failed and should no longer be watched
    fn read_input(&mut self, index: usize) -> bool {
        let Some(source) = self.inputs.get_mut(index) else {
            return false;
        };
        let mut events = std::mem::take(&mut self.events);
        let result = source.read_events(&mut events);
        let name = source.name().to_string();

        for event in events.drain(..) {
            input::handle_event(&mut self.state, event);
        }
        self.events = events;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Input device {} failed: {}", name, e);
                false
            }
        }
    }

    fn render(&mut self) -> Result<(), CompositorError> {
        if self.renderer.render(&mut self.state, self.backend.as_mut())? {
            debug!("Frame presented");
        }
        Ok(())
    }
}

fn watch<F: AsFd + ?Sized>(fd: &F) -> Result<Generic<OwnedFd>, CompositorError> {
    let fd = fd.as_fd().try_clone_to_owned()?;
    Ok(Generic::new(fd, Interest::READ, Mode::Level))
}

/// Run until the quit key is pressed or the event loop fails
pub fn run(
    state: Compositor,
    renderer: Renderer,
    backend: Box<dyn DisplayBackend>,
    listener: Listener,
    inputs: Vec<Box<dyn InputSource>>,
) -> Result<(), CompositorError> {
    let mut event_loop: EventLoop<'static, LoopData> = EventLoop::try_new().map_err(loop_error)?;
    let handle = event_loop.handle();

    handle
        .insert_source(watch(&listener)?, |_, _, data: &mut LoopData| {
            data.accept_pending();
            Ok(PostAction::Continue)
        })
        .map_err(|e| loop_error(e.error))?;

    for (index, source) in inputs.iter().enumerate() {
        handle
            .insert_source(watch(source.as_ref())?, move |_, _, data: &mut LoopData| {
                if data.read_input(index) {
                    Ok(PostAction::Continue)
                } else {
                    Ok(PostAction::Remove)
                }
            })
            .map_err(|e| loop_error(e.error))?;
        info!("Watching input device {}", source.name());
    }

    let mut data = LoopData::new(state, renderer, backend, listener, inputs, handle);
    info!("Compositor running");

    while data.state.running {
        event_loop
            .dispatch(Some(DISPATCH_TIMEOUT), &mut data)
            .map_err(loop_error)?;
        data.state.flush_clients();
        data.reap_disconnected();
        data.render()?;
    }

    info!("Shutting down ({} clients connected)", data.state.clients.len());
    Ok(())
}
