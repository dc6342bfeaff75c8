//! Client connections and their registry

use std::collections::VecDeque;
use std::io::{self, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::net::UnixStream;

use bytes::{Buf, BytesMut};

use crate::compositor::arena::{Arena, Handle};
use crate::error::CompositorError;
use crate::protocol::fd::recv_with_fds;
use crate::protocol::{Event, FrameDecoder, Request};

/// Descriptors a client may have in flight before it is considered abusive
const MAX_PENDING_FDS: usize = 8;

const READ_CHUNK: usize = 4096;

/// Unsent event bytes a client may accumulate before it is dropped
pub const MAX_PENDING_OUTPUT: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub(crate) Handle);

/// A decoded request plus the descriptor that travelled with it, if any
#[derive(Debug)]
pub struct Incoming {
    pub request: Request,
    pub fd: Option<OwnedFd>,
}

#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub requests: Vec<Incoming>,
    /// Peer hung up after sending `requests`
    pub closed: bool,
}

pub struct Client {
    stream: UnixStream,
    decoder: FrameDecoder,
    fds: VecDeque<OwnedFd>,
    /// Encoded events the socket has not accepted yet
    outgoing: BytesMut,
}

impl Client {
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
            fds: VecDeque::new(),
            outgoing: BytesMut::new(),
        }
    }

    /// Queue one event and push as much as the socket takes without blocking.
    ///
    /// Fails once the peer has left more than `MAX_PENDING_OUTPUT` bytes unread.
    pub fn send(&mut self, event: &Event) -> io::Result<()> {
        self.outgoing.extend_from_slice(&event.encode());
        self.flush()?;
        if self.outgoing.len() > MAX_PENDING_OUTPUT {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("{} bytes of events left unread", self.outgoing.len()),
            ));
        }
        Ok(())
    }

    /// Write queued events until the socket would block
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.outgoing.is_empty() {
            match self.stream.write(&self.outgoing) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.outgoing.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn pending_output(&self) -> usize {
        self.outgoing.len()
    }

    /// Drain everything the socket has queued and decode complete requests.
    ///
    /// AttachBuffer requests are paired with descriptors in arrival order.
    pub fn read_requests(&mut self) -> Result<ReadOutcome, CompositorError> {
        let mut outcome = ReadOutcome::default();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let mut received = Vec::new();
            match recv_with_fds(self.stream.as_fd(), &mut chunk, &mut received) {
                Ok(0) => {
                    outcome.closed = true;
                    break;
                }
                Ok(n) => {
                    self.fds.extend(received);
                    self.decoder.extend(&chunk[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
            if self.fds.len() > MAX_PENDING_FDS {
                return Err(CompositorError::ProtocolViolation(format!(
                    "{} descriptors sent without matching requests",
                    self.fds.len()
                )));
            }
        }

        while let Some(frame) = self
            .decoder
            .next_frame()
            .map_err(|e| CompositorError::ProtocolViolation(e.to_string()))?
        {
            let request =
                Request::decode(&frame).map_err(|e| CompositorError::ProtocolViolation(e.to_string()))?;
            let fd = match request {
                Request::AttachBuffer { .. } => self.fds.pop_front(),
                _ => None,
            };
            outcome.requests.push(Incoming { request, fd });
        }
        Ok(outcome)
    }
}

pub struct ClientRegistry {
    arena: Arena<Client>,
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self { arena: Arena::with_capacity(capacity) }
    }

    /// Retry queued output everywhere; returns the clients whose sockets failed
    pub fn flush_all(&mut self) -> Vec<ClientId> {
        self.arena
            .iter_mut()
            .filter_map(|(handle, client)| client.flush().err().map(|_| ClientId(handle)))
            .collect()
    }

    pub fn insert(&mut self, client: Client) -> Result<ClientId, CompositorError> {
        self.arena
            .insert(client)
            .map(ClientId)
            .map_err(|_| CompositorError::CapacityExceeded("client"))
    }

    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.arena.remove(id.0)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.arena.get_mut(id.0)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.arena.contains(id.0)
    }

    pub fn is_full(&self) -> bool {
        self.arena.is_full()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}
