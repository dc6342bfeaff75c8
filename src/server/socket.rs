//! Listening socket

use std::env;
use std::fs;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, FromRawFd};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::CompositorError;

/// First descriptor handed over by a socket-activating supervisor
const LISTEN_FDS_START: i32 = 3;

pub struct Listener {
    listener: UnixListener,
    /// Socket file we created and remove on drop; `None` when activated
    path: Option<PathBuf>,
}

impl Listener {
    /// Use an inherited socket if one was passed, otherwise bind `path`
    pub fn open(path: &Path) -> Result<Self, CompositorError> {
        if let Some(listener) = Self::from_activation()? {
            return Ok(listener);
        }
        Self::bind(path)
    }

    fn from_activation() -> Result<Option<Self>, CompositorError> {
        let Ok(count) = env::var("LISTEN_FDS") else {
            return Ok(None);
        };
        if let Ok(pid) = env::var("LISTEN_PID") {
            if pid.trim() != std::process::id().to_string() {
                return Ok(None);
            }
        }
        match count.trim().parse::<u32>() {
            Ok(n) if n >= 1 => {}
            _ => {
                warn!("Ignoring LISTEN_FDS={}", count);
                return Ok(None);
            }
        }

        // SAFETY: the supervisor passed ownership of fd 3 to this process.
        let listener = unsafe { UnixListener::from_raw_fd(LISTEN_FDS_START) };
        listener.set_nonblocking(true)?;
        info!("Using inherited listening socket");
        Ok(Some(Self { listener, path: None }))
    }

    pub fn bind(path: &Path) -> Result<Self, CompositorError> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_socket() => {
                info!("Removing stale socket {:?}", path);
                fs::remove_file(path)?;
            }
            Ok(_) => {
                return Err(CompositorError::DeviceUnavailable(format!(
                    "{:?} exists and is not a socket",
                    path
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;
        info!("Listening on {:?}", path);
        Ok(Self {
            listener,
            path: Some(path.to_path_buf()),
        })
    }

    /// Next pending connection, if any
    pub fn accept(&self) -> io::Result<Option<UnixStream>> {
        match self.listener.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                Ok(Some(stream))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.listener.as_fd()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = fs::remove_file(path);
        }
    }
}
