//! Error taxonomy shared by every compositor component

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum CompositorError {
    /// A fixed-capacity table (windows, surfaces, clients) is full
    CapacityExceeded(&'static str),
    /// A surface, window or client handle that no longer (or never) existed
    InvalidReference(String),
    /// Malformed or over-length protocol message; the connection is torn down
    ProtocolViolation(String),
    /// Shared memory transfer or mapping failed
    ResourceUnavailable(String),
    /// Display or input backend could not be initialized
    DeviceUnavailable(String),
    Io(io::Error),
}

impl fmt::Display for CompositorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositorError::CapacityExceeded(what) => write!(f, "{} table is full", what),
            CompositorError::InvalidReference(msg) => write!(f, "Invalid reference: {}", msg),
            CompositorError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            CompositorError::ResourceUnavailable(msg) => write!(f, "Resource unavailable: {}", msg),
            CompositorError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            CompositorError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CompositorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompositorError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CompositorError {
    fn from(e: io::Error) -> Self {
        CompositorError::Io(e)
    }
}

impl CompositorError {
    /// Errors that end the offending client's connection
    pub fn is_fatal_for_client(&self) -> bool {
        matches!(self, CompositorError::ProtocolViolation(_) | CompositorError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_table() {
        let err = CompositorError::CapacityExceeded("surface");
        assert_eq!(err.to_string(), "surface table is full");
    }

    #[test]
    fn only_protocol_and_io_errors_drop_clients() {
        assert!(CompositorError::ProtocolViolation("x".into()).is_fatal_for_client());
        assert!(CompositorError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal_for_client());
        assert!(!CompositorError::InvalidReference("x".into()).is_fatal_for_client());
        assert!(!CompositorError::ResourceUnavailable("x".into()).is_fatal_for_client());
    }
}
