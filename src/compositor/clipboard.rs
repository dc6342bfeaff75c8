//! Compositor-owned text clipboard shared between clients

use log::{debug, warn};

use crate::protocol::wire::CLIPBOARD_MAX;

const MAX_CLIPBOARD_BYTES: usize = CLIPBOARD_MAX;

#[derive(Debug, Default)]
pub struct Clipboard {
    data: Vec<u8>,
}

impl Clipboard {
    /// Replace the contents; empty and oversized payloads are ignored
    pub fn set(&mut self, data: &[u8]) {
        if data.is_empty() || data.len() > MAX_CLIPBOARD_BYTES {
            warn!(
                "Ignoring clipboard payload of {} bytes (limit {})",
                data.len(),
                MAX_CLIPBOARD_BYTES
            );
            return;
        }
        self.data.clear();
        self.data.extend_from_slice(data);
        debug!("Clipboard updated ({} bytes)", self.data.len());
    }

    pub fn get(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_previous_contents() {
        let mut clipboard = Clipboard::default();
        clipboard.set(b"first");
        clipboard.set(b"second");
        assert_eq!(clipboard.get(), b"second");
    }

    #[test]
    fn empty_and_oversized_payloads_keep_old_contents() {
        let mut clipboard = Clipboard::default();
        clipboard.set(b"kept");
        clipboard.set(b"");
        clipboard.set(&vec![b'x'; MAX_CLIPBOARD_BYTES + 1]);
        assert_eq!(clipboard.get(), b"kept");

        clipboard.set(&vec![b'y'; MAX_CLIPBOARD_BYTES]);
        assert_eq!(clipboard.get().len(), MAX_CLIPBOARD_BYTES);
    }
}
