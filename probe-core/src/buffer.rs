//! Bounded, length-tracked message buffers.

use std::borrow::Cow;
use std::fmt;

use crate::fs::{MailboxStore, StoreCode};

/// Buffer capacity in bytes, including room for a terminator.
pub const MESSAGE_CAPACITY: usize = 256;

/// Largest entry that fits: capacity minus the terminator slot.
pub const MAX_MESSAGE_LEN: usize = MESSAGE_CAPACITY - 2;

/// Fixed-capacity byte buffer that only exposes the length it was given.
///
/// The store hands back raw bytes without a terminator, so the length
/// always comes from the size query, never from scanning for a delimiter.
#[derive(Clone)]
pub struct MessageBuffer {
    bytes: [u8; MESSAGE_CAPACITY],
    len: usize,
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self {
            bytes: [0; MESSAGE_CAPACITY],
            len: 0,
        }
    }

    /// True if an entry of `size` bytes fits with room for the terminator.
    pub fn fits(size: usize) -> bool {
        size < MESSAGE_CAPACITY - 1
    }

    /// Read an entry from the store. The buffer is left empty on failure.
    pub fn read_from<S: MailboxStore + ?Sized>(&mut self, store: &S, name: &str) -> Result<(), StoreCode> {
        self.len = 0;
        store.read(name, &mut self.bytes[..MESSAGE_CAPACITY - 1])
    }

    /// Set the valid length as reported by the store and terminate there.
    pub fn terminate(&mut self, len: usize) {
        let len = len.min(MESSAGE_CAPACITY - 1);
        self.bytes[len] = 0;
        self.len = len;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Content as text; invalid UTF-8 is replaced.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageBuffer").field(&self.as_text()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryStore;

    #[test]
    fn test_fits_bound() {
        assert!(MessageBuffer::fits(0));
        assert!(MessageBuffer::fits(254));
        assert!(!MessageBuffer::fits(255));
        assert_eq!(MAX_MESSAGE_LEN, 254);
    }

    #[test]
    fn test_length_comes_from_terminate() {
        let store = MemoryStore::with_entries([("inbox.msg", b"TAKE_PICTURE".to_vec())]);
        let mut buf = MessageBuffer::new();

        buf.read_from(&store, "INBOX.MSG").unwrap();
        assert!(buf.is_empty());

        buf.terminate(12);
        assert_eq!(buf.as_text(), "TAKE_PICTURE");
    }

    #[test]
    fn test_reuse_does_not_leak_previous_content() {
        let mut store = MemoryStore::with_entries([("inbox.msg", b"LONGER_TEXT".to_vec())]);
        let mut buf = MessageBuffer::new();
        buf.read_from(&store, "INBOX.MSG").unwrap();
        buf.terminate(11);

        store.add_entry("inbox.msg", b"HI".to_vec());
        buf.read_from(&store, "INBOX.MSG").unwrap();
        buf.terminate(2);
        assert_eq!(buf.as_bytes(), b"HI");
    }

    #[test]
    fn test_read_failure_reports_code() {
        let store = MemoryStore::new();
        let mut buf = MessageBuffer::new();
        assert_eq!(buf.read_from(&store, "INBOX.MSG"), Err(StoreCode::NOT_FOUND));
    }
}
