//! In-memory mailbox store.

use std::collections::HashMap;

use super::mailbox_store::{normalize_name, MailboxStore};
use crate::error::ProbeResult;

/// Simple in-memory mailbox store.
#[derive(Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial entries.
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (normalize_name(k.as_ref()), v))
            .collect();
        Self { entries }
    }

    /// Add an entry (convenience method).
    pub fn add_entry(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.entries.insert(normalize_name(name), data.into());
    }
}

impl MailboxStore for MemoryStore {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        self.entries.get(&normalize_name(name)).cloned()
    }

    fn write(&mut self, name: &str, data: &[u8]) -> ProbeResult<()> {
        self.entries.insert(normalize_name(name), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> bool {
        self.entries.remove(&normalize_name(name)).is_some()
    }

    fn list(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn size_of(&self, name: &str) -> Option<usize> {
        self.entries.get(&normalize_name(name)).map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StoreCode;

    #[test]
    fn test_write_and_size() {
        let mut store = MemoryStore::new();
        store.write("INBOX.MSG", b"TAKE_PICTURE").unwrap();

        assert!(store.exists("INBOX.MSG"));
        assert!(store.exists("inbox.msg")); // Case insensitive
        assert_eq!(store.size_of("INBOX.MSG"), Some(12));
        assert_eq!(store.size_of("SENDER.MSG"), None);
    }

    #[test]
    fn test_read_into_larger_buffer() {
        let store = MemoryStore::with_entries([("sender.msg", b"Earth".to_vec())]);
        let mut buf = [0xAAu8; 8];

        store.read("SENDER.MSG", &mut buf).unwrap();
        assert_eq!(&buf[..5], b"Earth");
        // Bytes past the entry are left untouched
        assert_eq!(buf[5], 0xAA);
    }

    #[test]
    fn test_read_errors() {
        let store = MemoryStore::with_entries([("inbox.msg", vec![b'X'; 16])]);
        let mut small = [0u8; 4];

        assert_eq!(store.read("INBOX.MSG", &mut small), Err(StoreCode::OVERFLOW));
        assert_eq!(store.read("NOPE.MSG", &mut small), Err(StoreCode::NOT_FOUND));
    }

    #[test]
    fn test_delete_and_list() {
        let mut store = MemoryStore::new();
        store.add_entry("A.MSG", vec![1]);
        store.add_entry("B.MSG", vec![2]);

        assert!(store.delete("A.MSG"));
        assert!(!store.delete("A.MSG"));
        assert_eq!(store.list(), vec!["B.MSG".to_string()]);
    }
}
