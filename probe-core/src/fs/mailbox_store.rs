//! MailboxStore trait - the probe's mailbox filesystem contract.

use crate::error::ProbeResult;

/// Store-defined status code for a failed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCode(pub i32);

impl StoreCode {
    /// Entry does not exist.
    pub const NOT_FOUND: StoreCode = StoreCode(-1);
    /// Destination buffer is smaller than the entry.
    pub const OVERFLOW: StoreCode = StoreCode(-2);
    /// Shared store lock was poisoned by a panicking writer.
    pub const LOCK_POISONED: StoreCode = StoreCode(-3);

    pub fn code(self) -> i32 {
        self.0
    }
}

/// Flat key-value store holding mailbox entries such as `INBOX.MSG`.
/// Entry names are normalized with `normalize_name`.
pub trait MailboxStore: Send + Sync {
    /// Full content of an entry. Returns None if it does not exist.
    fn load(&self, name: &str) -> Option<Vec<u8>>;

    /// Create or replace an entry.
    fn write(&mut self, name: &str, data: &[u8]) -> ProbeResult<()>;

    /// Delete an entry. Returns true if it existed.
    fn delete(&mut self, name: &str) -> bool;

    /// List all entry names.
    fn list(&self) -> Vec<String>;

    /// Byte length of an entry, or None if it does not exist.
    fn size_of(&self, name: &str) -> Option<usize> {
        self.load(name).map(|data| data.len())
    }

    /// Copy an entry's raw bytes to the front of `dest`.
    ///
    /// Nothing is written past the entry's length, and no terminator is
    /// added; callers track the length themselves.
    fn read(&self, name: &str, dest: &mut [u8]) -> Result<(), StoreCode> {
        let data = self.load(name).ok_or(StoreCode::NOT_FOUND)?;
        let slot = dest.get_mut(..data.len()).ok_or(StoreCode::OVERFLOW)?;
        slot.copy_from_slice(&data);
        Ok(())
    }

    /// Check if an entry exists.
    fn exists(&self, name: &str) -> bool {
        self.size_of(name).is_some()
    }
}

/// Normalize an entry name.
///
/// - Uppercases everything
/// - Strips leading dots
/// - Drops anything that is not alphanumeric, `.`, `_`, `-` or `$`
///
/// Names are never shortened, so distinct names stay distinct unless
/// they differ only in case or dropped characters.
///
/// # Examples
/// ```
/// use probe_core::normalize_name;
/// assert_eq!(normalize_name("inbox.msg"), "INBOX.MSG");
/// assert_eq!(normalize_name(".msgq.sys"), "MSGQ.SYS");
/// assert_eq!(normalize_name("mailbox_sender"), "MAILBOX_SENDER");
/// ```
pub fn normalize_name(name: &str) -> String {
    let out: String = name
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || "._-$".contains(*c))
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}
