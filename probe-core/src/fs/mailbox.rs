//! Shared mailbox - one store seen by the receiver peripheral and firmware.
//!
//! The receiver peripheral writes incoming messages into the mailbox while
//! the dispatcher reads and deletes them. Both hold a `Mailbox` handle onto
//! the same store.

use std::sync::{Arc, RwLock};

use log::trace;

use super::mailbox_store::{MailboxStore, StoreCode};
use super::memory_store::MemoryStore;
use crate::error::{ProbeError, ProbeResult};

/// Shared mailbox handle.
///
/// Clone is cheap (just clones the Arc); every clone sees the same entries.
#[derive(Clone)]
pub struct Mailbox {
    inner: Arc<RwLock<Box<dyn MailboxStore>>>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl Mailbox {
    /// Wrap a store in a shared handle.
    pub fn new(store: impl MailboxStore + 'static) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Box::new(store))),
        }
    }

    /// Replace the content of an entry atomically with respect to other handles.
    pub fn replace(&self, name: &str, data: &[u8]) -> ProbeResult<()> {
        let mut inner = self.inner.write().map_err(|_| ProbeError::LockPoisoned)?;
        trace!("mailbox write {} ({} bytes)", name, data.len());
        inner.write(name, data)
    }

    /// Remove an entry through a shared handle.
    pub fn remove(&self, name: &str) -> ProbeResult<bool> {
        let mut inner = self.inner.write().map_err(|_| ProbeError::LockPoisoned)?;
        trace!("mailbox delete {}", name);
        Ok(inner.delete(name))
    }

    /// Run `f` against the store with the write lock held.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut dyn MailboxStore) -> T) -> ProbeResult<T> {
        let mut inner = self.inner.write().map_err(|_| ProbeError::LockPoisoned)?;
        Ok(f(inner.as_mut()))
    }
}

impl MailboxStore for Mailbox {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.read().ok()?.load(name)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> ProbeResult<()> {
        self.replace(name, data)
    }

    fn delete(&mut self, name: &str) -> bool {
        self.remove(name).unwrap_or(false)
    }

    fn list(&self) -> Vec<String> {
        match self.inner.read() {
            Ok(inner) => inner.list(),
            Err(_) => vec![],
        }
    }

    fn size_of(&self, name: &str) -> Option<usize> {
        self.inner.read().ok()?.size_of(name)
    }

    fn read(&self, name: &str, dest: &mut [u8]) -> Result<(), StoreCode> {
        let inner = self.inner.read().map_err(|_| StoreCode::LOCK_POISONED)?;
        inner.read(name, dest)
    }
}
