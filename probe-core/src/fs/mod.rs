//! Mailbox storage for the probe.
//!
//! - `MailboxStore`: the store contract (size/read/delete over named entries)
//! - `MemoryStore`: In-memory implementation
//! - `Mailbox`: Shared handle onto one store

mod mailbox;
mod mailbox_store;
mod memory_store;

pub use mailbox::Mailbox;
pub use mailbox_store::{normalize_name, MailboxStore, StoreCode};
pub use memory_store::MemoryStore;
