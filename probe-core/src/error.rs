//! Error types for the probe firmware.

use thiserror::Error;

/// Errors reported by the probe firmware and its simulated hardware.
///
/// Apart from a missing receiver at startup, none of these stop the run
/// loop: they are reported and the probe goes back to idling.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Peripheral not found: {0}")]
    PeripheralNotFound(String),

    #[error("Message too large: {entry} is {size} bytes")]
    MessageTooLarge { entry: String, size: usize },

    #[error("Mailbox entry missing: {0}")]
    MissingEntry(String),

    #[error("Store read failed (body code {body}, sender code {sender})")]
    StoreRead { body: i32, sender: i32 },

    #[error("Mailbox entry not deleted: {0}")]
    EntryNotDeleted(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Dispatcher re-entered while handling an interrupt")]
    Reentrant,

    #[error("Queue record rejected: {0}")]
    QueueRecord(String),

    #[error("Frame size mismatch: {len} bytes for {width}x{height}")]
    FrameSize { len: usize, width: usize, height: usize },

    #[error("Frame too large: {width}x{height}")]
    FrameTooLarge { width: usize, height: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;
