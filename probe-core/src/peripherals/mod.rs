//! Simulated probe peripherals.

mod receiver;

pub use receiver::{InboundMessage, MessageQueue, MessageReceiver};
