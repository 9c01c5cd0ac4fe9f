//! Space Probe Mailbox Firmware Core
//!
//! This crate provides the firmware and simulated hardware of a probe that
//! takes commands from the ground through a memory-mapped message receiver:
//! - Peripheral bus with a write-one-to-clear interrupt mask
//! - Mailbox store holding the presented message as named entries
//! - Message dispatcher routing command text to handlers
//! - Interrupt-driven and polling run loops
//!
//! # Architecture
//!
//! The firmware is layered over a few traits:
//! - `RegisterFile`: Bus-visible register reads and writes
//! - `MailboxStore`: Size/read/delete over named mailbox entries
//! - `ProbeConsole`: Text output
//! - `Idle`: How the run loop waits between passes
//! - `Probe`: Integrates the bus, mailbox and dispatcher

pub mod buffer;
pub mod bus;
pub mod commands;
pub mod comms;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod fs;
pub mod peripherals;
pub mod probe;
pub mod registry;
pub mod run_loop;
pub mod uplink;

pub use buffer::MessageBuffer;
pub use bus::{BusLayout, NamedPeripheral, Peripheral, RegisterFile, SimulatedBus};
pub use commands::{CommandHandler, CommandTable, TAKE_PICTURE};
pub use comms::{decode_rgb332, Envelope, MessageBus};
pub use config::{FrameConfig, MailboxNames, ProbeConfig, RunModeKind};
pub use console::{HeadlessConsole, ProbeConsole};
pub use dispatcher::{DispatchOutcome, Message, MessageDispatcher, Trigger};
pub use error::{ProbeError, ProbeResult};
pub use fs::{normalize_name, Mailbox, MailboxStore, MemoryStore, StoreCode};
pub use peripherals::{InboundMessage, MessageQueue, MessageReceiver};
pub use probe::Probe;
pub use registry::PeripheralRegistry;
pub use run_loop::{Idle, RunMode, RunStats, ScriptedIdle, Wake};
pub use uplink::{CameraUplink, CaptureAction, FrameSource, RecordingCapture, TestPattern};
