//! Message dispatcher - the mailbox protocol.
//!
//! One pass, in order:
//! 1. Resolve the receiver peripheral
//! 2. Check its pending bit (or status register when polling)
//! 3. Size-check the body and sender entries
//! 4. Read both entries
//! 5. Terminate both buffers at the reported sizes
//! 6. Route the body through the command table
//! 7. Delete both entries
//! 8. Re-arm the status register and clear only this slot's mask bit
//!
//! A failure in steps 1-4 is reported and ends the pass without touching
//! the store or the registers. The message stays put and is retried when
//! the receiver is next seen pending.

use log::{debug, info, warn};

use crate::buffer::MessageBuffer;
use crate::bus::{status, BusLayout, RegisterFile};
use crate::commands::CommandTable;
use crate::config::MailboxNames;
use crate::console::ProbeConsole;
use crate::error::{ProbeError, ProbeResult};
use crate::fs::MailboxStore;
use crate::registry::PeripheralRegistry;

/// What started the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Interrupt handler: consult the mask register.
    Interrupt,
    /// Polling loop: consult the receiver's status register.
    Poll,
}

/// A consumed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub body: String,
}

/// Result of a pass that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The receiver had nothing pending.
    NotPending,
    /// Message routed, deleted, and the slot re-armed. `matched` is false
    /// when the body was not a known command.
    Consumed { message: Message, matched: bool },
}

/// Marks the dispatcher busy for the duration of one pass.
struct HandlerGuard<'a> {
    flag: &'a mut bool,
}

impl<'a> HandlerGuard<'a> {
    fn enter(flag: &'a mut bool) -> ProbeResult<Self> {
        if *flag {
            return Err(ProbeError::Reentrant);
        }
        *flag = true;
        Ok(Self { flag })
    }
}

impl Drop for HandlerGuard<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

/// Report a protocol error on the console and in the log.
pub fn report<C: ProbeConsole + ?Sized>(console: &mut C, err: &ProbeError) {
    warn!("{}", err);
    console.println(&err.to_string());
}

pub struct MessageDispatcher {
    protocol: Protocol,
    busy: bool,
}

/// Everything a pass works on, apart from the busy flag.
struct Protocol {
    registry: PeripheralRegistry,
    receiver: String,
    names: MailboxNames,
    commands: CommandTable,
    body: MessageBuffer,
    sender: MessageBuffer,
}

impl MessageDispatcher {
    pub fn new(
        registry: PeripheralRegistry,
        receiver: impl Into<String>,
        names: MailboxNames,
        commands: CommandTable,
    ) -> Self {
        Self {
            protocol: Protocol {
                registry,
                receiver: receiver.into(),
                names,
                commands,
                body: MessageBuffer::new(),
                sender: MessageBuffer::new(),
            },
            busy: false,
        }
    }

    pub fn registry(&self) -> &PeripheralRegistry {
        &self.protocol.registry
    }

    pub fn commands_mut(&mut self) -> &mut CommandTable {
        &mut self.protocol.commands
    }

    /// True while a pass is running.
    pub fn is_handling(&self) -> bool {
        self.busy
    }

    /// Run one pass. Errors are reported before they are returned.
    pub fn dispatch<R, S, C>(
        &mut self,
        trigger: Trigger,
        bus: &mut R,
        store: &mut S,
        console: &mut C,
    ) -> ProbeResult<DispatchOutcome>
    where
        R: RegisterFile + ?Sized,
        S: MailboxStore + ?Sized,
        C: ProbeConsole + ?Sized,
    {
        let protocol = &mut self.protocol;
        let result = HandlerGuard::enter(&mut self.busy)
            .and_then(|_guard| protocol.pass(trigger, bus, store, console));
        if let Err(e) = &result {
            report(console, e);
        }
        result
    }
}

impl Protocol {
    fn pass<R, S, C>(
        &mut self,
        trigger: Trigger,
        bus: &mut R,
        store: &mut S,
        console: &mut C,
    ) -> ProbeResult<DispatchOutcome>
    where
        R: RegisterFile + ?Sized,
        S: MailboxStore + ?Sized,
        C: ProbeConsole + ?Sized,
    {
        let slot = self.registry.resolve(&self.receiver)?.slot_index;
        let layout = *self.registry.layout();
        let bit = BusLayout::mask_bit(slot);

        let pending = match trigger {
            Trigger::Interrupt => bus.read_register(layout.mask_address) & bit != 0,
            Trigger::Poll => bus.read_register(layout.status_address(slot)) == status::PENDING,
        };
        if !pending {
            return Ok(DispatchOutcome::NotPending);
        }
        console.println("Message received!");

        let body_len = checked_size(store, &self.names.body)?;
        let sender_len = checked_size(store, &self.names.sender)?;

        let body_read = self.body.read_from(store, &self.names.body);
        let sender_read = self.sender.read_from(store, &self.names.sender);
        if body_read.is_err() || sender_read.is_err() {
            return Err(ProbeError::StoreRead {
                body: body_read.err().map_or(0, |c| c.code()),
                sender: sender_read.err().map_or(0, |c| c.code()),
            });
        }
        self.body.terminate(body_len);
        self.sender.terminate(sender_len);

        let message = Message {
            sender: self.sender.as_text().into_owned(),
            body: self.body.as_text().into_owned(),
        };
        console.println(&format!("Command: {}", message.body));

        let matched = self.commands.invoke(&message.body, &message.sender);
        if matched {
            info!("ran {} for {}", message.body, message.sender);
        } else {
            report(console, &ProbeError::UnknownCommand(message.body.clone()));
        }

        // A surviving entry would be presented again, so the slot stays
        // pending until it is gone
        for name in [&self.names.body, &self.names.sender] {
            if !store.delete(name) && store.exists(name) {
                return Err(ProbeError::EntryNotDeleted(name.clone()));
            }
        }

        bus.write_register(layout.status_address(slot), status::READY);
        bus.write_register(layout.mask_address, bit);
        debug!("slot {} re-armed", slot);

        Ok(DispatchOutcome::Consumed { message, matched })
    }
}

/// Size of an entry that must exist and fit a message buffer.
fn checked_size<S: MailboxStore + ?Sized>(store: &S, name: &str) -> ProbeResult<usize> {
    let size = store
        .size_of(name)
        .ok_or_else(|| ProbeError::MissingEntry(name.to_string()))?;
    if !MessageBuffer::fits(size) {
        return Err(ProbeError::MessageTooLarge {
            entry: name.to_string(),
            size,
        });
    }
    Ok(size)
}
