//! Message receiver peripheral and its inbound queue.
//!
//! Inbound messages wait in a queue entry of the mailbox. The receiver
//! presents one message at a time as a body/sender entry pair, raises its
//! interrupt, and only advances once the firmware acknowledges it.
//!
//! Queue record layout:
//! - Byte 0: Sender length
//! - Sender bytes
//! - 2 bytes: Body length (little endian)
//! - Body bytes
//!
//! Senders and bodies longer than a message buffer holds are refused at
//! push time.

use log::{debug, warn};

use crate::buffer::MAX_MESSAGE_LEN;
use crate::bus::{offset, status, Peripheral};
use crate::config::MailboxNames;
use crate::error::{ProbeError, ProbeResult};
use crate::fs::{Mailbox, MailboxStore};

/// A message waiting in the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub sender: Vec<u8>,
    pub body: Vec<u8>,
}

fn encode_record(sender: &[u8], body: &[u8]) -> ProbeResult<Vec<u8>> {
    // Anything longer could never be consumed and would block the queue
    for (field, bytes) in [("sender", sender), ("body", body)] {
        if bytes.len() > MAX_MESSAGE_LEN {
            return Err(ProbeError::QueueRecord(format!(
                "{} is {} bytes, limit is {}",
                field,
                bytes.len(),
                MAX_MESSAGE_LEN
            )));
        }
    }

    let mut record = Vec::with_capacity(3 + sender.len() + body.len());
    record.push(sender.len() as u8);
    record.extend_from_slice(sender);
    record.extend_from_slice(&(body.len() as u16).to_le_bytes());
    record.extend_from_slice(body);
    Ok(record)
}

/// Decode the record at the front of `data`, with the bytes it used.
fn decode_record(data: &[u8]) -> Option<(InboundMessage, usize)> {
    let sender_len = usize::from(*data.first()?);
    let sender = data.get(1..1 + sender_len)?;
    let at = 1 + sender_len;
    let len_bytes = data.get(at..at + 2)?;
    let body_len = usize::from(u16::from_le_bytes([len_bytes[0], len_bytes[1]]));
    let body = data.get(at + 2..at + 2 + body_len)?;
    let message = InboundMessage {
        sender: sender.to_vec(),
        body: body.to_vec(),
    };
    Some((message, at + 2 + body_len))
}

/// Handle onto the inbound queue entry.
#[derive(Clone)]
pub struct MessageQueue {
    mailbox: Mailbox,
    entry: String,
}

impl MessageQueue {
    pub fn new(mailbox: Mailbox, entry: impl Into<String>) -> Self {
        Self {
            mailbox,
            entry: entry.into(),
        }
    }

    /// Append a message to the tail of the queue.
    pub fn push(&self, sender: &str, body: &[u8]) -> ProbeResult<()> {
        let record = encode_record(sender.as_bytes(), body)?;
        self.mailbox.with_store(|store| {
            let mut data = store.load(&self.entry).unwrap_or_default();
            data.extend_from_slice(&record);
            store.write(&self.entry, &data)
        })??;
        debug!("queued {} byte message from {}", body.len(), sender);
        Ok(())
    }

    /// Remove and return the head of the queue.
    ///
    /// A queue that fails to decode is discarded as a whole.
    pub fn pop(&self) -> ProbeResult<Option<InboundMessage>> {
        self.mailbox.with_store(|store| {
            let Some(data) = store.load(&self.entry) else {
                return Ok(None);
            };
            match decode_record(&data) {
                Some((message, used)) => {
                    if used == data.len() {
                        store.delete(&self.entry);
                    } else {
                        store.write(&self.entry, &data[used..])?;
                    }
                    Ok(Some(message))
                }
                None => {
                    store.delete(&self.entry);
                    Err(ProbeError::QueueRecord(format!(
                        "corrupt queue entry {} ({} bytes dropped)",
                        self.entry,
                        data.len()
                    )))
                }
            }
        })?
    }

    /// Number of whole records in the queue.
    pub fn len(&self) -> usize {
        let data = self.mailbox.load(&self.entry).unwrap_or_default();
        let mut rest = data.as_slice();
        let mut count = 0;
        while let Some((_, used)) = decode_record(rest) {
            rest = &rest[used..];
            count += 1;
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        !self.mailbox.exists(&self.entry)
    }
}

/// Receiver peripheral that presents queued messages to the firmware.
pub struct MessageReceiver {
    name: String,
    mailbox: Mailbox,
    names: MailboxNames,
    queue: MessageQueue,
    /// A message is presented and not yet acknowledged.
    presented: bool,
}

impl MessageReceiver {
    pub const DEFAULT_NAME: &'static str = "MSGRECV";

    pub fn new(name: impl Into<String>, mailbox: Mailbox, names: MailboxNames) -> Self {
        let queue = MessageQueue::new(mailbox.clone(), names.queue.clone());
        Self {
            name: name.into(),
            mailbox,
            names,
            queue,
            presented: false,
        }
    }

    /// Handle for pushing inbound messages.
    pub fn queue(&self) -> MessageQueue {
        self.queue.clone()
    }

    /// Move the queue head into the body/sender entries.
    fn present_next(&mut self) -> ProbeResult<bool> {
        let Some(message) = self.queue.pop()? else {
            return Ok(false);
        };
        self.mailbox.replace(&self.names.sender, &message.sender)?;
        self.mailbox.replace(&self.names.body, &message.body)?;
        Ok(true)
    }
}

impl Peripheral for MessageReceiver {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, off: u16) -> u16 {
        match off {
            offset::STATUS if self.mailbox.exists(&self.names.body) => status::PENDING,
            _ => status::EMPTY,
        }
    }

    fn write(&mut self, off: u16, value: u16) {
        if off == offset::STATUS && value == status::READY {
            debug!("[{}] ack", self.name);
            self.presented = false;
        }
    }

    fn tick(&mut self) -> bool {
        if self.presented {
            return false;
        }
        // An entry left in place (or placed directly) is presented again
        if self.mailbox.exists(&self.names.body) {
            self.presented = true;
            return true;
        }
        match self.present_next() {
            Ok(loaded) => {
                self.presented = loaded;
                loaded
            }
            Err(e) => {
                warn!("[{}] {}", self.name, e);
                false
            }
        }
    }
}
