//! Probe configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! describes the stock probe.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bus::BusLayout;
use crate::error::{ProbeError, ProbeResult};
use crate::fs::normalize_name;
use crate::peripherals::MessageReceiver;

/// How the run loop waits for work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunModeKind {
    /// Sleep until an interrupt, then dispatch from the handler.
    #[default]
    Interrupt,
    /// Read the receiver status register on a fixed cadence.
    Polling,
}

/// Mailbox entry names used by the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailboxNames {
    pub body: String,
    pub sender: String,
    pub queue: String,
}

impl MailboxNames {
    /// Reject names that land on the same store entry.
    pub fn validate(&self) -> ProbeResult<()> {
        let entries = [
            ("body", &self.body),
            ("sender", &self.sender),
            ("queue", &self.queue),
        ];
        for (i, (role, name)) in entries.iter().enumerate() {
            for (other_role, other) in &entries[i + 1..] {
                if normalize_name(name) == normalize_name(other) {
                    return Err(ProbeError::InvalidConfig(format!(
                        "mailbox {} entry {:?} and {} entry {:?} name the same entry",
                        role, name, other_role, other
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for MailboxNames {
    fn default() -> Self {
        Self {
            body: "INBOX.MSG".to_string(),
            sender: "SENDER.MSG".to_string(),
            queue: "MSGQ.SYS".to_string(),
        }
    }
}

/// Picture frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub width: usize,
    pub height: usize,
}

impl FrameConfig {
    /// Pixels (and RGB332 bytes) in one frame.
    pub fn pixel_count(&self) -> ProbeResult<usize> {
        self.width
            .checked_mul(self.height)
            .ok_or(ProbeError::FrameTooLarge {
                width: self.width,
                height: self.height,
            })
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
        }
    }
}

/// Top-level probe configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeConfig {
    pub probe_id: String,
    pub ground_id: String,
    /// Name the receiver peripheral answers with.
    pub receiver: String,
    pub mode: RunModeKind,
    /// Idle delay between polls, in loop iterations.
    pub idle_iterations: u32,
    pub bus: BusLayout,
    pub mailbox: MailboxNames,
    pub frame: FrameConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_id: "Voyager-1".to_string(),
            ground_id: "Earth".to_string(),
            receiver: MessageReceiver::DEFAULT_NAME.to_string(),
            mode: RunModeKind::default(),
            idle_iterations: 5000,
            bus: BusLayout::default(),
            mailbox: MailboxNames::default(),
            frame: FrameConfig::default(),
        }
    }
}

impl ProbeConfig {
    pub fn from_json(text: &str) -> ProbeResult<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that parse but cannot work together.
    pub fn validate(&self) -> ProbeResult<()> {
        self.mailbox.validate()?;
        self.frame.pixel_count()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
