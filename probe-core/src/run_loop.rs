//! Run-loop scheduling: how the probe idles between dispatcher passes.

use std::collections::VecDeque;

use log::warn;

use crate::config::{ProbeConfig, RunModeKind};
use crate::peripherals::MessageQueue;

/// Scheduling strategy, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Wait for an interrupt; the dispatcher runs as the handler.
    Interrupt,
    /// Read the receiver status every iteration, then idle.
    Polling { idle_iterations: u32 },
}

impl RunMode {
    pub fn from_config(config: &ProbeConfig) -> Self {
        match config.mode {
            RunModeKind::Interrupt => RunMode::Interrupt,
            RunModeKind::Polling => RunMode::Polling {
                idle_iterations: config.idle_iterations,
            },
        }
    }
}

/// Whether the loop keeps going after an idle period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Continue,
    Shutdown,
}

/// Idle primitives used by the run loop.
///
/// Both calls block without timeouts of their own; a primitive that never
/// returns stalls the probe.
pub trait Idle {
    /// Block until an interrupt may have been raised.
    fn wait_for_interrupt(&mut self) -> Wake;

    /// Idle for a fixed number of iterations between polls.
    fn delay(&mut self, iterations: u32) -> Wake;
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Dispatcher passes started.
    pub passes: u64,
    /// Messages consumed (matched or not).
    pub consumed: u64,
    /// Consumed messages whose body was not a command.
    pub unknown: u64,
    /// Passes that ended in a reported error.
    pub errors: u64,
}

/// Delivers a scripted list of inbound messages, one per wake.
///
/// Shuts down once the script and the queue are both empty, or after
/// `budget` wakes, whichever comes first.
pub struct ScriptedIdle {
    queue: MessageQueue,
    script: VecDeque<(String, Vec<u8>)>,
    budget: u32,
    idled: u64,
}

impl ScriptedIdle {
    pub const DEFAULT_BUDGET: u32 = 64;

    pub fn new(queue: MessageQueue) -> Self {
        Self {
            queue,
            script: VecDeque::new(),
            budget: Self::DEFAULT_BUDGET,
            idled: 0,
        }
    }

    /// Queue a message for a later wake.
    pub fn then(mut self, sender: &str, body: impl Into<Vec<u8>>) -> Self {
        self.script.push_back((sender.to_string(), body.into()));
        self
    }

    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// Total iterations spent in `delay`.
    pub fn idled(&self) -> u64 {
        self.idled
    }

    fn next_wake(&mut self) -> Wake {
        if self.budget == 0 {
            return Wake::Shutdown;
        }
        self.budget -= 1;

        if let Some((sender, body)) = self.script.pop_front() {
            if let Err(e) = self.queue.push(&sender, &body) {
                warn!("scripted message from {} not delivered: {}", sender, e);
            }
            return Wake::Continue;
        }
        if self.queue.is_empty() {
            Wake::Shutdown
        } else {
            Wake::Continue
        }
    }
}

impl Idle for ScriptedIdle {
    fn wait_for_interrupt(&mut self) -> Wake {
        self.next_wake()
    }

    fn delay(&mut self, iterations: u32) -> Wake {
        self.idled += u64::from(iterations);
        self.next_wake()
    }
}
