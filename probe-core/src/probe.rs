//! Probe - simulated hardware plus the firmware run loop.

use log::info;

use crate::bus::{status, NamedPeripheral, RegisterFile, SimulatedBus};
use crate::commands::CommandTable;
use crate::config::ProbeConfig;
use crate::console::ProbeConsole;
use crate::dispatcher::{report, DispatchOutcome, MessageDispatcher, Trigger};
use crate::error::ProbeResult;
use crate::fs::Mailbox;
use crate::peripherals::{MessageQueue, MessageReceiver};
use crate::registry::PeripheralRegistry;
use crate::run_loop::{Idle, RunMode, RunStats, Wake};
use crate::uplink::CaptureAction;

/// Slot of the outbound message sender on the stock probe.
pub const SENDER_SLOT: u8 = 0;
/// Slot of the camera on the stock probe.
pub const CAMERA_SLOT: u8 = 1;
/// Slot of the message receiver on the stock probe.
pub const RECEIVER_SLOT: u8 = 2;

/// Probe state.
pub struct Probe<C: ProbeConsole> {
    config: ProbeConfig,
    /// Peripheral bus with the interrupt mask.
    bus: SimulatedBus,
    /// Mailbox shared with the receiver peripheral.
    mailbox: Mailbox,
    /// Inbound queue feeding the receiver.
    queue: MessageQueue,
    dispatcher: MessageDispatcher,
    console: C,
}

impl<C: ProbeConsole> Probe<C> {
    /// Stock probe on an in-memory mailbox: `MSGSEND`, `CAMERA` and the
    /// receiver in slots 0-2, with `TAKE_PICTURE` bound to `capture`.
    pub fn new(config: ProbeConfig, console: C, capture: impl CaptureAction + 'static) -> Self {
        let mailbox = Mailbox::default();
        let mut bus = SimulatedBus::new(config.bus);
        bus.mount(SENDER_SLOT, NamedPeripheral::new("MSGSEND"));
        bus.mount(CAMERA_SLOT, NamedPeripheral::new("CAMERA"));
        bus.mount(
            RECEIVER_SLOT,
            MessageReceiver::new(config.receiver.clone(), mailbox.clone(), config.mailbox.clone()),
        );
        Self::with_hardware(config, console, bus, mailbox, CommandTable::with_capture(capture))
    }

    /// Assemble around caller-built hardware. The peripheral table is read
    /// off the bus once, here.
    pub fn with_hardware(
        config: ProbeConfig,
        console: C,
        mut bus: SimulatedBus,
        mailbox: Mailbox,
        commands: CommandTable,
    ) -> Self {
        let registry = PeripheralRegistry::scan(&mut bus, config.bus);
        let queue = MessageQueue::new(mailbox.clone(), config.mailbox.queue.clone());
        let dispatcher = MessageDispatcher::new(
            registry,
            config.receiver.clone(),
            config.mailbox.clone(),
            commands,
        );
        Self {
            config,
            bus,
            mailbox,
            queue,
            dispatcher,
            console,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn bus(&self) -> &SimulatedBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SimulatedBus {
        &mut self.bus
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Handle for feeding inbound messages.
    pub fn queue(&self) -> MessageQueue {
        self.queue.clone()
    }

    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut MessageDispatcher {
        &mut self.dispatcher
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Queue an inbound message for the receiver.
    pub fn deliver(&self, sender: &str, body: impl AsRef<[u8]>) -> ProbeResult<()> {
        self.queue.push(sender, body.as_ref())
    }

    /// Interrupt handler: one dispatcher pass with interrupts masked.
    pub fn handle_interrupt(&mut self) -> ProbeResult<DispatchOutcome> {
        let was_enabled = self.bus.disable_interrupts();
        let result = self.dispatcher.dispatch(
            Trigger::Interrupt,
            &mut self.bus,
            &mut self.mailbox,
            &mut self.console,
        );
        if was_enabled {
            self.bus.enable_interrupts();
        }
        result
    }

    /// Run until the idle primitive asks for shutdown.
    ///
    /// A receiver missing at startup halts before the loop is entered, in
    /// either mode.
    pub fn run<I: Idle + ?Sized>(&mut self, idle: &mut I) -> ProbeResult<RunStats> {
        let slot = match self.dispatcher.registry().resolve(&self.config.receiver) {
            Ok(p) => p.slot_index,
            Err(e) => {
                report(&mut self.console, &e);
                return Err(e);
            }
        };
        let mode = RunMode::from_config(&self.config);
        self.console
            .println(&format!("{} OS starting...", self.config.probe_id));
        info!("{} running in {:?} mode, receiver in slot {}", self.config.probe_id, mode, slot);

        let mut stats = RunStats::default();
        match mode {
            RunMode::Interrupt => loop {
                if idle.wait_for_interrupt() == Wake::Shutdown {
                    break;
                }
                self.bus.step();
                if self.bus.interrupt_pending() {
                    let result = self.handle_interrupt();
                    record(&mut stats, &result);
                }
            },
            RunMode::Polling { idle_iterations } => {
                let status_addr = self.config.bus.status_address(slot);
                loop {
                    self.bus.step();
                    if self.bus.read_register(status_addr) == status::PENDING {
                        let result = self.dispatcher.dispatch(
                            Trigger::Poll,
                            &mut self.bus,
                            &mut self.mailbox,
                            &mut self.console,
                        );
                        record(&mut stats, &result);
                    }
                    if idle.delay(idle_iterations) == Wake::Shutdown {
                        break;
                    }
                }
            }
        }

        info!("{} stopped: {:?}", self.config.probe_id, stats);
        Ok(stats)
    }
}

fn record(stats: &mut RunStats, result: &ProbeResult<DispatchOutcome>) {
    stats.passes += 1;
    match result {
        Ok(DispatchOutcome::Consumed { matched, .. }) => {
            stats.consumed += 1;
            if !matched {
                stats.unknown += 1;
            }
        }
        Ok(DispatchOutcome::NotPending) => {}
        Err(_) => stats.errors += 1,
    }
}
