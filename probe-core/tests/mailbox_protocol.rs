//! Integration tests for one dispatcher pass over the simulated bus.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use probe_core::bus::{offset, status, INT_MASK_ADDR};
use probe_core::{
    BusLayout, CommandTable, DispatchOutcome, HeadlessConsole, MailboxNames, MailboxStore,
    MemoryStore, MessageDispatcher, Peripheral, PeripheralRegistry, ProbeError, ProbeResult,
    RecordingCapture, RegisterFile, SimulatedBus, StoreCode, Trigger,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Receiver stand-in that records every register write.
#[derive(Clone, Default)]
struct RecordingReceiver {
    writes: Arc<Mutex<Vec<(u16, u16)>>>,
}

impl RecordingReceiver {
    fn writes(&self) -> Vec<(u16, u16)> {
        self.writes.lock().unwrap().clone()
    }
}

impl Peripheral for RecordingReceiver {
    fn name(&self) -> &str {
        "MSGRECV"
    }

    fn read(&mut self, _offset: u16) -> u16 {
        status::EMPTY
    }

    fn write(&mut self, offset: u16, value: u16) {
        self.writes.lock().unwrap().push((offset, value));
    }
}

/// Store whose reads always fail with fixed codes.
struct FaultyStore {
    inner: MemoryStore,
    body_code: i32,
    sender_code: i32,
}

impl MailboxStore for FaultyStore {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.load(name)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> ProbeResult<()> {
        self.inner.write(name, data)
    }

    fn delete(&mut self, name: &str) -> bool {
        self.inner.delete(name)
    }

    fn list(&self) -> Vec<String> {
        self.inner.list()
    }

    fn read(&self, name: &str, _dest: &mut [u8]) -> Result<(), StoreCode> {
        if name == "INBOX.MSG" {
            Err(StoreCode(self.body_code))
        } else {
            Err(StoreCode(self.sender_code))
        }
    }
}

/// Store that counts read attempts.
struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
}

impl CountingStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MailboxStore for CountingStore {
    fn load(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.load(name)
    }

    fn write(&mut self, name: &str, data: &[u8]) -> ProbeResult<()> {
        self.inner.write(name, data)
    }

    fn delete(&mut self, name: &str) -> bool {
        self.inner.delete(name)
    }

    fn list(&self) -> Vec<String> {
        self.inner.list()
    }

    fn read(&self, name: &str, dest: &mut [u8]) -> Result<(), StoreCode> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(name, dest)
    }
}

/// Receiver in slot 1, recording its register writes.
struct Rig {
    bus: SimulatedBus,
    receiver: RecordingReceiver,
    dispatcher: MessageDispatcher,
    record: RecordingCapture,
    console: HeadlessConsole,
}

impl Rig {
    fn new() -> Self {
        init_logging();
        let layout = BusLayout::default();
        let receiver = RecordingReceiver::default();
        let mut bus = SimulatedBus::new(layout);
        bus.mount(1, receiver.clone());

        let record = RecordingCapture::new();
        let registry = PeripheralRegistry::scan(&mut bus, layout);
        let dispatcher = MessageDispatcher::new(
            registry,
            "MSGRECV",
            MailboxNames::default(),
            CommandTable::with_capture(record.clone()),
        );
        Self {
            bus,
            receiver,
            dispatcher,
            record,
            console: HeadlessConsole::new(),
        }
    }

    fn dispatch<S: MailboxStore>(&mut self, store: &mut S) -> ProbeResult<DispatchOutcome> {
        self.dispatcher
            .dispatch(Trigger::Interrupt, &mut self.bus, store, &mut self.console)
    }
}

fn message(body: &[u8], sender: &[u8]) -> MemoryStore {
    MemoryStore::with_entries([("INBOX.MSG", body.to_vec()), ("SENDER.MSG", sender.to_vec())])
}

#[test]
fn test_take_picture_consumes_and_rearms() {
    let mut rig = Rig::new();
    rig.bus.raise(1);
    let mut store = CountingStore::new(message(b"TAKE_PICTURE", b"Earth"));

    let outcome = rig.dispatch(&mut store).unwrap();

    assert_eq!(store.reads(), 2);
    assert!(matches!(outcome, DispatchOutcome::Consumed { matched: true, .. }));
    assert_eq!(rig.record.calls(), vec!["Earth"]);
    assert!(!store.exists("INBOX.MSG"));
    assert!(!store.exists("SENDER.MSG"));
    assert_eq!(rig.bus.read_register(INT_MASK_ADDR), 0);
    assert_eq!(rig.receiver.writes(), vec![(offset::STATUS, status::READY)]);
    assert_eq!(
        rig.console.lines(),
        vec!["Message received!", "Command: TAKE_PICTURE"]
    );
}

#[test]
fn test_unknown_command_still_deletes() {
    let mut rig = Rig::new();
    rig.bus.raise(1);
    let mut store = message(b"take_picture", b"Mars");

    let outcome = rig.dispatch(&mut store).unwrap();

    assert!(matches!(outcome, DispatchOutcome::Consumed { matched: false, .. }));
    assert!(rig.record.calls().is_empty());
    assert!(store.list().is_empty());
    assert!(rig
        .console
        .lines()
        .contains(&"Unknown command: take_picture"));
    assert_eq!(rig.bus.read_register(INT_MASK_ADDR), 0);
}

#[test]
fn test_oversized_entry_left_in_place() {
    let mut rig = Rig::new();
    rig.bus.raise(1);
    let mut store = CountingStore::new(message(&[b'X'; 255], b"Earth"));

    for _ in 0..2 {
        let result = rig.dispatch(&mut store);
        assert!(matches!(
            result,
            Err(ProbeError::MessageTooLarge { ref entry, size: 255 }) if entry == "INBOX.MSG"
        ));
    }

    assert_eq!(store.reads(), 0);
    assert!(store.exists("INBOX.MSG"));
    assert!(store.exists("SENDER.MSG"));
    assert!(rig.record.calls().is_empty());
    assert!(rig.receiver.writes().is_empty());
    assert_eq!(rig.bus.read_register(INT_MASK_ADDR), 0b10);
    assert!(!rig.dispatcher.is_handling());
}

#[test]
fn test_oversized_sender_rejected() {
    let mut rig = Rig::new();
    rig.bus.raise(1);
    let mut store = CountingStore::new(message(b"TAKE_PICTURE", &[b'S'; 300]));

    let result = rig.dispatch(&mut store);
    assert!(matches!(result, Err(ProbeError::MessageTooLarge { size: 300, .. })));
    assert_eq!(store.reads(), 0);
    assert!(store.exists("INBOX.MSG"));
}

#[test]
fn test_missing_entry_leaves_registers_alone() {
    let mut rig = Rig::new();
    rig.bus.raise(1);
    let mut store = MemoryStore::with_entries([("INBOX.MSG", b"TAKE_PICTURE".to_vec())]);

    let result = rig.dispatch(&mut store);

    assert!(matches!(result, Err(ProbeError::MissingEntry(ref name)) if name == "SENDER.MSG"));
    assert!(store.exists("INBOX.MSG"));
    assert!(rig.receiver.writes().is_empty());
    assert_eq!(rig.bus.read_register(INT_MASK_ADDR), 0b10);
    assert!(rig.record.calls().is_empty());
}

#[test]
fn test_store_read_failure_reports_both_codes() {
    let mut rig = Rig::new();
    rig.bus.raise(1);
    let mut store = FaultyStore {
        inner: message(b"TAKE_PICTURE", b"Earth"),
        body_code: -7,
        sender_code: -9,
    };

    let result = rig.dispatch(&mut store);

    assert!(matches!(
        result,
        Err(ProbeError::StoreRead { body: -7, sender: -9 })
    ));
    assert!(store.exists("INBOX.MSG"));
    assert!(rig.receiver.writes().is_empty());
    assert!(rig
        .console
        .output()
        .contains("Store read failed (body code -7, sender code -9)"));
}

#[test]
fn test_clearing_keeps_other_slots_pending() {
    let mut rig = Rig::new();
    rig.bus.raise(1);
    rig.bus.raise(2);
    assert_eq!(rig.bus.read_register(INT_MASK_ADDR), 0b110);
    let mut store = message(b"TAKE_PICTURE", b"Earth");

    rig.dispatch(&mut store).unwrap();

    assert_eq!(rig.bus.read_register(INT_MASK_ADDR), 0b100);
}

#[test]
fn test_back_to_back_senders_do_not_leak() {
    let mut rig = Rig::new();

    rig.bus.raise(1);
    let mut store = message(b"TAKE_PICTURE", b"Goldstone-Deep-Space-Complex");
    rig.dispatch(&mut store).unwrap();

    rig.bus.raise(1);
    store.add_entry("INBOX.MSG", b"TAKE_PICTURE".to_vec());
    store.add_entry("SENDER.MSG", b"Mars".to_vec());
    let outcome = rig.dispatch(&mut store).unwrap();

    assert_eq!(
        rig.record.calls(),
        vec!["Goldstone-Deep-Space-Complex", "Mars"]
    );
    match outcome {
        DispatchOutcome::Consumed { message, .. } => assert_eq!(message.sender, "Mars"),
        other => panic!("expected a consumed message, got {:?}", other),
    }
}

#[test]
fn test_missing_receiver_reported_per_pass() {
    init_logging();
    let mut bus = SimulatedBus::new(BusLayout::default());
    let registry = PeripheralRegistry::scan(&mut bus, BusLayout::default());
    let mut dispatcher = MessageDispatcher::new(
        registry,
        "MSGRECV",
        MailboxNames::default(),
        CommandTable::new(),
    );
    bus.raise(1);
    let mut store = message(b"TAKE_PICTURE", b"Earth");
    let mut console = HeadlessConsole::new();

    let result = dispatcher.dispatch(Trigger::Interrupt, &mut bus, &mut store, &mut console);

    assert!(matches!(result, Err(ProbeError::PeripheralNotFound(_))));
    assert_eq!(bus.read_register(INT_MASK_ADDR), 0b10);
    assert!(store.exists("INBOX.MSG"));
}
