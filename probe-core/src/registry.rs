//! Peripheral registry - symbolic name to bus slot.

use log::debug;

use crate::bus::{read_name, BusLayout, RegisterFile, MAX_SLOTS};
use crate::error::{ProbeError, ProbeResult};

/// A peripheral known to the firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peripheral {
    pub name: String,
    pub base_address: u16,
    pub slot_index: u8,
}

/// Static table of known peripherals, built once at startup.
#[derive(Debug, Clone)]
pub struct PeripheralRegistry {
    layout: BusLayout,
    entries: Vec<Peripheral>,
}

impl PeripheralRegistry {
    /// Build from (name, slot) pairs.
    pub fn from_entries<I, S>(layout: BusLayout, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .filter(|(_, slot)| usize::from(*slot) < MAX_SLOTS)
            .map(|(name, slot)| Peripheral {
                name: name.into(),
                base_address: layout.slot_base(slot),
                slot_index: slot,
            })
            .collect();
        Self { layout, entries }
    }

    /// Build by reading every slot's name registers.
    pub fn scan<R: RegisterFile + ?Sized>(bus: &mut R, layout: BusLayout) -> Self {
        let mut entries = Vec::new();
        for slot in 0..MAX_SLOTS as u8 {
            if let Some(name) = read_name(bus, &layout, slot) {
                debug!("slot {} answers as {}", slot, name);
                entries.push(Peripheral {
                    name,
                    base_address: layout.slot_base(slot),
                    slot_index: slot,
                });
            }
        }
        Self { layout, entries }
    }

    pub fn layout(&self) -> &BusLayout {
        &self.layout
    }

    pub fn peripherals(&self) -> &[Peripheral] {
        &self.entries
    }

    /// Look up a peripheral by exact name. Absence is an error, never slot 0.
    pub fn resolve(&self, name: &str) -> ProbeResult<&Peripheral> {
        self.entries
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ProbeError::PeripheralNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{NamedPeripheral, SimulatedBus};

    #[test]
    fn test_resolve_from_entries() {
        let registry =
            PeripheralRegistry::from_entries(BusLayout::default(), [("MSGSEND", 0), ("MSGRECV", 2)]);

        let recv = registry.resolve("MSGRECV").unwrap();
        assert_eq!(recv.base_address, 0xFE20);
        assert_eq!(recv.slot_index, 2);
        assert_eq!(registry.layout().slot_index(recv.base_address), Some(2));
    }

    #[test]
    fn test_resolve_missing_is_error() {
        let registry = PeripheralRegistry::from_entries(BusLayout::default(), [("CAMERA", 0)]);

        match registry.resolve("MSGRECV") {
            Err(ProbeError::PeripheralNotFound(name)) => assert_eq!(name, "MSGRECV"),
            other => panic!("expected PeripheralNotFound, got {:?}", other),
        }
        // Case sensitive
        assert!(registry.resolve("camera").is_err());
    }

    #[test]
    fn test_scan_bus() {
        let mut bus = SimulatedBus::new(BusLayout::default());
        bus.mount(1, NamedPeripheral::new("CAMERA"));
        bus.mount(5, NamedPeripheral::new("NAVSYS"));

        let registry = PeripheralRegistry::scan(&mut bus, BusLayout::default());
        assert_eq!(registry.peripherals().len(), 2);
        assert_eq!(registry.resolve("NAVSYS").unwrap().base_address, 0xFE50);
    }
}
