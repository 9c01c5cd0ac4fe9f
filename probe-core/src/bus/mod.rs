//! Peripheral bus: register-file abstraction and address layout.
//!
//! Every peripheral owns one fixed-stride slot above the bus base. The
//! interrupt mask register sits outside the slot window and carries one
//! pending bit per slot.

mod simulated;

use serde::{Deserialize, Serialize};

pub use simulated::{NamedPeripheral, Peripheral, SimulatedBus};

/// Default bus base address.
pub const BUS_BASE: u16 = 0xFE00;
/// Addressable units per slot.
pub const SLOT_STRIDE: u16 = 16;
/// Default interrupt mask register address.
pub const INT_MASK_ADDR: u16 = 0xFF09;
/// One slot per mask bit.
pub const MAX_SLOTS: usize = 16;

/// Register offsets inside a slot.
pub mod offset {
    /// Status register.
    pub const STATUS: u16 = 0x00;
    /// First of four name registers (two ASCII bytes each).
    pub const NAME: u16 = 0x08;
    /// Bytes of name exposed through the name registers.
    pub const NAME_LEN: usize = 8;
}

/// Status register values.
pub mod status {
    /// No message presented.
    pub const EMPTY: u16 = 0;
    /// A message is waiting to be consumed.
    pub const PENDING: u16 = 1;
    /// Re-arm value written after a message is consumed. Shares the
    /// encoding of `PENDING`; the receiver treats the write as an ack.
    pub const READY: u16 = 1;
}

/// Bus-visible register access.
///
/// Reads take `&mut self` because a peripheral may change state when read.
pub trait RegisterFile {
    fn read_register(&mut self, addr: u16) -> u16;
    fn write_register(&mut self, addr: u16, value: u16);
}

/// Address layout of the peripheral bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusLayout {
    pub base: u16,
    pub stride: u16,
    pub mask_address: u16,
}

impl Default for BusLayout {
    fn default() -> Self {
        Self {
            base: BUS_BASE,
            stride: SLOT_STRIDE,
            mask_address: INT_MASK_ADDR,
        }
    }
}

impl BusLayout {
    /// First address of a slot.
    pub fn slot_base(&self, slot: u8) -> u16 {
        self.base
            .wrapping_add(self.stride.wrapping_mul(u16::from(slot)))
    }

    /// Address of a slot's status register.
    pub fn status_address(&self, slot: u8) -> u16 {
        self.slot_base(slot).wrapping_add(offset::STATUS)
    }

    /// Decode an address into (slot, offset within slot).
    pub fn slot_of(&self, addr: u16) -> Option<(u8, u16)> {
        let rel = addr.checked_sub(self.base)?;
        let slot = rel.checked_div(self.stride)?;
        if usize::from(slot) >= MAX_SLOTS {
            return None;
        }
        Some((slot as u8, rel % self.stride))
    }

    /// Slot index for a peripheral's base address. The address must be
    /// the first address of a slot.
    pub fn slot_index(&self, base_address: u16) -> Option<u8> {
        match self.slot_of(base_address)? {
            (slot, 0) => Some(slot),
            _ => None,
        }
    }

    /// Pending bit for a slot in the mask register.
    pub fn mask_bit(slot: u8) -> u16 {
        1u16 << slot
    }
}

/// Two bytes of `name` as seen through the name register at `reg_offset`.
/// Low byte first, zero padded.
pub fn encode_name(name: &str, reg_offset: u16) -> u16 {
    let bytes = name.as_bytes();
    let i = usize::from(reg_offset.saturating_sub(offset::NAME) & !1);
    if i >= offset::NAME_LEN {
        return 0;
    }
    let lo = bytes.get(i).copied().unwrap_or(0);
    let hi = bytes.get(i + 1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}

/// Read a slot's name back through its name registers.
/// Returns None for a slot that answers with an empty name.
pub fn read_name<R: RegisterFile + ?Sized>(bus: &mut R, layout: &BusLayout, slot: u8) -> Option<String> {
    let base = layout.slot_base(slot);
    let mut bytes = Vec::with_capacity(offset::NAME_LEN);
    for reg in (0..offset::NAME_LEN as u16).step_by(2) {
        let word = bus.read_register(base.wrapping_add(offset::NAME + reg));
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
}
