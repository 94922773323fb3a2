//! Statically sized pipeline buffers.
//!
//! Three buffers carry a packet through the pipeline: the [`StampCell`]
//! (rewritten once per second by the RTC alarm handler), the [`PacketBuffer`]
//! (one timestamp region plus one payload region, overwritten every cycle),
//! and the [`LogBuffer`] (four archived entries, flushed as a whole by the
//! playback stage).
//!
//! Every buffer has exactly one writer per pipeline phase and is handed to
//! the next phase by the stage sequencing in
//! [`pipeline`](crate::pipeline). The stamp cell is the one spot where two
//! agents (the alarm handler and the capture transfer) can race, so it is
//! an explicit critical-section cell rather than a bare array.

use crate::dma::{DmaError, ReadTarget, WriteTarget};
use core::cell::RefCell;
use critical_section::Mutex;

/// Width of the formatted timestamp region, in bytes.
pub const STAMP_SIZE: usize = 20;
/// Payload bytes accepted per packet.
pub const PAYLOAD_SIZE: usize = 5;
/// One archived entry: timestamp region followed by the payload region.
pub const ENTRY_SIZE: usize = STAMP_SIZE + PAYLOAD_SIZE;
/// Entries held by the log before it is flushed.
pub const LOG_SLOTS: usize = 4;

/// Per-packet concatenation buffer.
///
/// The capture stage fills the first [`STAMP_SIZE`] bytes from the stamp cell
/// and the remaining [`PAYLOAD_SIZE`] bytes from the serial RX FIFO; the
/// archive stage reads the whole thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketBuffer {
    bytes: [u8; ENTRY_SIZE],
}

impl PacketBuffer {
    /// A zeroed packet buffer.
    pub const fn new() -> Self {
        PacketBuffer {
            bytes: [0; ENTRY_SIZE],
        }
    }

    /// The whole entry.
    pub fn as_bytes(&self) -> &[u8; ENTRY_SIZE] {
        &self.bytes
    }

    /// The timestamp region.
    pub fn stamp(&self) -> &[u8] {
        &self.bytes[..STAMP_SIZE]
    }

    /// The payload region.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[STAMP_SIZE..]
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadTarget for PacketBuffer {
    type ReceivedWord = u8;

    fn read_word(&mut self, offset: usize) -> Result<u8, DmaError> {
        self.bytes.get(offset).copied().ok_or(DmaError::SrcBus)
    }
}

impl WriteTarget for PacketBuffer {
    type TransmittedWord = u8;

    fn write_word(&mut self, offset: usize, word: u8) -> Result<(), DmaError> {
        match self.bytes.get_mut(offset) {
            Some(slot) => {
                *slot = word;
                Ok(())
            }
            None => Err(DmaError::DstBus),
        }
    }
}

/// Four-slot archival log.
///
/// As a DMA target the log is addressed flat: word index `n` lands in slot
/// `n / ENTRY_SIZE` at column `n % ENTRY_SIZE`, which is exactly what a 2-D
/// descriptor with an [`ENTRY_SIZE`] row stride produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBuffer {
    slots: [[u8; ENTRY_SIZE]; LOG_SLOTS],
}

impl LogBuffer {
    /// A zeroed log.
    pub const fn new() -> Self {
        LogBuffer {
            slots: [[0; ENTRY_SIZE]; LOG_SLOTS],
        }
    }

    /// The archived entry in `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= LOG_SLOTS`.
    pub fn entry(&self, slot: usize) -> &[u8; ENTRY_SIZE] {
        &self.slots[slot]
    }

    /// All slots, oldest first.
    pub fn entries(&self) -> &[[u8; ENTRY_SIZE]; LOG_SLOTS] {
        &self.slots
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadTarget for LogBuffer {
    type ReceivedWord = u8;

    fn read_word(&mut self, offset: usize) -> Result<u8, DmaError> {
        if offset >= ENTRY_SIZE * LOG_SLOTS {
            return Err(DmaError::SrcBus);
        }
        Ok(self.slots[offset / ENTRY_SIZE][offset % ENTRY_SIZE])
    }
}

impl WriteTarget for LogBuffer {
    type TransmittedWord = u8;

    fn write_word(&mut self, offset: usize, word: u8) -> Result<(), DmaError> {
        if offset >= ENTRY_SIZE * LOG_SLOTS {
            return Err(DmaError::DstBus);
        }
        self.slots[offset / ENTRY_SIZE][offset % ENTRY_SIZE] = word;
        Ok(())
    }
}

/// Shared timestamp cell.
///
/// Written by the RTC alarm handler, read by the capture stage's stamp
/// descriptor. Both sides go through a critical section, so a stamp is always
/// observed whole, never half old and half new.
pub struct StampCell {
    cell: Mutex<RefCell<[u8; STAMP_SIZE]>>,
}

impl StampCell {
    /// A zeroed stamp cell.
    pub const fn new() -> Self {
        StampCell {
            cell: Mutex::new(RefCell::new([0; STAMP_SIZE])),
        }
    }

    /// Replaces the stamp. Alarm-handler side.
    pub fn store(&self, stamp: &[u8; STAMP_SIZE]) {
        critical_section::with(|cs| {
            *self.cell.borrow_ref_mut(cs) = *stamp;
        });
    }

    /// Copies the current stamp out.
    pub fn load(&self) -> [u8; STAMP_SIZE] {
        critical_section::with(|cs| *self.cell.borrow_ref(cs))
    }
}

impl Default for StampCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadTarget for StampCell {
    type ReceivedWord = u8;

    fn read_word(&mut self, offset: usize) -> Result<u8, DmaError> {
        critical_section::with(|cs| {
            self.cell
                .borrow_ref(cs)
                .get(offset)
                .copied()
                .ok_or(DmaError::SrcBus)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_regions_are_disjoint() {
        let mut packet = PacketBuffer::new();
        for i in 0..ENTRY_SIZE {
            packet.write_word(i, i as u8).unwrap();
        }
        assert_eq!(packet.stamp().len(), STAMP_SIZE);
        assert_eq!(packet.payload().len(), PAYLOAD_SIZE);
        assert_eq!(packet.payload()[0], STAMP_SIZE as u8);
    }

    #[test]
    fn log_flat_addressing_matches_slots() {
        let mut log = LogBuffer::new();
        log.write_word(ENTRY_SIZE + 3, 0xAB).unwrap();
        assert_eq!(log.entry(1)[3], 0xAB);
        assert_eq!(log.entry(0)[3], 0);
        assert!(log.write_word(ENTRY_SIZE * LOG_SLOTS, 0).is_err());
    }

    #[test]
    fn stamp_cell_round_trip() {
        let cell = StampCell::new();
        let stamp = [b'x'; STAMP_SIZE];
        cell.store(&stamp);
        assert_eq!(cell.load(), stamp);
    }
}
