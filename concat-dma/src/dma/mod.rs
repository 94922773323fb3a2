//! Direct memory access (DMA) model.
//!
//! The unit modeled here follows the descriptor-based design found on parts
//! with a channel/descriptor split: a channel is armed with a [`Descriptor`]
//! describing the transfer geometry (1-D or 2-D, with a per-row stride on
//! either endpoint) and then moves words between a [`ReadTarget`] and a
//! [`WriteTarget`] whenever its trigger input fires. How much data a single
//! trigger moves is part of the descriptor: one element, one X loop (row), or
//! the whole descriptor.
//!
//! Unlike a hardware unit, transfers here are executed in software when the
//! channel is triggered. The observable behavior is kept faithful: channels
//! latch an [`InterruptCause`] that must be read-and-cleared, a completed
//! descriptor is consumed and must be re-armed before the channel will move
//! data again, and a trigger arriving while no descriptor is set raises the
//! benign `CurrPtrNull` cause rather than an error.

use embedded_dma::{ReadBuffer, WriteBuffer};

mod channel;
mod descriptor;

pub use channel::{Channel, ChannelState};
pub use descriptor::{Descriptor, Endpoint, TransferShape, TriggerGranularity};

/// Error during DMA configuration or a word access gone wrong mid-transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// An illegal transfer geometry (zero counts, or a row stride that would
    /// make 2-D rows overlap) was specified.
    IllegalConfig,
    /// A source access fell outside the target, or a source FIFO ran dry.
    SrcBus,
    /// A destination access fell outside the target, or a sink refused the
    /// word.
    DstBus,
}

/// Cause latched by a channel when it raises an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptCause {
    /// The descriptor ran to completion.
    Completion,
    /// A source-side bus error terminated the transfer.
    SrcBusError,
    /// A destination-side bus error terminated the transfer.
    DstBusError,
    /// The channel was triggered with no descriptor armed. Benign for stages
    /// that are re-armed lazily.
    CurrPtrNull,
}

/// Trait which is implemented by anything the engine can read words from.
pub trait ReadTarget {
    /// Type which is transferred in a single DMA word access.
    type ReceivedWord: Copy;

    /// Reads the word `offset` words from the start of the target.
    ///
    /// Non-incrementing targets (FIFO data registers) ignore `offset` and pop
    /// their next word instead.
    fn read_word(&mut self, offset: usize) -> Result<Self::ReceivedWord, DmaError>;

    /// Returns whether the source address advances after each word.
    ///
    /// When this returns `false` the engine pins every access to offset 0,
    /// whatever the descriptor's endpoint says.
    fn rx_increment(&self) -> bool {
        true
    }
}

/// Trait which is implemented by anything the engine can write words to.
pub trait WriteTarget {
    /// Type which is transferred in a single DMA word access.
    type TransmittedWord: Copy;

    /// Writes a word `offset` words from the start of the target.
    ///
    /// Non-incrementing targets (FIFO data registers) ignore `offset` and
    /// push the word instead.
    fn write_word(&mut self, offset: usize, word: Self::TransmittedWord) -> Result<(), DmaError>;

    /// Returns whether the destination address advances after each word.
    ///
    /// When this returns `false` the engine pins every access to offset 0,
    /// whatever the descriptor's endpoint says.
    fn tx_increment(&self) -> bool {
        true
    }
}

impl<B: ReadBuffer> ReadTarget for B
where
    <B as ReadBuffer>::Word: Copy,
{
    type ReceivedWord = <B as ReadBuffer>::Word;

    fn read_word(&mut self, offset: usize) -> Result<Self::ReceivedWord, DmaError> {
        let (ptr, len) = unsafe { self.read_buffer() };
        if offset >= len {
            return Err(DmaError::SrcBus);
        }
        // Safety: `read_buffer` guarantees `len` readable words at `ptr`, and
        // the bounds check above keeps the access inside them.
        Ok(unsafe { ptr.add(offset).read_volatile() })
    }
}

impl<B: WriteBuffer> WriteTarget for B
where
    <B as WriteBuffer>::Word: Copy,
{
    type TransmittedWord = <B as WriteBuffer>::Word;

    fn write_word(&mut self, offset: usize, word: Self::TransmittedWord) -> Result<(), DmaError> {
        let (ptr, len) = unsafe { self.write_buffer() };
        if offset >= len {
            return Err(DmaError::DstBus);
        }
        // Safety: `write_buffer` guarantees `len` writable words at `ptr`.
        unsafe { ptr.add(offset).write_volatile(word) };
        Ok(())
    }
}
