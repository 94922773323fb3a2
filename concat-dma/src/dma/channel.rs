//! DMA channels and the software transfer engine.

use super::{Descriptor, InterruptCause, ReadTarget, WriteTarget};

#[cfg(test)]
use super::DmaError;

/// Channel state machine.
///
/// ```text
/// Disabled --enable--> Armed --trigger--> Transferring --last word--> Idle
///     ^                  ^                                             |
///     |                  +---------------set_descriptor---------------+
///     +--disable-- (any state but Halted)          Halted: terminal
/// ```
///
/// `Idle` is "enabled but out of descriptors": a trigger in that state
/// latches [`InterruptCause::CurrPtrNull`] instead of moving data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// Triggers are ignored entirely.
    Disabled,
    /// Enabled, no descriptor armed.
    Idle,
    /// Enabled with a fresh descriptor.
    Armed,
    /// Mid-descriptor; more triggers are needed to finish.
    Transferring,
    /// Terminal. Only an external reset (a new channel) leaves this state.
    Halted,
}

/// A single DMA channel.
///
/// The channel latches at most one [`InterruptCause`] at a time; handlers
/// read-and-clear it with [`Channel::take_interrupt`], mirroring the
/// status/clear register pair on hardware.
#[derive(Debug)]
pub struct Channel {
    state: ChannelState,
    descriptor: Option<Descriptor>,
    progress: usize,
    pending: Option<InterruptCause>,
}

impl Channel {
    /// Creates a disabled channel with no descriptor.
    pub const fn new() -> Self {
        Channel {
            state: ChannelState::Disabled,
            descriptor: None,
            progress: 0,
            pending: None,
        }
    }

    /// Arms the channel with a descriptor, resetting transfer progress.
    ///
    /// This is the software analog of resetting the hardware descriptor
    /// pointer; completion consumes the armed descriptor, so every new cycle
    /// starts here.
    pub fn set_descriptor(&mut self, descriptor: Descriptor) {
        if self.state == ChannelState::Halted {
            return;
        }
        self.descriptor = Some(descriptor);
        self.progress = 0;
        if self.state != ChannelState::Disabled {
            self.state = ChannelState::Armed;
        }
    }

    /// Enables the channel. Without a descriptor it sits in `Idle`.
    pub fn enable(&mut self) {
        if self.state == ChannelState::Disabled {
            self.state = if self.descriptor.is_some() {
                ChannelState::Armed
            } else {
                ChannelState::Idle
            };
        }
    }

    /// Disables the channel. The armed descriptor (if any) is retained.
    pub fn disable(&mut self) {
        if self.state != ChannelState::Halted {
            self.state = ChannelState::Disabled;
        }
    }

    /// Freezes the channel permanently.
    pub fn halt(&mut self) {
        self.state = ChannelState::Halted;
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether a trigger would currently move data.
    pub fn can_trigger(&self) -> bool {
        matches!(
            self.state,
            ChannelState::Armed | ChannelState::Transferring
        )
    }

    /// Words moved so far on the armed descriptor.
    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Reads and clears the latched interrupt cause.
    pub fn take_interrupt(&mut self) -> Option<InterruptCause> {
        self.pending.take()
    }

    /// Fires the channel's trigger input.
    ///
    /// Moves as many words as the descriptor's trigger granularity allows,
    /// from `from` into `to`. Completion, bus errors, and missing-descriptor
    /// triggers all latch an interrupt cause; mid-descriptor progress latches
    /// nothing.
    pub fn trigger<F, T, W>(&mut self, from: &mut F, to: &mut T)
    where
        F: ReadTarget<ReceivedWord = W>,
        T: WriteTarget<TransmittedWord = W>,
        W: Copy,
    {
        match self.state {
            ChannelState::Disabled | ChannelState::Halted => return,
            ChannelState::Idle => {
                self.pending = Some(InterruptCause::CurrPtrNull);
                return;
            }
            ChannelState::Armed | ChannelState::Transferring => {}
        }
        let Some(desc) = self.descriptor else {
            // State says armed but no descriptor is present; treat it like a
            // null descriptor pointer.
            self.pending = Some(InterruptCause::CurrPtrNull);
            return;
        };

        let total = desc.total_words();
        let batch = desc.words_per_trigger().min(total - self.progress);
        self.state = ChannelState::Transferring;
        for _ in 0..batch {
            let (mut src, mut dst) = desc.word_offsets(self.progress);
            // The target knows best whether its address advances: a FIFO data
            // register stays pinned even if the descriptor says increment.
            if !from.rx_increment() {
                src = 0;
            }
            if !to.tx_increment() {
                dst = 0;
            }
            let word = match from.read_word(src) {
                Ok(w) => w,
                Err(_) => {
                    self.finish(InterruptCause::SrcBusError);
                    return;
                }
            };
            if to.write_word(dst, word).is_err() {
                self.finish(InterruptCause::DstBusError);
                return;
            }
            self.progress += 1;
        }
        if self.progress == total {
            self.finish(InterruptCause::Completion);
        }
    }

    /// Consumes the descriptor and latches `cause`.
    fn finish(&mut self, cause: InterruptCause) {
        self.descriptor = None;
        self.progress = 0;
        self.state = ChannelState::Idle;
        self.pending = Some(cause);
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain RAM target for memory-to-memory transfers.
#[cfg(test)]
pub(crate) struct Ram<const N: usize>(pub [u8; N]);

#[cfg(test)]
impl<const N: usize> ReadTarget for Ram<N> {
    type ReceivedWord = u8;

    fn read_word(&mut self, offset: usize) -> Result<u8, DmaError> {
        self.0.get(offset).copied().ok_or(DmaError::SrcBus)
    }
}

#[cfg(test)]
impl<const N: usize> WriteTarget for Ram<N> {
    type TransmittedWord = u8;

    fn write_word(&mut self, offset: usize, word: u8) -> Result<(), DmaError> {
        match self.0.get_mut(offset) {
            Some(slot) => {
                *slot = word;
                Ok(())
            }
            None => Err(DmaError::DstBus),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Endpoint, TriggerGranularity};
    use super::*;

    fn mem_descriptor(x_count: usize, granularity: TriggerGranularity) -> Descriptor {
        Descriptor::one_d(
            Endpoint::memory(0),
            Endpoint::memory(0),
            x_count,
            granularity,
        )
        .unwrap()
    }

    #[test]
    fn whole_descriptor_burst() {
        let mut src = Ram([1, 2, 3, 4]);
        let mut dst = Ram([0u8; 4]);
        let mut ch = Channel::new();
        ch.set_descriptor(mem_descriptor(4, TriggerGranularity::Descriptor));
        ch.enable();

        ch.trigger(&mut src, &mut dst);
        assert_eq!(ch.take_interrupt(), Some(InterruptCause::Completion));
        assert_eq!(dst.0, [1, 2, 3, 4]);
        assert_eq!(ch.state(), ChannelState::Idle);
    }

    #[test]
    fn element_granularity_needs_one_trigger_per_word() {
        let mut src = Ram([9, 8, 7]);
        let mut dst = Ram([0u8; 3]);
        let mut ch = Channel::new();
        ch.set_descriptor(mem_descriptor(3, TriggerGranularity::Element));
        ch.enable();

        ch.trigger(&mut src, &mut dst);
        assert_eq!(ch.take_interrupt(), None);
        assert_eq!(ch.state(), ChannelState::Transferring);
        assert_eq!(ch.progress(), 1);

        ch.trigger(&mut src, &mut dst);
        ch.trigger(&mut src, &mut dst);
        assert_eq!(ch.take_interrupt(), Some(InterruptCause::Completion));
        assert_eq!(dst.0, [9, 8, 7]);
    }

    #[test]
    fn disabled_channel_ignores_triggers() {
        let mut src = Ram([1u8; 2]);
        let mut dst = Ram([0u8; 2]);
        let mut ch = Channel::new();
        ch.set_descriptor(mem_descriptor(2, TriggerGranularity::Descriptor));

        ch.trigger(&mut src, &mut dst);
        assert_eq!(ch.take_interrupt(), None);
        assert_eq!(dst.0, [0, 0]);
    }

    #[test]
    fn trigger_without_descriptor_is_curr_ptr_null() {
        let mut src = Ram([0u8; 1]);
        let mut dst = Ram([0u8; 1]);
        let mut ch = Channel::new();
        ch.enable();

        ch.trigger(&mut src, &mut dst);
        assert_eq!(ch.take_interrupt(), Some(InterruptCause::CurrPtrNull));
    }

    #[test]
    fn out_of_range_read_is_a_src_bus_error() {
        let mut src = Ram([1u8; 2]);
        let mut dst = Ram([0u8; 8]);
        let mut ch = Channel::new();
        ch.set_descriptor(mem_descriptor(8, TriggerGranularity::Descriptor));
        ch.enable();

        ch.trigger(&mut src, &mut dst);
        assert_eq!(ch.take_interrupt(), Some(InterruptCause::SrcBusError));
        // The cause is read-and-clear.
        assert_eq!(ch.take_interrupt(), None);
    }

    #[test]
    fn completion_consumes_the_descriptor() {
        let mut src = Ram([5u8; 2]);
        let mut dst = Ram([0u8; 2]);
        let mut ch = Channel::new();
        ch.set_descriptor(mem_descriptor(2, TriggerGranularity::Descriptor));
        ch.enable();

        ch.trigger(&mut src, &mut dst);
        let _ = ch.take_interrupt();
        ch.trigger(&mut src, &mut dst);
        assert_eq!(ch.take_interrupt(), Some(InterruptCause::CurrPtrNull));
    }

    #[test]
    fn non_incrementing_targets_pin_the_offset() {
        // Records the offset of every access it sees.
        struct Port {
            offsets: [usize; 4],
            n: usize,
        }
        impl WriteTarget for Port {
            type TransmittedWord = u8;

            fn write_word(&mut self, offset: usize, _word: u8) -> Result<(), DmaError> {
                self.offsets[self.n] = offset;
                self.n += 1;
                Ok(())
            }

            fn tx_increment(&self) -> bool {
                false
            }
        }

        let mut src = Ram([1, 2, 3, 4]);
        let mut port = Port {
            offsets: [usize::MAX; 4],
            n: 0,
        };
        let mut ch = Channel::new();
        // The descriptor claims an incrementing destination; the target's own
        // increment hook wins.
        ch.set_descriptor(mem_descriptor(4, TriggerGranularity::Descriptor));
        ch.enable();

        ch.trigger(&mut src, &mut port);
        assert_eq!(ch.take_interrupt(), Some(InterruptCause::Completion));
        assert_eq!(port.offsets, [0, 0, 0, 0]);
    }

    #[test]
    fn halted_channel_stays_halted() {
        let mut ch = Channel::new();
        ch.halt();
        ch.enable();
        ch.set_descriptor(mem_descriptor(1, TriggerGranularity::Descriptor));
        assert_eq!(ch.state(), ChannelState::Halted);
    }
}
