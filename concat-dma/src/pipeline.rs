//! The three-stage concatenation pipeline.
//!
//! The trigger graph, as it is wired on hardware:
//!
//! ```text
//! RTC alarm (1 Hz) ──────────> stamp cell
//!                                  │ descriptor 1 (whole, 20 B)
//! UART RX byte ──> capture ch ─────┴──> packet buffer
//!                      │ descriptor 2 (per element, 5 B from RX FIFO)
//!                      │ completion
//!                      v
//!                 archive ch ── 2-D, one row per trigger ──> log slot 0..3
//!                      │ completion (log full)
//!                      v
//!                 playback ch ── 2-D burst, 4 x 25 B ──> UART TX, prompt
//! ```
//!
//! Each completion interrupt re-arms the next stage; the playback completion
//! hands the log back to the archive stage, so stages 2 and 3 are never armed
//! at the same time. A UART FIFO overflow, or any abnormal transfer cause,
//! permanently halts the whole pipeline, the model's observable equivalent
//! of the classic halt-and-wait-for-reset loop in a fault ISR.
//!
//! Interrupt-level work is queued as [`Event`]s and run by [`Pipeline::poll`];
//! the RX trigger line is level-serviced whenever no interrupt is pending,
//! which is how the real trigger interconnect behaves with interrupts
//! prioritized over DMA re-triggering.

use crate::buffer::{
    LogBuffer, PacketBuffer, StampCell, ENTRY_SIZE, LOG_SLOTS, PAYLOAD_SIZE, STAMP_SIZE,
};
use crate::dma::{
    Channel, ChannelState, Descriptor, DmaError, Endpoint, InterruptCause, TriggerGranularity,
};
use crate::rtc::{format_stamp, AlarmFilter, DateTime, DayOfWeek, Rtc};
use crate::uart::{self, common_configs, Uart, UartConfig};
use heapless::Deque;

const EVENT_QUEUE_DEPTH: usize = 16;

/// Prompt emitted at startup, once the banner is out.
pub const PROMPT_FIRST: &str = "Enter the 1st four packets: ";
/// Prompt emitted after every playback of the full log.
pub const PROMPT_NEXT: &str = "\r\nEnter the next four packets: ";

/// Interrupt-level events dispatched by [`Pipeline::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// RTC alarm fired: refresh the stamp cell.
    RtcAlarm,
    /// The capture channel raised an interrupt.
    CaptureIrq(InterruptCause),
    /// Capture completion pulsed the archive stage's trigger input.
    ArchiveTrigger,
    /// The archive channel raised an interrupt.
    ArchiveIrq(InterruptCause),
    /// Archive completion pulsed the playback stage's trigger input.
    PlaybackTrigger,
    /// The playback channel raised an interrupt.
    PlaybackIrq(InterruptCause),
}

/// Why the pipeline froze.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HaltCause {
    /// The capture channel reported an abnormal cause.
    Capture(InterruptCause),
    /// The archive channel reported an abnormal cause.
    Archive(InterruptCause),
    /// The playback channel reported an abnormal cause.
    Playback(InterruptCause),
    /// A serial FIFO overflowed.
    Serial(uart::Error),
    /// The dispatch queue overflowed; interrupt events were lost.
    EventOverflow,
}

/// Errors raised while building a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The configured start date/time is out of range.
    InvalidDateTime(crate::rtc::Error),
    /// A transfer descriptor was rejected.
    Dma(DmaError),
}

/// Build-time configuration: start time, alarm filter, and line settings.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Date and time the clock starts at.
    pub start: DateTime,
    /// Alarm filter; the default fires every second.
    pub alarm: AlarmFilter,
    /// Serial line configuration.
    pub uart: UartConfig,
}

impl Default for PipelineConfig {
    /// 12:00:00 on Mar 30 2017, a once-per-second alarm, 9600-8-N-1.
    fn default() -> Self {
        PipelineConfig {
            start: DateTime {
                year: 2017,
                month: 3,
                day: 30,
                day_of_week: DayOfWeek::Thursday,
                hour: 12,
                minute: 0,
                second: 0,
            },
            alarm: AlarmFilter::every_second(),
            uart: common_configs::_9600_8_N_1,
        }
    }
}

/// Which descriptor of the capture chain runs next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CapturePhase {
    /// Descriptor 1: stamp cell into the head of the packet buffer.
    Stamp,
    /// Descriptor 2: RX FIFO bytes into the tail, one per trigger.
    Payload,
}

/// The assembled pipeline.
pub struct Pipeline {
    uart: Uart,
    rtc: Rtc,
    stamp: StampCell,
    packet: PacketBuffer,
    log: LogBuffer,
    capture_ch: Channel,
    archive_ch: Channel,
    playback_ch: Channel,
    stamp_desc: Descriptor,
    payload_desc: Descriptor,
    archive_desc: Descriptor,
    playback_desc: Descriptor,
    capture_phase: CapturePhase,
    events: Deque<Event, EVENT_QUEUE_DEPTH>,
    halted: Option<HaltCause>,
}

impl Pipeline {
    /// Builds the pipeline: descriptors validated, capture and archive
    /// channels armed, playback configured but left disabled so it cannot
    /// fire with a partially filled log.
    pub fn new(config: PipelineConfig) -> Result<Self, Error> {
        let mut rtc = Rtc::new(config.start).map_err(Error::InvalidDateTime)?;
        rtc.set_alarm(config.alarm);

        let stamp_desc = Descriptor::one_d(
            Endpoint::memory(0),
            Endpoint::memory(0),
            STAMP_SIZE,
            TriggerGranularity::Descriptor,
        )
        .map_err(Error::Dma)?;
        let payload_desc = Descriptor::one_d(
            Endpoint::register(),
            Endpoint::memory(STAMP_SIZE),
            PAYLOAD_SIZE,
            TriggerGranularity::Element,
        )
        .map_err(Error::Dma)?;
        // The packet buffer is re-read from offset 0 on every Y iteration
        // (stride 0); the log advances one full entry per row.
        let archive_desc = Descriptor::two_d(
            Endpoint::memory_2d(0, 0),
            Endpoint::memory_2d(0, ENTRY_SIZE),
            ENTRY_SIZE,
            LOG_SLOTS,
            TriggerGranularity::XLoop,
        )
        .map_err(Error::Dma)?;
        let playback_desc = Descriptor::two_d(
            Endpoint::memory_2d(0, ENTRY_SIZE),
            Endpoint::register(),
            ENTRY_SIZE,
            LOG_SLOTS,
            TriggerGranularity::Descriptor,
        )
        .map_err(Error::Dma)?;

        let mut capture_ch = Channel::new();
        capture_ch.set_descriptor(stamp_desc);
        capture_ch.enable();

        let mut archive_ch = Channel::new();
        archive_ch.set_descriptor(archive_desc);
        archive_ch.enable();

        // Configured, armed, but disabled until the archive stage completes.
        let mut playback_ch = Channel::new();
        playback_ch.set_descriptor(playback_desc);

        Ok(Pipeline {
            uart: Uart::new(config.uart),
            rtc,
            stamp: StampCell::new(),
            packet: PacketBuffer::new(),
            log: LogBuffer::new(),
            capture_ch,
            archive_ch,
            playback_ch,
            stamp_desc,
            payload_desc,
            archive_desc,
            playback_desc,
            capture_phase: CapturePhase::Stamp,
            events: Deque::new(),
            halted: None,
        })
    }

    /// Emits the terminal banner and primes the stamp cell.
    ///
    /// The stamp cell is primed from the configured start time, so a packet
    /// arriving before the first alarm tick still gets a real stamp.
    pub fn start(&mut self) {
        // VT100: erase the screen, cursor home.
        self.uart.put_string("\x1b[2J\x1b[;H");
        self.uart
            .put_string("\r\n****************************************************************\r\n");
        self.uart
            .put_string("Multiple DMA concatenation: send a 5 character packet to add an\r\n");
        self.uart
            .put_string("RTC timestamp. After 4 packets the data is echoed back.\r\n");
        self.uart.put_string(PROMPT_FIRST);

        let mut stamp = [0u8; STAMP_SIZE];
        format_stamp(&self.rtc.now(), &mut stamp);
        self.stamp.store(&stamp);
    }

    /// Wire side: one byte arrives on the serial line.
    pub fn receive_byte(&mut self, byte: u8) {
        if self.halted.is_some() {
            return;
        }
        self.uart.receive(byte);
    }

    /// Wire side: a run of bytes arrives on the serial line.
    pub fn receive(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.receive_byte(byte);
        }
    }

    /// Advances the clock by one second, queueing the alarm interrupt if it
    /// fired.
    pub fn tick_second(&mut self) {
        if self.halted.is_some() {
            return;
        }
        if self.rtc.tick_second() {
            self.raise(Event::RtcAlarm);
        }
    }

    /// Runs queued interrupts and services the RX trigger line until nothing
    /// is pending. Returns immediately once halted.
    pub fn poll(&mut self) {
        while self.halted.is_none() {
            // The serial error interrupt outranks everything else.
            if let Some(err) = self.uart.fifo_status() {
                self.halt(HaltCause::Serial(err));
                return;
            }
            if let Some(ev) = self.events.pop_front() {
                self.handle(ev);
                continue;
            }
            if self.uart.rx_len() > 0 && self.capture_ch.can_trigger() {
                self.capture_service();
                continue;
            }
            break;
        }
    }

    /// Why the pipeline froze, if it has.
    pub fn halted(&self) -> Option<HaltCause> {
        self.halted
    }

    /// The archived log.
    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// The clock.
    pub fn rtc(&self) -> &Rtc {
        &self.rtc
    }

    /// The serial block (wire side: drain the TX backlog from here).
    pub fn uart_mut(&mut self) -> &mut Uart {
        &mut self.uart
    }

    /// The serial block.
    pub fn uart(&self) -> &Uart {
        &self.uart
    }

    /// The next log slot the archive stage will fill, wrapping to 0 when the
    /// log completes and is handed to playback.
    ///
    /// Slot advancement is derived from the channel's own transfer progress,
    /// not from a hidden hardware counter.
    pub fn archive_slot(&self) -> usize {
        self.archive_ch.progress() / ENTRY_SIZE
    }

    /// Capture, archive, and playback channel states, in stage order.
    pub fn stage_states(&self) -> (ChannelState, ChannelState, ChannelState) {
        (
            self.capture_ch.state(),
            self.archive_ch.state(),
            self.playback_ch.state(),
        )
    }

    fn raise(&mut self, event: Event) {
        if self.events.push_back(event).is_err() {
            self.halt(HaltCause::EventOverflow);
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::RtcAlarm => self.alarm_isr(),
            Event::CaptureIrq(cause) => self.capture_isr(cause),
            Event::ArchiveTrigger => self.archive_trigger(),
            Event::ArchiveIrq(cause) => self.archive_isr(cause),
            Event::PlaybackTrigger => self.playback_trigger(),
            Event::PlaybackIrq(cause) => self.playback_isr(cause),
        }
    }

    /// RX trigger line: run the capture descriptor chain for one byte.
    fn capture_service(&mut self) {
        if self.capture_phase == CapturePhase::Stamp {
            // Descriptor 1 runs whole on the packet's first trigger, then the
            // chain advances. No interrupt fires between chained descriptors.
            self.capture_ch.trigger(&mut self.stamp, &mut self.packet);
            match self.capture_ch.take_interrupt() {
                Some(InterruptCause::Completion) => {
                    self.capture_ch.set_descriptor(self.payload_desc);
                    self.capture_phase = CapturePhase::Payload;
                }
                Some(cause) => {
                    self.raise(Event::CaptureIrq(cause));
                    return;
                }
                None => return,
            }
        }
        // Descriptor 2: one payload byte per trigger.
        self.capture_ch.trigger(&mut self.uart, &mut self.packet);
        if let Some(cause) = self.capture_ch.take_interrupt() {
            self.raise(Event::CaptureIrq(cause));
        }
    }

    /// Capture completion ISR: reset the descriptor chain and pulse the
    /// archive trigger.
    fn capture_isr(&mut self, cause: InterruptCause) {
        if cause != InterruptCause::Completion {
            self.halt(HaltCause::Capture(cause));
            return;
        }
        self.capture_ch.set_descriptor(self.stamp_desc);
        self.capture_phase = CapturePhase::Stamp;
        self.raise(Event::ArchiveTrigger);
    }

    /// Archive trigger line: move one packet into the next log slot.
    fn archive_trigger(&mut self) {
        self.archive_ch.trigger(&mut self.packet, &mut self.log);
        if let Some(cause) = self.archive_ch.take_interrupt() {
            self.raise(Event::ArchiveIrq(cause));
        }
    }

    /// Archive completion ISR: the log is full. Freeze the archive stage and
    /// hand the log to playback.
    fn archive_isr(&mut self, cause: InterruptCause) {
        if cause != InterruptCause::Completion {
            self.halt(HaltCause::Archive(cause));
            return;
        }
        // Append-disabled until playback flushes the log: a fifth packet
        // cannot touch slots 0-3.
        self.archive_ch.disable();
        self.playback_ch.set_descriptor(self.playback_desc);
        self.playback_ch.enable();
        self.raise(Event::PlaybackTrigger);
    }

    /// Playback trigger line: burst the whole log out of the TX path.
    fn playback_trigger(&mut self) {
        self.playback_ch.trigger(&mut self.log, &mut self.uart);
        if let Some(cause) = self.playback_ch.take_interrupt() {
            self.raise(Event::PlaybackIrq(cause));
        }
    }

    /// Playback completion ISR.
    fn playback_isr(&mut self, cause: InterruptCause) {
        match cause {
            InterruptCause::Completion => {
                self.uart.put_string(PROMPT_NEXT);
                // Disabled until the archive stage fills the log again, and
                // the log is handed back to the archive stage. Stages 2 and 3
                // are never armed at the same time.
                self.playback_ch.disable();
                self.archive_ch.set_descriptor(self.archive_desc);
                self.archive_ch.enable();
            }
            // A stray trigger with no descriptor armed is not an error here.
            InterruptCause::CurrPtrNull => {
                self.playback_ch.disable();
            }
            cause => self.halt(HaltCause::Playback(cause)),
        }
    }

    /// One-second alarm ISR: reformat the stamp from the current time.
    fn alarm_isr(&mut self) {
        let mut stamp = [0u8; STAMP_SIZE];
        format_stamp(&self.rtc.now(), &mut stamp);
        self.stamp.store(&stamp);
    }

    /// Crash loud: freeze every stage and ignore all further stimulus. On
    /// hardware this is the ISR's infinite spin; here the cause is latched
    /// and observable instead.
    fn halt(&mut self, cause: HaltCause) {
        self.capture_ch.halt();
        self.archive_ch.halt();
        self.playback_ch.halt();
        self.events.clear();
        self.halted = Some(cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drained(p: &mut Pipeline) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let n = p.uart_mut().drain_tx(&mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn startup_primes_the_stamp_cell() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        p.start();
        assert_eq!(&p.stamp.load(), b"\r\n12:00:00 03/30/17 ");
    }

    #[test]
    fn banner_ends_with_the_first_prompt() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        p.start();
        let out = drained(&mut p);
        assert!(out.ends_with(PROMPT_FIRST.as_bytes()));
    }

    #[test]
    fn one_packet_lands_in_slot_zero() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        p.start();
        let _ = drained(&mut p);

        p.receive(b"abcde");
        p.poll();

        assert_eq!(p.archive_slot(), 1);
        assert_eq!(&p.log().entry(0)[..STAMP_SIZE], b"\r\n12:00:00 03/30/17 ");
        assert_eq!(&p.log().entry(0)[STAMP_SIZE..], b"abcde");
        // Nothing played back yet.
        assert_eq!(p.uart().tx_len(), 0);
    }

    #[test]
    fn alarm_updates_the_stamp_between_packets() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        p.start();

        p.receive(b"first");
        p.poll();
        p.tick_second();
        p.poll();
        p.receive(b"secnd");
        p.poll();

        assert_eq!(&p.log().entry(0)[..STAMP_SIZE], b"\r\n12:00:00 03/30/17 ");
        assert_eq!(&p.log().entry(1)[..STAMP_SIZE], b"\r\n12:00:01 03/30/17 ");
    }

    #[test]
    fn playback_stays_disabled_until_the_log_is_full() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        p.start();

        for packet in [b"aaaaa", b"bbbbb", b"ccccc"] {
            p.receive(packet);
            p.poll();
        }
        let (_, _, playback) = p.stage_states();
        assert_eq!(playback, ChannelState::Disabled);
    }

    #[test]
    fn event_queue_overflow_halts() {
        let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
        p.start();
        for _ in 0..=EVENT_QUEUE_DEPTH {
            p.raise(Event::RtcAlarm);
        }
        assert_eq!(p.halted(), Some(HaltCause::EventOverflow));
    }
}
