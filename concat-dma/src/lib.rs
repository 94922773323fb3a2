//! Interrupt-chained DMA concatenation pipeline.
//!
//! Three DMA stages cooperate to timestamp incoming serial packets and echo a
//! batch of results back out:
//!
//! * **Capture**: a two-descriptor chain copies the current timestamp string
//!   and then five payload bytes from the serial RX FIFO into a packet buffer.
//! * **Archive**: a 2-D transfer appends the finished packet to a four-slot
//!   log, one row per capture completion.
//! * **Playback**: once the log is full, a single 2-D burst streams all four
//!   entries back out of the serial TX path and re-arms the cycle.
//!
//! On silicon this trigger graph lives entirely in hardware: each completion
//! interrupt re-arms the next stage and the CPU sleeps. This crate models the
//! same graph with explicit channel state machines and an event dispatch step
//! ([`Pipeline::poll`]), so the stage sequencing, error halting, and buffer
//! hand-off rules can be exercised on a host without any silicon attached.
//! Memory endpoints speak [`embedded_dma`]'s buffer contract, so any `'static`
//! buffer works as a transfer source or sink.
//!
//! ```
//! use concat_dma::{Pipeline, PipelineConfig};
//!
//! let mut p = Pipeline::new(PipelineConfig::default()).unwrap();
//! p.start();
//!
//! // One packet: five bytes on the wire, then let the interrupts run.
//! p.receive(b"hello");
//! p.poll();
//!
//! // 20 bytes of timestamp followed by the payload, archived in slot 0.
//! assert_eq!(&p.log().entry(0)[20..], b"hello");
//! ```
//!
//! The fault-frame dump used by the companion fault-handling demo lives in
//! [`fault`], as plain data plus a pure formatter.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod buffer;
pub mod dma;
pub mod fault;
pub mod pipeline;
pub mod rtc;
pub mod uart;

pub use pipeline::{HaltCause, Pipeline, PipelineConfig};
