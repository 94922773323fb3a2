//! Serial communication block model.
//!
//! A byte-wide UART with a bounded RX FIFO and a TX backlog, shaped after the
//! data-register view a DMA unit gets of a serial block: reading pops the RX
//! FIFO, writing pushes toward the line. The host plays the role of the wire,
//! injecting received bytes with [`Uart::receive`] and draining transmitted
//! bytes with [`Uart::drain_tx`].
//!
//! FIFO trouble is sticky: an overflow on either side latches into
//! [`Uart::fifo_status`] and stays there until explicitly cleared, which is
//! what the pipeline's error monitor keys off.

/// Common line configurations.
pub mod common_configs;

use crate::dma::{DmaError, ReadTarget, WriteTarget};
use fugit::HertzU32;
use heapless::Deque;

/// RX FIFO depth, in bytes.
pub const RX_FIFO_DEPTH: usize = 128;

/// Bytes the TX side will buffer before the line consumer drains them.
///
/// The transmit path runs at wire speed on hardware; here the backlog stands
/// in for everything the terminal has not read yet. Letting it fill up models
/// a stalled line.
pub const TX_BACKLOG_DEPTH: usize = 1024;

/// Data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    /// 5 data bits
    Five,
    /// 6 data bits
    Six,
    /// 7 data bits
    Seven,
    /// 8 data bits
    Eight,
}

/// Stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit
    One,
    /// 2 stop bits
    Two,
}

/// Parity generation and checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// A complete line configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Baud rate
    pub baudrate: HertzU32,
    /// Data bits per character
    pub data_bits: DataBits,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Parity, or none
    pub parity: Option<Parity>,
}

/// Sticky FIFO error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A byte arrived while the RX FIFO was full and was lost.
    RxOverflow,
    /// A write was issued while the TX backlog was full and was lost.
    TxOverflow,
}

/// The serial block.
#[derive(Debug)]
pub struct Uart {
    config: UartConfig,
    rx: Deque<u8, RX_FIFO_DEPTH>,
    tx: Deque<u8, TX_BACKLOG_DEPTH>,
    rx_overflow: bool,
    tx_overflow: bool,
}

impl Uart {
    /// Creates an idle UART with the given line configuration.
    pub fn new(config: UartConfig) -> Self {
        Uart {
            config,
            rx: Deque::new(),
            tx: Deque::new(),
            rx_overflow: false,
            tx_overflow: false,
        }
    }

    /// The active line configuration.
    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    /// Wire side: a byte arrives from the line.
    ///
    /// If the RX FIFO is full the byte is lost and `RxOverflow` latches.
    pub fn receive(&mut self, byte: u8) {
        if self.rx.push_back(byte).is_err() {
            self.rx_overflow = true;
        }
    }

    /// Bytes currently waiting in the RX FIFO.
    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    /// Bytes queued on the TX side, not yet drained by the line consumer.
    pub fn tx_len(&self) -> usize {
        self.tx.len()
    }

    /// Reads one byte from the RX FIFO.
    pub fn read(&mut self) -> nb::Result<u8, Error> {
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }

    /// Writes one byte toward the line.
    pub fn write(&mut self, byte: u8) -> nb::Result<(), Error> {
        match self.tx.push_back(byte) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.tx_overflow = true;
                Err(nb::Error::Other(Error::TxOverflow))
            }
        }
    }

    /// Writes a whole string toward the line, stopping early on overflow.
    pub fn put_string(&mut self, s: &str) {
        for &byte in s.as_bytes() {
            if self.write(byte).is_err() {
                break;
            }
        }
    }

    /// Wire side: drains transmitted bytes into `buf`, returning the count.
    pub fn drain_tx(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.tx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// The first latched FIFO error, if any.
    pub fn fifo_status(&self) -> Option<Error> {
        if self.rx_overflow {
            Some(Error::RxOverflow)
        } else if self.tx_overflow {
            Some(Error::TxOverflow)
        } else {
            None
        }
    }

    /// Clears all latched FIFO errors.
    pub fn clear_fifo_status(&mut self) {
        self.rx_overflow = false;
        self.tx_overflow = false;
    }
}

/// The RX data register: every word read pops the FIFO.
impl ReadTarget for Uart {
    type ReceivedWord = u8;

    fn read_word(&mut self, _offset: usize) -> Result<u8, DmaError> {
        self.rx.pop_front().ok_or(DmaError::SrcBus)
    }

    fn rx_increment(&self) -> bool {
        false
    }
}

/// The TX data register: every word written pushes toward the line.
impl WriteTarget for Uart {
    type TransmittedWord = u8;

    fn write_word(&mut self, _offset: usize, word: u8) -> Result<(), DmaError> {
        match self.tx.push_back(word) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.tx_overflow = true;
                Err(DmaError::DstBus)
            }
        }
    }

    fn tx_increment(&self) -> bool {
        false
    }
}

impl embedded_hal_nb::serial::Error for Error {
    fn kind(&self) -> embedded_hal_nb::serial::ErrorKind {
        embedded_hal_nb::serial::ErrorKind::Overrun
    }
}

impl embedded_hal_nb::serial::ErrorType for Uart {
    type Error = Error;
}

impl embedded_hal_nb::serial::Read<u8> for Uart {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        Uart::read(self)
    }
}

impl embedded_hal_nb::serial::Write<u8> for Uart {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        Uart::write(self, word)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.tx.is_empty() {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}
