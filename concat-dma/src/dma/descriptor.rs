//! Transfer descriptors.

use super::DmaError;

/// Transfer dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferShape {
    /// X loop only.
    OneD,
    /// X and Y loops; the Y loop advances each endpoint by its row stride.
    TwoD,
}

/// How much of the descriptor a single trigger moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerGranularity {
    /// One word per trigger (peripheral-paced transfers).
    Element,
    /// One full X loop (row) per trigger.
    XLoop,
    /// The whole descriptor in one burst.
    Descriptor,
}

/// One side of a transfer: a base offset into the target plus addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Endpoint {
    offset: usize,
    increment: bool,
    y_stride: usize,
}

impl Endpoint {
    /// Incrementing memory endpoint for 1-D transfers.
    pub const fn memory(offset: usize) -> Self {
        Endpoint {
            offset,
            increment: true,
            y_stride: 0,
        }
    }

    /// Incrementing memory endpoint with a per-row stride.
    ///
    /// A stride of 0 re-reads (or re-writes) the same row on every Y
    /// iteration, which is how a single staging buffer feeds a multi-slot
    /// destination.
    pub const fn memory_2d(offset: usize, y_stride: usize) -> Self {
        Endpoint {
            offset,
            increment: true,
            y_stride,
        }
    }

    /// Non-incrementing endpoint, such as a FIFO data register.
    pub const fn register() -> Self {
        Endpoint {
            offset: 0,
            increment: false,
            y_stride: 0,
        }
    }

    /// Word index addressed at X/Y loop position (`x`, `y`).
    fn word_index(&self, x: usize, y: usize) -> usize {
        if self.increment {
            self.offset + x + y * self.y_stride
        } else {
            self.offset
        }
    }
}

/// Hardware-style transfer configuration: source, destination, and geometry.
///
/// A descriptor is a plain value; arming a [`Channel`](super::Channel) copies
/// it, so the same descriptor can re-arm a channel any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Descriptor {
    shape: TransferShape,
    src: Endpoint,
    dst: Endpoint,
    x_count: usize,
    y_count: usize,
    granularity: TriggerGranularity,
}

impl Descriptor {
    /// Creates a 1-D descriptor moving `x_count` words.
    pub fn one_d(
        src: Endpoint,
        dst: Endpoint,
        x_count: usize,
        granularity: TriggerGranularity,
    ) -> Result<Self, DmaError> {
        Self::validate(TransferShape::OneD, src, dst, x_count, 1, granularity)
    }

    /// Creates a 2-D descriptor moving `y_count` rows of `x_count` words.
    pub fn two_d(
        src: Endpoint,
        dst: Endpoint,
        x_count: usize,
        y_count: usize,
        granularity: TriggerGranularity,
    ) -> Result<Self, DmaError> {
        Self::validate(TransferShape::TwoD, src, dst, x_count, y_count, granularity)
    }

    fn validate(
        shape: TransferShape,
        src: Endpoint,
        dst: Endpoint,
        x_count: usize,
        y_count: usize,
        granularity: TriggerGranularity,
    ) -> Result<Self, DmaError> {
        if x_count == 0 || y_count == 0 {
            return Err(DmaError::IllegalConfig);
        }
        // A non-zero stride shorter than the row makes Y iterations overlap.
        for ep in [&src, &dst] {
            if ep.increment && y_count > 1 && ep.y_stride != 0 && ep.y_stride < x_count {
                return Err(DmaError::IllegalConfig);
            }
        }
        Ok(Descriptor {
            shape,
            src,
            dst,
            x_count,
            y_count,
            granularity,
        })
    }

    /// Transfer dimensionality.
    pub fn shape(&self) -> TransferShape {
        self.shape
    }

    /// Words per X loop.
    pub fn x_count(&self) -> usize {
        self.x_count
    }

    /// Number of Y iterations (1 for 1-D descriptors).
    pub fn y_count(&self) -> usize {
        self.y_count
    }

    /// How much data one trigger moves.
    pub fn granularity(&self) -> TriggerGranularity {
        self.granularity
    }

    /// Total words moved by the full descriptor.
    pub fn total_words(&self) -> usize {
        self.x_count * self.y_count
    }

    /// Words moved by a single trigger.
    pub fn words_per_trigger(&self) -> usize {
        match self.granularity {
            TriggerGranularity::Element => 1,
            TriggerGranularity::XLoop => self.x_count,
            TriggerGranularity::Descriptor => self.total_words(),
        }
    }

    /// Source and destination word indices for the word at `progress`.
    pub(crate) fn word_offsets(&self, progress: usize) -> (usize, usize) {
        let x = progress % self.x_count;
        let y = progress / self.x_count;
        (self.src.word_index(x, y), self.dst.word_index(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_counts() {
        assert_eq!(
            Descriptor::one_d(
                Endpoint::memory(0),
                Endpoint::memory(0),
                0,
                TriggerGranularity::Descriptor,
            ),
            Err(DmaError::IllegalConfig)
        );
        assert_eq!(
            Descriptor::two_d(
                Endpoint::memory_2d(0, 8),
                Endpoint::memory_2d(0, 8),
                8,
                0,
                TriggerGranularity::XLoop,
            ),
            Err(DmaError::IllegalConfig)
        );
    }

    #[test]
    fn rejects_overlapping_rows() {
        assert_eq!(
            Descriptor::two_d(
                Endpoint::memory_2d(0, 0),
                Endpoint::memory_2d(0, 4),
                8,
                4,
                TriggerGranularity::XLoop,
            ),
            Err(DmaError::IllegalConfig)
        );
    }

    #[test]
    fn zero_stride_reloads_the_row() {
        let d = Descriptor::two_d(
            Endpoint::memory_2d(0, 0),
            Endpoint::memory_2d(0, 8),
            8,
            3,
            TriggerGranularity::XLoop,
        )
        .unwrap();
        // Word 10 is x=2 of row 1: source re-reads offset 2, destination
        // lands one full row further on.
        assert_eq!(d.word_offsets(10), (2, 10));
        assert_eq!(d.total_words(), 24);
        assert_eq!(d.words_per_trigger(), 8);
    }

    #[test]
    fn register_endpoint_never_advances() {
        let d = Descriptor::one_d(
            Endpoint::register(),
            Endpoint::memory(20),
            5,
            TriggerGranularity::Element,
        )
        .unwrap();
        assert_eq!(d.word_offsets(0), (0, 20));
        assert_eq!(d.word_offsets(4), (0, 24));
    }
}
