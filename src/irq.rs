//! Level-triggered interrupt line.
//!
//! Multiple sources (the APU frame counter, the DMC channel, the mapper's
//! scanline counter) share the CPU's single IRQ input. Each source owns one
//! bit of the line; asserting or acknowledging touches only that bit, so
//! sources never clobber each other and the order of operations does not
//! matter. The CPU sees a pending interrupt while any bit is set.

/// An interrupt source's bit on the line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqSource {
    FrameCounter = 1 << 0,
    Dmc = 1 << 1,
    MapperScanline = 1 << 2,
}

/// OR-aggregation of every source's level.
#[derive(Default)]
pub struct IrqLine {
    mask: u8,
}

impl IrqLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise `source`'s bit. Idempotent.
    pub fn assert(&mut self, source: IrqSource) {
        self.mask |= source as u8;
    }

    /// Drop `source`'s bit, leaving every other source's level alone.
    /// Idempotent.
    pub fn ack(&mut self, source: IrqSource) {
        self.mask &= !(source as u8);
    }

    /// The full per-source mask.
    pub fn value(&self) -> u8 {
        self.mask
    }

    /// True while any source holds the line.
    pub fn pending(&self) -> bool {
        self.mask != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_starts_clear() {
        let line = IrqLine::new();
        assert!(!line.pending());
        assert_eq!(line.value(), 0);
    }

    #[test]
    fn ack_clears_only_the_callers_bit() {
        let sources = [
            IrqSource::FrameCounter,
            IrqSource::Dmc,
            IrqSource::MapperScanline,
        ];
        // For every pair of distinct sources: assert both, ack one, the
        // other's level must survive.
        for &a in &sources {
            for &b in &sources {
                if a == b {
                    continue;
                }
                let mut line = IrqLine::new();
                line.assert(a);
                line.assert(b);
                line.ack(a);
                assert_eq!(line.value(), b as u8);
                assert!(line.pending());
            }
        }
    }

    #[test]
    fn assert_is_idempotent() {
        let mut line = IrqLine::new();
        line.assert(IrqSource::Dmc);
        line.assert(IrqSource::Dmc);
        assert_eq!(line.value(), IrqSource::Dmc as u8);
        line.ack(IrqSource::Dmc);
        assert!(!line.pending());
    }

    #[test]
    fn ack_of_a_clear_source_is_a_no_op() {
        let mut line = IrqLine::new();
        line.assert(IrqSource::FrameCounter);
        line.ack(IrqSource::MapperScanline);
        line.ack(IrqSource::MapperScanline);
        assert_eq!(line.value(), IrqSource::FrameCounter as u8);
    }
}
