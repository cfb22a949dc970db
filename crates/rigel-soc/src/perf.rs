//! Performance-counter event numbering.
//!
//! Raw event indices shared by the counter model and the instrumentation
//! layer. The bit position of an event in a configuration mask is its raw
//! index.

/// Number of counter events the cluster exposes.
pub const EVENT_COUNT: usize = 7;

/// Raw event indices.
pub mod event {
    /// Total cycles.
    pub const CYCLES: u8 = 0;
    /// Instructions retired.
    pub const INSTR: u8 = 1;
    /// Cycles the core was active (not stalled).
    pub const ACTIVE: u8 = 2;
    /// Load words.
    pub const LD: u8 = 3;
    /// Store words.
    pub const ST: u8 = 4;
    /// Cycles stalled waiting on loads.
    pub const LD_STALL: u8 = 5;
    /// Instruction-cache misses.
    pub const IMISS: u8 = 6;
}

/// Configuration-mask bit for one raw event index.
#[must_use]
pub const fn event_bit(code: u8) -> u32 {
    1 << code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_codes_are_dense_and_distinct() {
        let codes = [
            event::CYCLES,
            event::INSTR,
            event::ACTIVE,
            event::LD,
            event::ST,
            event::LD_STALL,
            event::IMISS,
        ];
        for (i, c) in codes.iter().enumerate() {
            assert_eq!(usize::from(*c), i);
        }
        assert_eq!(codes.len(), EVENT_COUNT);
    }

    #[test]
    fn mask_bits_do_not_collide() {
        let all = event_bit(event::CYCLES)
            | event_bit(event::INSTR)
            | event_bit(event::ACTIVE)
            | event_bit(event::LD)
            | event_bit(event::ST)
            | event_bit(event::LD_STALL)
            | event_bit(event::IMISS);
        assert_eq!(all, 0x7F);
    }
}
