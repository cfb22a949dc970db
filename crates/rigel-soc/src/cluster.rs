//! Core count and clock for the RV8 cluster.

/// Number of worker cores in one cluster.
///
/// The fork-join engine can run a team of any size up to this; asking for
/// more is a programming error, not a truncation.
pub const CLUSTER_CORES: usize = 8;

/// Nominal cluster clock in Hz (400 MHz).
///
/// The software cluster derives its cycle counters from wall time at this
/// clock, so reported cycle counts scale with host speed.
pub const NOMINAL_CLOCK_HZ: u64 = 400_000_000;

/// Convert wall-clock nanoseconds to cycles at the nominal clock.
///
/// Widens to `u128` so the product cannot overflow; the result fits `u64`
/// for any span the cluster can measure.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
pub const fn nanos_to_cycles(nanos: u64) -> u64 {
    (nanos as u128 * NOMINAL_CLOCK_HZ as u128 / 1_000_000_000) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_second_is_the_nominal_clock() {
        assert_eq!(nanos_to_cycles(1_000_000_000), NOMINAL_CLOCK_HZ);
    }

    #[test]
    fn sub_microsecond_conversion() {
        // 2.5 µs at 400 MHz is exactly 1000 cycles.
        assert_eq!(nanos_to_cycles(2_500), 1_000);
        assert_eq!(nanos_to_cycles(0), 0);
    }
}
