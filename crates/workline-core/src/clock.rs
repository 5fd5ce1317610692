//! Monotonic high-resolution clock.
//!
//! Ticks are counted from a process-wide epoch captured on first use, at a
//! fixed frequency of one tick per nanosecond.

use std::sync::OnceLock;
use std::time::Instant;

use crate::invariant;

const MICROS_PER_SECOND: u64 = 1_000_000;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Process-wide monotonic tick counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighResClock;

impl HighResClock {
    /// Ticks per second.
    pub const FREQUENCY: u64 = 1_000_000_000;

    /// Current tick count.
    #[inline]
    #[must_use]
    pub fn ticks() -> u64 {
        u64::try_from(epoch().elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Ticks per second. Never changes during the life of the process.
    #[inline]
    #[must_use]
    pub const fn frequency() -> u64 {
        Self::FREQUENCY
    }

    /// Elapsed seconds between two tick values.
    #[must_use]
    pub fn seconds(begin: u64, end: u64) -> f64 {
        end.saturating_sub(begin) as f64 / Self::FREQUENCY as f64
    }

    /// Elapsed milliseconds between two tick values.
    #[must_use]
    pub fn millis(begin: u64, end: u64) -> f64 {
        end.saturating_sub(begin) as f64 * 1_000.0 / Self::FREQUENCY as f64
    }

    /// Elapsed microseconds between two tick values.
    #[must_use]
    pub fn micros(begin: u64, end: u64) -> f64 {
        end.saturating_sub(begin) as f64 * 1_000_000.0 / Self::FREQUENCY as f64
    }

    /// Elapsed nanoseconds between two tick values.
    #[must_use]
    pub fn nanos(begin: u64, end: u64) -> f64 {
        end.saturating_sub(begin) as f64 * 1_000_000_000.0 / Self::FREQUENCY as f64
    }
}

/// Convert a tick value to whole microseconds.
///
/// Uses truncating integer division, `ticks * 1_000_000 / frequency`, widened
/// so large counters never overflow.
#[must_use]
pub fn ticks_to_micros(ticks: u64, frequency: u64) -> u64 {
    invariant!(frequency != 0, "clock frequency must be non-zero");
    let micros = u128::from(ticks) * u128::from(MICROS_PER_SECOND) / u128::from(frequency);
    u64::try_from(micros).unwrap_or(u64::MAX)
}

/// Measures elapsed time from a starting tick.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    begin: u64,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

impl Stopwatch {
    /// Start measuring from now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            begin: HighResClock::ticks(),
        }
    }

    /// Restart from now.
    pub fn reset(&mut self) {
        self.begin = HighResClock::ticks();
    }

    /// Tick the stopwatch was started at.
    #[must_use]
    pub const fn begin(&self) -> u64 {
        self.begin
    }

    #[must_use]
    pub fn elapsed_ticks(&self) -> u64 {
        HighResClock::ticks().saturating_sub(self.begin)
    }

    #[must_use]
    pub fn elapsed_millis(&self) -> f64 {
        HighResClock::millis(self.begin, HighResClock::ticks())
    }

    #[must_use]
    pub fn elapsed_micros(&self) -> f64 {
        HighResClock::micros(self.begin, HighResClock::ticks())
    }
}
