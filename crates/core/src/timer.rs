//! Calibrated spin-delay primitive and the engine's virtual clock.
//!
//! The target hardware has no timer interrupt free for timekeeping, so
//! all pacing is a software counting loop: one delay "unit" is
//! `delay_count + 1` iterations of an inner loop, each iteration costing a
//! fixed number of clock cycles. Here the loop is modeled rather than spun:
//! [`SpinTimer::delay`] charges the calibrated cycle cost to a monotonic
//! `u64` tick counter denominated in 9.6 MHz clock cycles, and that counter
//! is the engine's only notion of time.
//!
//! The real loop needs a side-effecting write inside its body so the
//! compiler cannot elide it; a modeled delay has no such problem, and only
//! the calibrated durations are preserved.

/// Delay count making one unit ≈ 0.1 ms.
pub const TENTH_MS: u16 = 112;
/// Delay count for pacing between waveform samples.
pub const SAMP: u16 = 10;
/// Unit count for a 1 second delay when the count is [`TENTH_MS`].
pub const ONE_SEC: u16 = 10_000;

/// Measured cost of one inner loop iteration, in half-cycles. 8.5 cycles
/// per iteration makes `delay(ONE_SEC, TENTH_MS)` come out at ~1 s of
/// 9.6 MHz clock; doubled so the arithmetic stays integral.
const SPIN_ITER_HALF_CYCLES: u64 = 17;

/// Monotonic virtual clock with the calibrated spin-delay cost model.
#[derive(Debug, Clone)]
pub struct SpinTimer {
    tick: u64,
}

impl SpinTimer {
    pub fn new() -> Self {
        SpinTimer { tick: 0 }
    }

    /// Current clock value in cycles since power-on.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Block (virtually) for `units` delay units, each unit being
    /// `delay_count + 1` inner iterations. `delay(0, _)` is a no-op.
    pub fn delay(&mut self, units: u16, delay_count: u16) {
        let iters = units as u64 * (delay_count as u64 + 1);
        self.tick += iters * SPIN_ITER_HALF_CYCLES / 2;
    }

    /// Restore the clock from a captured state.
    pub(crate) fn restore(&mut self, tick: u64) {
        self.tick = tick;
    }
}

impl Default for SpinTimer {
    fn default() -> Self {
        SpinTimer::new()
    }
}
