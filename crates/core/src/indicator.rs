//! Indicator driver: LED toggle rules tied to playback events.
//!
//! The three lines blink in a pattern derived from the music itself rather
//! than from any timer of their own: green and red react to waveform
//! wraparounds, filtered by modulo tests on the current rate, and blue
//! reacts to every pitch-entry advance. All reactions are XOR toggles, so
//! the lights accumulate state across script passes.

use crate::port::{Led, OutputPort};
use crate::timer::{SpinTimer, TENTH_MS};

/// Which of green/red react to a wraparound at this rate.
///
/// The two conditions per line overlap for many rates (`% 20` implies
/// `% 10`, `% 40` overlaps `% 10`), and that overlap is the point: the
/// rates in the script hit the four moduli in different combinations, and
/// the blink pattern depends on exactly this condition set. Do not
/// simplify it.
pub fn wrap_toggles(rate: u8) -> (bool, bool) {
    let green = rate % 50 == 0 || rate % 20 == 0;
    let red = rate % 40 == 0 || rate % 10 == 0;
    (green, red)
}

/// Waveform wraparound event: apply the modulo rules at the current rate.
pub fn on_wraparound(port: &mut OutputPort, tick: u64, rate: u8) {
    let (green, red) = wrap_toggles(rate);
    if green {
        port.toggle(tick, Led::Green);
    }
    if red {
        port.toggle(tick, Led::Red);
    }
}

/// Pitch-entry advance event: blue toggles unconditionally.
pub fn on_advance(port: &mut OutputPort, tick: u64) {
    port.toggle(tick, Led::Blue);
}

/// Blink all three LEDs while burning time: `duration / (on_time +
/// off_time)` cycles of all-on for `on_time` units and all-off for
/// `off_time` units (units of ≈0.1 ms). This is the blink-based delay
/// alternative to a plain spin — the caller waits roughly `duration` units
/// either way, but gets a light show. Drives the lines with set/clear, not
/// toggle. A zero-length cycle is a no-op.
pub fn blink_leds(
    timer: &mut SpinTimer,
    port: &mut OutputPort,
    duration: u32,
    on_time: u16,
    off_time: u16,
) {
    let cycle = on_time as u32 + off_time as u32;
    if cycle == 0 {
        return;
    }
    for _ in 0..duration / cycle {
        port.set_all_leds(timer.tick(), true);
        timer.delay(on_time, TENTH_MS);
        port.set_all_leds(timer.tick(), false);
        timer.delay(off_time, TENTH_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_rule_worked_example() {
        // rate = 100: green toggles (100 % 50 == 0, and 100 % 20 == 0);
        // red toggles too (100 % 40 = 20, but 100 % 10 == 0).
        assert_eq!(wrap_toggles(100), (true, true));
    }

    #[test]
    fn test_wrap_rule_table() {
        // (rate, green, red) across the rates the script actually uses.
        let cases = [
            (10u8, false, true),
            (12, false, false),
            (20, true, true),
            (40, true, true),
            (50, true, true),
            (53, false, false),
            (65, false, false),
            (70, false, true),
            (77, false, false),
            (80, true, true),
            (90, false, true),
            (95, false, false),
            (96, false, false),
            (120, true, true),
            (150, true, true),
            (180, true, true),
            (200, true, true),
            (255, false, false),
        ];
        for (rate, green, red) in cases {
            assert_eq!(wrap_toggles(rate), (green, red), "rate {}", rate);
        }
    }

    #[test]
    fn test_wraparound_applies_toggles() {
        let mut port = OutputPort::new();
        on_wraparound(&mut port, 0, 100);
        assert!(port.led(Led::Green));
        assert!(port.led(Led::Red));
        assert!(!port.led(Led::Blue));
        // rate 95 hits neither rule: nothing changes.
        on_wraparound(&mut port, 1, 95);
        assert!(port.led(Led::Green));
        assert!(port.led(Led::Red));
    }

    #[test]
    fn test_advance_toggles_blue() {
        let mut port = OutputPort::new();
        on_advance(&mut port, 0);
        assert!(port.led(Led::Blue));
        on_advance(&mut port, 1);
        assert!(!port.led(Led::Blue));
    }

    #[test]
    fn test_blink_cycle_count_and_duration() {
        let mut timer = SpinTimer::new();
        let mut port = OutputPort::new();
        // 10 units of blinking at 3 on / 2 off → exactly 2 full cycles.
        blink_leds(&mut timer, &mut port, 10, 3, 2);
        // Each cycle changes all three lines on and off again → 6 events
        // per cycle, 12 total.
        assert_eq!(port.led_events().len(), 12);
        // Ends all-off.
        for led in Led::ALL {
            assert!(!port.led(led));
        }
        // Time burned: per cycle, delay(3) + delay(2) at count 113,
        // 8.5 cycles per iteration with the half-cycle floor per call.
        let cycle = 3 * 113 * 17 / 2 + 2 * 113 * 17 / 2;
        assert_eq!(timer.tick(), 2 * cycle);
    }

    #[test]
    fn test_blink_zero_cycle_is_noop() {
        let mut timer = SpinTimer::new();
        let mut port = OutputPort::new();
        blink_leds(&mut timer, &mut port, 1000, 0, 0);
        assert_eq!(timer.tick(), 0);
        assert!(port.led_events().is_empty());
    }

    #[test]
    fn test_blink_uses_set_not_toggle() {
        let mut timer = SpinTimer::new();
        let mut port = OutputPort::new();
        // Blue starts on; the first on-phase must leave it on (set), not
        // flip it off (toggle).
        port.toggle(0, Led::Blue);
        port.begin_frame(0);
        blink_leds(&mut timer, &mut port, 5, 3, 2);
        // On-phase: only green and red change (2 events); off-phase: all
        // three go off (3 events).
        assert_eq!(port.led_events().len(), 5);
        assert!(!port.led(Led::Blue));
    }
}
