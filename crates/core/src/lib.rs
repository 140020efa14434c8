//! # chimebox-core
//!
//! Control-loop engine for a one-chip wavetable chime toy: a fixed waveform
//! played through a hardware PWM channel at rates scripted by a fixed pitch
//! table, with three indicator LEDs blinking in patterns derived from
//! playback events. The real toy runs on an ATtiny13a at 9.6 MHz with no
//! free timer, so every delay is a calibrated counting loop; this crate
//! models that machine on the host — outputs become inspectable state, the
//! counting loop becomes a cycle-denominated virtual clock — without
//! changing a single observable of the control loop itself.
//!
//! ## Architecture
//!
//! - [`Chimebox`] — Top-level object wiring sequencer and output port
//! - [`score`] — Waveform table + pitch script constants with shape validation
//! - [`timer`] — Calibrated spin-delay cost model on a monotonic `u64` clock
//! - [`sequencer`] — The nested playback loops as a steppable state machine
//! - [`indicator`] — LED toggle rules for wraparound/advance events
//! - [`port`] — Modeled PWM compare register + LED lines, tick-stamped events
//! - [`audio`] — PWM register history rendered to mono PCM
//! - [`savestate`] / [`snapshot`] — State capture and the rewind ring
//!
//! ## Timing
//!
//! All engine time is virtual: [`Chimebox::run_frame`] advances one 60 Hz
//! quantum of 9.6 MHz cycles, and a frontend renders whatever the port
//! recorded in that span. The script restarts itself forever; there is no
//! stop condition to handle.

pub mod audio;
pub mod indicator;
pub mod port;
pub mod savestate;
pub mod score;
pub mod sequencer;
pub mod snapshot;
pub mod timer;

pub use audio::AudioBuffer;
pub use port::{Led, LedEvent, OutputPort};
pub use score::{PitchEntry, Score};
pub use sequencer::Sequencer;
pub use timer::SpinTimer;

/// CPU clock frequency: 9.6 MHz internal oscillator.
pub const CLOCK_HZ: u32 = 9_600_000;
/// Virtual cycles per 60 Hz render frame.
pub const FRAME_TICKS: u64 = CLOCK_HZ as u64 / 60;

/// The whole toy: playback engine plus modeled outputs.
pub struct Chimebox {
    pub seq: Sequencer,
    pub port: OutputPort,
    /// Enable per-frame diagnostics on stderr (first frames only).
    pub debug: bool,
    frame_count: u32,
}

impl Chimebox {
    /// Power on with the compiled-in composition.
    pub fn new() -> Self {
        Chimebox::with_score(Score::builtin())
    }

    /// Power on with a specific (already validated) score.
    pub fn with_score(score: Score) -> Self {
        Chimebox {
            seq: Sequencer::new(score),
            port: OutputPort::new(),
            debug: false,
            frame_count: 0,
        }
    }

    /// Run one 60 Hz quantum of virtual time.
    ///
    /// Brackets the port's event buffers so the frontend can render exactly
    /// what this frame produced: PWM register writes for audio, LED events
    /// and levels for the lamps.
    pub fn run_frame(&mut self) {
        let start = self.seq.tick();
        let end = start + FRAME_TICKS;
        self.port.begin_frame(start);
        self.seq.run_until(end, &mut self.port);
        self.port.end_frame(self.seq.tick());
        self.frame_count += 1;

        if self.debug && self.frame_count <= 10 {
            eprintln!(
                "Frame {}: tick={} entry={} wave={} samples={} wraps={} advances={} passes={}",
                self.frame_count,
                self.seq.tick(),
                self.seq.pitch_index(),
                self.seq.wave_index(),
                self.seq.dbg_samples,
                self.seq.dbg_wraps,
                self.seq.dbg_advances,
                self.seq.passes(),
            );
        }
    }

    /// Frames run since power-on.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Blink all three LEDs for roughly `duration` tenth-millisecond units
    /// (`on_time` on / `off_time` off per cycle), burning the same virtual
    /// time a plain delay would. See [`indicator::blink_leds`].
    pub fn blink(&mut self, duration: u32, on_time: u16, off_time: u16) {
        indicator::blink_leds(self.seq.timer_mut(), &mut self.port, duration, on_time, off_time);
    }

    /// Capture the full engine state.
    pub fn save_state(&self) -> savestate::ChimeboxState {
        savestate::ChimeboxState {
            seq: self.seq.save_state(),
            port: self.port.save_state(),
            frame: self.frame_count,
        }
    }

    /// Restore the full engine state.
    pub fn load_state(&mut self, s: &savestate::ChimeboxState) {
        self.seq.load_state(&s.seq);
        self.port.load_state(&s.port);
        self.frame_count = s.frame;
    }

    /// One-line state summary for diagnostics and the headless mode.
    pub fn dump_state(&self) -> String {
        let e = self.seq.current_entry();
        format!(
            "pass={} entry={:2} (rate={:3} dur={:4}) wave={:2} done={:4} pwm=0x{:02x} leds={}{}{}",
            self.seq.passes(),
            self.seq.pitch_index(),
            e.rate,
            e.duration,
            self.seq.wave_index(),
            self.seq.samples_done(),
            self.port.pwm(),
            if self.port.led(Led::Green) { 'G' } else { '.' },
            if self.port.led(Led::Red) { 'R' } else { '.' },
            if self.port.led(Led::Blue) { 'B' } else { '.' },
        )
    }
}

impl Default for Chimebox {
    fn default() -> Self {
        Chimebox::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chimebox_creation() {
        let cb = Chimebox::new();
        assert_eq!(cb.seq.tick(), 0);
        assert_eq!(cb.seq.pitch_index(), 0);
        assert_eq!(cb.seq.wave_index(), 0);
        assert_eq!(cb.frame_count(), 0);
        assert_eq!(cb.port.pwm(), 0);
    }

    #[test]
    fn test_run_frame_advances_virtual_time() {
        let mut cb = Chimebox::new();
        cb.run_frame();
        assert!(cb.seq.tick() >= FRAME_TICKS);
        assert_eq!(cb.frame_count(), 1);
        // The first script entry runs at rate 100 (9350 cycles/sample):
        // one frame of 160k cycles emits 17–18 samples.
        let n = cb.port.audio.samples().len();
        assert!((17..=18).contains(&n), "unexpected sample count {}", n);
    }

    #[test]
    fn test_frames_bracket_audio_exactly() {
        let mut cb = Chimebox::new();
        cb.run_frame();
        let end_1 = cb.port.audio.frame_end;
        cb.run_frame();
        // Second frame starts where the first actually ended (the clock
        // may overshoot the nominal budget by part of one delay).
        assert_eq!(cb.port.audio.frame_start, end_1);
        assert!(cb.port.audio.frame_end > cb.port.audio.frame_start);
    }

    #[test]
    fn test_save_load_round_trip_through_bytes() {
        let mut cb = Chimebox::new();
        for _ in 0..120 {
            cb.run_frame();
        }
        let state = cb.save_state();
        let bytes = state.to_bytes().unwrap();

        let mut other = Chimebox::new();
        other.load_state(&savestate::ChimeboxState::from_bytes(&bytes).unwrap());
        assert_eq!(other.seq.tick(), cb.seq.tick());
        assert_eq!(other.seq.pitch_index(), cb.seq.pitch_index());
        assert_eq!(other.frame_count(), cb.frame_count());
        assert_eq!(other.port.pwm(), cb.port.pwm());

        // Both produce the same next frame of PWM writes.
        cb.run_frame();
        other.run_frame();
        assert_eq!(cb.port.audio.samples(), other.port.audio.samples());
    }

    #[test]
    fn test_dump_state_mentions_leds() {
        let mut cb = Chimebox::new();
        let s = cb.dump_state();
        assert!(s.contains("..."), "all LEDs off at power-on: {}", s);
        cb.port.toggle(0, Led::Red);
        let s = cb.dump_state();
        assert!(s.contains(".R."), "red on: {}", s);
    }

    #[test]
    fn test_blink_burns_time_and_restores_dark() {
        let mut cb = Chimebox::new();
        cb.blink(1000, 50, 50); // ~100 ms of 50/50 blinking
        assert!(cb.seq.tick() > 0);
        for led in Led::ALL {
            assert!(!cb.port.led(led));
        }
    }

    #[test]
    fn test_long_run_keeps_playing() {
        // Ten seconds of virtual time: the script keeps emitting and the
        // clock never stalls.
        let mut cb = Chimebox::new();
        let mut last_tick = 0;
        for _ in 0..600 {
            cb.run_frame();
            assert!(cb.seq.tick() > last_tick);
            last_tick = cb.seq.tick();
        }
        assert!(cb.seq.dbg_samples > 10_000);
    }
}
