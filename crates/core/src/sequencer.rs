//! Playback engine: two nested loops over two fixed tables.
//!
//! The outer loop walks the pitch script; the inner loop steps the waveform
//! table at the current entry's rate for exactly `duration` iterations.
//! Reaching the sentinel restarts the whole script with a fresh cursor, and
//! that is the only terminal condition — the program plays forever.
//!
//! The firmware's blocking loop is re-expressed as a steppable state
//! machine: [`Sequencer::step`] performs one inner-loop iteration (emit a
//! sample, charge the inter-sample delay, handle wraparound/advance), and
//! [`Sequencer::run_until`] steps until a tick budget is spent, which is
//! what lets a frontend interleave rendering with virtual time.

use crate::indicator;
use crate::port::OutputPort;
use crate::savestate::SequencerState;
use crate::score::{PitchEntry, Score};
use crate::timer::{SpinTimer, SAMP};

/// Upper bound on steps per `run_until` call. Entries with `duration == 0`
/// consume no virtual time, so a degenerate script could otherwise spin the
/// caller forever.
const MAX_STEPS_PER_RUN: usize = 4096;

pub struct Sequencer {
    score: Score,
    timer: SpinTimer,
    /// Index into the waveform table; wraps modulo the table length.
    wave_index: usize,
    /// Index into the pitch script; never rests on the sentinel.
    pitch_index: usize,
    /// Inner-loop iterations completed within the current entry.
    samples_done: u32,
    /// Completed script passes since power-on.
    passes: u32,
    // Debug counters
    pub dbg_samples: u64,
    pub dbg_wraps: u64,
    pub dbg_advances: u64,
}

impl Sequencer {
    pub fn new(score: Score) -> Self {
        Sequencer {
            score,
            timer: SpinTimer::new(),
            wave_index: 0,
            pitch_index: 0,
            samples_done: 0,
            passes: 0,
            dbg_samples: 0,
            dbg_wraps: 0,
            dbg_advances: 0,
        }
    }

    /// Current clock value in cycles.
    pub fn tick(&self) -> u64 {
        self.timer.tick()
    }

    pub fn wave_index(&self) -> usize {
        self.wave_index
    }

    pub fn pitch_index(&self) -> usize {
        self.pitch_index
    }

    pub fn samples_done(&self) -> u32 {
        self.samples_done
    }

    /// Completed script passes.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn current_entry(&self) -> PitchEntry {
        self.score.entry(self.pitch_index)
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub(crate) fn timer_mut(&mut self) -> &mut SpinTimer {
        &mut self.timer
    }

    /// One inner-loop iteration.
    ///
    /// Emits the sample under the cursor to the PWM register, charges the
    /// `rate`-scaled inter-sample delay, and advances the waveform index
    /// with wraparound. Completing the current entry advances the script
    /// (blue toggles on every advance, the one landing on the sentinel
    /// included); landing on the sentinel restarts the pass with both
    /// indices reset. Entries with `duration == 0` advance without
    /// emitting.
    pub fn step(&mut self, port: &mut OutputPort) {
        let entry = self.score.entry(self.pitch_index);
        if entry.rate == 0 {
            // Only reachable when the script's first entry is the
            // sentinel: an empty composition restarts without playing.
            self.restart();
            return;
        }

        if self.samples_done < entry.duration as u32 {
            let sample = self.score.sample(self.wave_index);
            port.set_pwm(self.timer.tick(), sample);
            self.timer.delay(entry.rate as u16, SAMP);
            self.wave_index += 1;
            if self.wave_index == self.score.wave_len() {
                self.wave_index = 0;
                self.dbg_wraps += 1;
                indicator::on_wraparound(port, self.timer.tick(), entry.rate);
            }
            self.samples_done += 1;
            self.dbg_samples += 1;
        }

        if self.samples_done >= entry.duration as u32 {
            self.pitch_index += 1;
            self.samples_done = 0;
            self.dbg_advances += 1;
            indicator::on_advance(port, self.timer.tick());
            if self.score.entry(self.pitch_index).rate == 0 {
                self.restart();
            }
        }
    }

    /// Step until the clock passes `end_tick` (bounded by
    /// [`MAX_STEPS_PER_RUN`]).
    pub fn run_until(&mut self, end_tick: u64, port: &mut OutputPort) {
        let mut steps = 0;
        while self.timer.tick() < end_tick && steps < MAX_STEPS_PER_RUN {
            self.step(port);
            steps += 1;
        }
    }

    /// Sentinel reached: begin the next pass with a fresh cursor. Fires no
    /// indicator event of its own.
    fn restart(&mut self) {
        self.pitch_index = 0;
        self.wave_index = 0;
        self.samples_done = 0;
        self.passes += 1;
    }

    /// Capture cursor + clock for a snapshot.
    pub fn save_state(&self) -> SequencerState {
        SequencerState {
            tick: self.timer.tick(),
            wave_index: self.wave_index,
            pitch_index: self.pitch_index,
            samples_done: self.samples_done,
            passes: self.passes,
        }
    }

    /// Restore cursor + clock from a snapshot.
    pub fn load_state(&mut self, s: &SequencerState) {
        self.timer.restore(s.tick);
        self.wave_index = s.wave_index;
        self.pitch_index = s.pitch_index;
        self.samples_done = s.samples_done;
        self.passes = s.passes;
    }
}
