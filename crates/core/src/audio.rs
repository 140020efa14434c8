//! PWM compare-register history rendered to PCM audio.
//!
//! The modeled hardware timer free-runs in fast-PWM mode with a fixed top,
//! so every compare-register write sets the duty cycle — and therefore the
//! filtered analog level — for the following periods. The engine records
//! each write as a `(tick, level)` pair; [`AudioBuffer::render_samples`]
//! converts one frame of that history to mono f32 PCM using sample-and-hold
//! with a time-weighted (box-filter) average inside each output sample
//! period, so sub-sample register writes don't alias.
//!
//! ## Post-processing
//!
//! When enabled ([`AudioBuffer::filters_enabled`]), three stages model the
//! physical output chain:
//!
//! 1. **Low-pass filter** — 2nd-order Butterworth at 6 kHz approximates the
//!    bandwidth of the small capsule speaker.
//! 2. **DC-blocking high-pass** — 2nd-order Butterworth at 20 Hz; the
//!    speaker is driven through a series electrolytic capacitor, so the
//!    real output is AC-coupled.
//! 3. **Click suppression** — short fade-in (~2 ms) and fade-out (~5 ms)
//!    when playback starts or stops.

use std::f32::consts::{PI, SQRT_2};

/// Low-pass cutoff (Hz). Capsule speaker bandwidth.
const LPF_CUTOFF: f32 = 6000.0;
/// DC-blocking high-pass cutoff (Hz). Models the series output capacitor.
const HPF_CUTOFF: f32 = 20.0;
/// Envelope attack time (seconds).
const ENV_ATTACK_S: f32 = 0.002;
/// Envelope release time (seconds).
const ENV_RELEASE_S: f32 = 0.005;

// ─── 2nd-order biquad IIR filter ────────────────────────────────────────────

/// Biquad IIR filter in Direct Form 2 Transposed, stable at both ends of
/// the audio band. Q = 1/√2 for a maximally-flat Butterworth response.
#[derive(Debug, Clone)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    fn lowpass(cutoff: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w, cos_w) = (w0.sin(), w0.cos());
        let alpha = sin_w / (2.0 * SQRT_2);
        let a0_inv = 1.0 / (1.0 + alpha);
        Biquad {
            b0: ((1.0 - cos_w) * 0.5) * a0_inv,
            b1: (1.0 - cos_w) * a0_inv,
            b2: ((1.0 - cos_w) * 0.5) * a0_inv,
            a1: (-2.0 * cos_w) * a0_inv,
            a2: (1.0 - alpha) * a0_inv,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn highpass(cutoff: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w, cos_w) = (w0.sin(), w0.cos());
        let alpha = sin_w / (2.0 * SQRT_2);
        let a0_inv = 1.0 / (1.0 + alpha);
        Biquad {
            b0: ((1.0 + cos_w) * 0.5) * a0_inv,
            b1: (-(1.0 + cos_w)) * a0_inv,
            b2: ((1.0 + cos_w) * 0.5) * a0_inv,
            a1: (-2.0 * cos_w) * a0_inv,
            a2: (1.0 - alpha) * a0_inv,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Process one sample. State is updated in-place.
    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

// ─── PWM sample buffer ──────────────────────────────────────────────────────

/// Mono audio buffer recording compare-register writes per frame.
#[derive(Debug)]
pub struct AudioBuffer {
    /// `(tick, level)` pairs, level in -1.0..+1.0, one per register write.
    pwm_samples: Vec<(u64, f32)>,
    /// Held level carried across frames (the register keeps its value).
    pwm_level: f32,
    /// Frame start tick (set by `begin_frame`).
    pub frame_start: u64,
    /// Frame end tick (set by `end_frame`).
    pub frame_end: u64,

    // ── Post-processing state (persists across frames) ──
    lpf: Biquad,
    hpf: Biquad,
    envelope: f32,
    configured_rate: u32,

    /// Enable/disable the output-chain filter pipeline.
    pub filters_enabled: bool,
}

impl AudioBuffer {
    pub fn new() -> Self {
        // Filters start at 44100 Hz and are reconfigured on first render.
        let sr = 44100.0;
        AudioBuffer {
            pwm_samples: Vec::with_capacity(4096),
            pwm_level: 0.0,
            frame_start: 0,
            frame_end: 0,
            lpf: Biquad::lowpass(LPF_CUTOFF, sr),
            hpf: Biquad::highpass(HPF_CUTOFF, sr),
            envelope: 0.0,
            configured_rate: 0,
            filters_enabled: true,
        }
    }

    fn configure_filters(&mut self, sample_rate: u32) {
        let sr = sample_rate as f32;
        self.lpf = Biquad::lowpass(LPF_CUTOFF, sr);
        self.hpf = Biquad::highpass(HPF_CUTOFF, sr);
        self.configured_rate = sample_rate;
    }

    /// Begin a new frame: store the start tick, clear the sample buffer.
    pub fn begin_frame(&mut self, tick: u64) {
        self.frame_start = tick;
        self.pwm_samples.clear();
    }

    /// End the current frame: store the end tick.
    pub fn end_frame(&mut self, tick: u64) {
        self.frame_end = tick;
    }

    /// Record a compare-register write.
    ///
    /// `value` is the raw 8-bit register value; 128 is the mid-rail
    /// (silence after AC coupling).
    pub fn push_pwm_sample(&mut self, tick: u64, value: u8) {
        let level = (value as f32 - 128.0) / 128.0;
        self.pwm_samples.push((tick, level));
    }

    /// Register writes recorded this frame.
    pub fn samples(&self) -> &[(u64, f32)] {
        &self.pwm_samples
    }

    /// Returns true if any register writes were recorded this frame.
    pub fn has_audio(&self) -> bool {
        !self.pwm_samples.is_empty()
    }

    /// Returns true while `render_samples` still produces useful output:
    /// writes are present, or the envelope is still fading out.
    pub fn needs_render(&self) -> bool {
        self.has_audio() || self.envelope > 0.001
    }

    pub fn toggle_filters(&mut self) {
        self.filters_enabled = !self.filters_enabled;
    }

    /// Render this frame's register history to mono f32 PCM.
    ///
    /// `out` is cleared and refilled with samples at `sample_rate` Hz;
    /// `clock_hz` converts ticks to seconds; `volume` scales the amplitude.
    /// Returns the number of samples written.
    pub fn render_samples(
        &mut self,
        out: &mut Vec<f32>,
        sample_rate: u32,
        clock_hz: u32,
        volume: f32,
    ) -> usize {
        if self.configured_rate != sample_rate {
            self.configure_filters(sample_rate);
        }

        let frame_ticks = self.frame_end.saturating_sub(self.frame_start);
        if frame_ticks == 0 {
            return 0;
        }

        let num_samples = ((frame_ticks as f64 * sample_rate as f64) / clock_hz as f64)
            .ceil() as usize;
        out.clear();
        out.reserve(num_samples);

        let tps = clock_hz as f64 / sample_rate as f64; // ticks per output sample
        let start = self.frame_start as f64;
        let active = !self.pwm_samples.is_empty();

        let attack_rate = 1.0 / (ENV_ATTACK_S * sample_rate as f32);
        let release_rate = 1.0 / (ENV_RELEASE_S * sample_rate as f32);

        let mut pwm_i = 0usize;
        for i in 0..num_samples {
            let p_start = start + i as f64 * tps;
            let p_end = p_start + tps;

            let raw = Self::sample_pwm(
                &mut pwm_i,
                &self.pwm_samples,
                &mut self.pwm_level,
                p_start,
                p_end,
                tps,
                volume,
            );

            if self.filters_enabled {
                if active {
                    self.envelope = (self.envelope + attack_rate).min(1.0);
                } else {
                    self.envelope = (self.envelope - release_rate).max(0.0);
                }
                let enveloped = raw * self.envelope;
                let lp = self.lpf.process(enveloped);
                out.push(self.hpf.process(lp));
            } else {
                out.push(raw);
            }
        }

        num_samples
    }

    /// One output sample from the register history, sample-and-hold style.
    ///
    /// Each register write holds its level until the next one; the output
    /// sample is the time-weighted average of the held levels inside
    /// `[p_start, p_end)`.
    #[inline]
    fn sample_pwm(
        pwm_idx: &mut usize,
        samples: &[(u64, f32)],
        level: &mut f32,
        p_start: f64,
        p_end: f64,
        tps: f64,
        volume: f32,
    ) -> f32 {
        let mut accum = 0.0f64;
        let mut cursor = p_start;

        // Walk every register write inside this output sample period
        while *pwm_idx < samples.len() && (samples[*pwm_idx].0 as f64) < p_end {
            let write_tick = samples[*pwm_idx].0 as f64;
            if write_tick > cursor {
                accum += *level as f64 * (write_tick - cursor);
                cursor = write_tick;
            }
            *level = samples[*pwm_idx].1;
            *pwm_idx += 1;
        }

        // Remaining time after the last write (or the whole period)
        accum += *level as f64 * (p_end - cursor);

        (accum / tps) as f32 * volume
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        AudioBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_converts_to_signed_level() {
        let mut buf = AudioBuffer::new();
        buf.begin_frame(0);
        buf.push_pwm_sample(0, 128);
        buf.push_pwm_sample(10, 255);
        buf.push_pwm_sample(20, 0);
        let s = buf.samples();
        assert_eq!(s[0].1, 0.0);
        assert!((s[1].1 - 0.9921875).abs() < 1e-6);
        assert_eq!(s[2].1, -1.0);
    }

    #[test]
    fn test_empty_frame_renders_nothing() {
        let mut buf = AudioBuffer::new();
        buf.begin_frame(100);
        buf.end_frame(100);
        let mut out = Vec::new();
        assert_eq!(buf.render_samples(&mut out, 44100, 9_600_000, 1.0), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_constant_level_sample_and_hold() {
        let mut buf = AudioBuffer::new();
        buf.filters_enabled = false;
        buf.begin_frame(0);
        // One write at t=0 to full scale; held for the whole frame.
        buf.push_pwm_sample(0, 255);
        buf.end_frame(9600); // 1 ms at 9.6 MHz
        let mut out = Vec::new();
        let n = buf.render_samples(&mut out, 48000, 9_600_000, 1.0);
        assert_eq!(n, 48); // 1 ms at 48 kHz
        for &s in &out {
            assert!((s - 0.9921875).abs() < 1e-4, "sample {} off full scale", s);
        }
    }

    #[test]
    fn test_box_filter_averages_sub_sample_writes() {
        let mut buf = AudioBuffer::new();
        buf.filters_enabled = false;
        buf.begin_frame(0);
        // 48 kHz against a 9.6 MHz clock: 200 ticks per output sample.
        // Level -1.0 for the first half of the period, full scale for the
        // second half → average near 0.
        buf.push_pwm_sample(0, 0);
        buf.push_pwm_sample(100, 255);
        buf.end_frame(200);
        let mut out = Vec::new();
        buf.render_samples(&mut out, 48000, 9_600_000, 1.0);
        assert_eq!(out.len(), 1);
        assert!(out[0].abs() < 0.01, "expected ~0, got {}", out[0]);
    }

    #[test]
    fn test_level_held_across_frames() {
        let mut buf = AudioBuffer::new();
        buf.filters_enabled = false;
        buf.begin_frame(0);
        buf.push_pwm_sample(0, 255);
        buf.end_frame(960);
        let mut out = Vec::new();
        buf.render_samples(&mut out, 48000, 9_600_000, 1.0);

        // Next frame has no writes: the register keeps its value.
        buf.begin_frame(960);
        buf.end_frame(1920);
        buf.render_samples(&mut out, 48000, 9_600_000, 1.0);
        assert!(!out.is_empty());
        for &s in &out {
            assert!((s - 0.9921875).abs() < 1e-4);
        }
    }

    #[test]
    fn test_filter_toggle() {
        let mut buf = AudioBuffer::new();
        assert!(buf.filters_enabled);
        buf.toggle_filters();
        assert!(!buf.filters_enabled);
        buf.toggle_filters();
        assert!(buf.filters_enabled);
    }

    #[test]
    fn test_envelope_fades_in() {
        let mut buf = AudioBuffer::new();
        buf.begin_frame(0);
        buf.push_pwm_sample(0, 255);
        buf.end_frame(96_000); // 10 ms
        let mut out = Vec::new();
        buf.render_samples(&mut out, 48000, 9_600_000, 1.0);
        // First sample is still ramping; the filters shape everything
        // after, but the start must be near-silent.
        assert!(out[0].abs() < 0.2);
        assert!(buf.needs_render());
    }
}
