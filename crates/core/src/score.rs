//! The compiled-in composition: waveform table and pitch script.
//!
//! Both tables are immutable build-time constants with process lifetime —
//! they are the toy's entire configuration surface. Changing the tune means
//! recompiling with new table data.
//!
//! The pitch script is a flat sequence of `(rate, duration)` instructions
//! terminated by a `rate == 0` sentinel. Shape defects (missing sentinel,
//! sentinel in the middle, empty waveform) are configuration errors, so they
//! are rejected by [`Score::new`] at construction and asserted by tests;
//! playback itself performs no validation.

/// One pitch instruction: how fast to step the waveform, and for how many
/// steps.
///
/// `rate` is the coarse delay-unit count between samples: 10 is the highest
/// pitch (fastest playback), 255 the lowest. `rate == 0` marks the end of
/// the script.
///
/// `duration` is a raw iteration count, not a length of time: the engine
/// steps the waveform exactly `duration` times at this rate, so a given
/// duration lasts longer at a higher `rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchEntry {
    pub rate: u8,
    pub duration: u16,
}

/// Shorthand for building script tables.
pub const fn entry(rate: u8, duration: u16) -> PitchEntry {
    PitchEntry { rate, duration }
}

/// One cycle of the chime waveform, 92 unsigned 8-bit samples.
pub const WAVE_TABLE: [u8; 92] = [
    0x8a, 0xb1, 0x55, 0x4d, 0xb2, 0x90, 0x43, 0x8f, 0xb7, 0x4f, 0x54, 0xbd,
    0x8c, 0x35, 0x98, 0xb8, 0x3a, 0x70, 0xcb, 0x4c, 0x51, 0xd7, 0x5d, 0x47,
    0xd2, 0x69, 0x3a, 0xde, 0x54, 0x4c, 0xe4, 0x30, 0x7b, 0xcf, 0x0f, 0xc5,
    0x82, 0x2e, 0xf3, 0x13, 0xb2, 0x91, 0x2c, 0xf5, 0x01, 0xe0, 0x45, 0x83,
    0xa8, 0x2e, 0xe9, 0x05, 0xf6, 0x13, 0xd3, 0x47, 0x96, 0x80, 0x61, 0xac,
    0x3e, 0xc9, 0x26, 0xdc, 0x1d, 0xdc, 0x27, 0xc6, 0x43, 0xa8, 0x60, 0x89,
    0x83, 0x65, 0xac, 0x40, 0xc6, 0x30, 0xc2, 0x45, 0xa0, 0x74, 0x6e, 0xa5,
    0x46, 0xba, 0x4b, 0x94, 0x89, 0x56, 0xb7, 0x59,
];

/// The tune. 72 playable entries plus the sentinel.
pub const PITCH_SCRIPT: [PitchEntry; 73] = [
    entry(100, 280), entry(150, 250), entry(180, 300), entry(90, 800), entry(120, 500),
    entry(200, 50),  entry(120, 280), entry(95, 282),  entry(90, 285), entry(180, 350),
    entry(150, 380), entry(120, 280), entry(95, 410),  entry(90, 285), entry(70, 500),
    entry(200, 50),  entry(70, 180),  entry(65, 1000), entry(70, 150), entry(80, 180),
    entry(90, 285),  entry(80, 270),  entry(12, 50),   entry(50, 2000), entry(200, 500),
    entry(80, 500),  entry(100, 500), entry(255, 800), entry(100, 100), entry(96, 100),
    entry(92, 100),  entry(88, 200),  entry(84, 250),  entry(80, 300), entry(77, 350),
    entry(74, 400),  entry(71, 200),  entry(68, 200),  entry(65, 200), entry(62, 200),
    entry(59, 190),  entry(56, 180),  entry(53, 170),  entry(53, 160), entry(50, 150),
    entry(48, 140),  entry(46, 130),  entry(44, 120),  entry(42, 110), entry(40, 100),
    entry(38, 100),  entry(36, 100),  entry(34, 100),  entry(32, 100), entry(30, 100),
    entry(28, 100),  entry(26, 100),  entry(24, 100),  entry(22, 90),  entry(20, 70),
    entry(18, 60),   entry(16, 50),   entry(14, 40),   entry(10, 100), entry(16, 50),
    entry(20, 70),   entry(36, 100),  entry(50, 150),  entry(62, 200), entry(71, 200),
    entry(80, 150),  entry(92, 130),
    entry(0, 0),
];

/// A validated waveform table + pitch script pair.
#[derive(Debug, Clone, Copy)]
pub struct Score {
    wave: &'static [u8],
    script: &'static [PitchEntry],
}

impl Score {
    /// Validate a table pair. Rejects the statically-detectable defects:
    /// empty waveform, empty script, missing sentinel, sentinel before the
    /// last entry.
    pub fn new(wave: &'static [u8], script: &'static [PitchEntry]) -> Result<Score, String> {
        if wave.is_empty() {
            return Err("waveform table is empty".into());
        }
        let last = match script.last() {
            Some(e) => e,
            None => return Err("pitch script is empty".into()),
        };
        if last.rate != 0 {
            return Err("pitch script missing rate-0 sentinel in last position".into());
        }
        if let Some(i) = script[..script.len() - 1].iter().position(|e| e.rate == 0) {
            return Err(format!("pitch script has a premature sentinel at entry {}", i));
        }
        Ok(Score { wave, script })
    }

    /// The compiled-in composition.
    ///
    /// The tables are constants whose shape is checked by tests; a malformed
    /// build is a defect of the program image itself, so this asserts rather
    /// than propagating.
    pub fn builtin() -> Score {
        Score::new(&WAVE_TABLE, &PITCH_SCRIPT).expect("compiled-in score is malformed")
    }

    pub fn wave_len(&self) -> usize {
        self.wave.len()
    }

    /// Sample value at `index`. Wrapping is the caller's job; the index must
    /// be in range.
    pub fn sample(&self, index: usize) -> u8 {
        self.wave[index]
    }

    pub fn script_len(&self) -> usize {
        self.script.len()
    }

    /// Script entry at `index` (the sentinel is the last entry).
    pub fn entry(&self, index: usize) -> PitchEntry {
        self.script[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_well_formed() {
        let score = Score::builtin();
        assert_eq!(score.wave_len(), 92);
        assert_eq!(score.script_len(), 73);
        assert_eq!(score.entry(0), entry(100, 280));
        assert_eq!(score.entry(72), entry(0, 0));
        // No premature sentinel
        for i in 0..72 {
            assert_ne!(score.entry(i).rate, 0, "entry {} is a premature sentinel", i);
        }
    }

    #[test]
    fn test_missing_sentinel_rejected() {
        static SCRIPT: [PitchEntry; 2] = [entry(100, 280), entry(150, 250)];
        assert!(Score::new(&WAVE_TABLE, &SCRIPT).is_err());
    }

    #[test]
    fn test_premature_sentinel_rejected() {
        static SCRIPT: [PitchEntry; 3] = [entry(100, 280), entry(0, 0), entry(0, 0)];
        let err = Score::new(&WAVE_TABLE, &SCRIPT).unwrap_err();
        assert!(err.contains("entry 1"), "unexpected error: {}", err);
    }

    #[test]
    fn test_empty_script_rejected() {
        static SCRIPT: [PitchEntry; 0] = [];
        assert!(Score::new(&WAVE_TABLE, &SCRIPT).is_err());
    }

    #[test]
    fn test_empty_wave_rejected() {
        static WAVE: [u8; 0] = [];
        static SCRIPT: [PitchEntry; 1] = [entry(0, 0)];
        assert!(Score::new(&WAVE, &SCRIPT).is_err());
    }

    #[test]
    fn test_sentinel_only_script_is_valid() {
        // Degenerate but shape-legal: nothing before the sentinel.
        static SCRIPT: [PitchEntry; 1] = [entry(0, 0)];
        assert!(Score::new(&WAVE_TABLE, &SCRIPT).is_ok());
    }
}
