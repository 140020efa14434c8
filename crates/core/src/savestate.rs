//! State capture for the engine.
//!
//! Everything the control loop carries between steps fits in a handful of
//! scalars: the clock, the two cursor indices, the per-entry iteration
//! count, and the persistent output levels. These structs capture exactly
//! that, serialized with bincode to in-memory byte blobs for the rewind
//! ring ([`crate::snapshot`]). Nothing is written to disk — the toy has no
//! persisted state, and neither does its model.

use serde::{Deserialize, Serialize};

/// Playback cursor + clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencerState {
    pub tick: u64,
    pub wave_index: usize,
    pub pitch_index: usize,
    pub samples_done: u32,
    pub passes: u32,
}

/// Persistent output levels (transient event buffers are not captured).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    pub pwm: u8,
    pub leds: [bool; 3],
}

/// Full engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChimeboxState {
    pub seq: SequencerState,
    pub port: PortState,
    pub frame: u32,
}

impl ChimeboxState {
    /// Serialize to a compact in-memory blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        bincode::serialize(self).map_err(|e| format!("state encode: {}", e))
    }

    /// Deserialize a blob produced by [`ChimeboxState::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<ChimeboxState, String> {
        bincode::deserialize(bytes).map_err(|e| format!("state decode: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> ChimeboxState {
        ChimeboxState {
            seq: SequencerState {
                tick: 123_456_789,
                wave_index: 37,
                pitch_index: 11,
                samples_done: 42,
                passes: 3,
            },
            port: PortState { pwm: 0xb7, leds: [true, false, true] },
            frame: 999,
        }
    }

    #[test]
    fn test_bincode_round_trip() {
        let state = sample_state();
        let bytes = state.to_bytes().unwrap();
        let back = ChimeboxState::from_bytes(&bytes).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_garbage_blob_rejected() {
        assert!(ChimeboxState::from_bytes(&[0xff]).is_err());
    }
}
