pub mod clipboard;
pub mod csv_codec;
pub mod drums;
pub mod error;
pub mod midi_codec;
pub mod note;
pub mod pattern;
pub mod session;
pub mod synth;

pub use clipboard::Clipboard;
pub use drums::{DrumChannel, DrumKind, DrumKit};
pub use error::{CsvError, MidiError, PatternError};
pub use note::{Note, PitchClass};
pub use pattern::{Block, PatternStore, StepData};
pub use session::Session;
pub use synth::{BassSynthState, Waveform};

/// Steps in one block (one bar of sixteenth notes).
pub const STEPS_PER_BLOCK: usize = 16;

/// Upper bound on blocks a decoded file may create.
pub const MAX_BLOCKS: usize = 1024;

/// Fixed number of drum channels in every session.
pub const DRUM_CHANNEL_COUNT: usize = 9;

/// Sixteenth-note steps per quarter-note beat.
pub const STEPS_PER_BEAT: u32 = 4;

/// MIDI division used by the SMF codec (ticks per quarter note).
pub const MIDI_PPQ: u16 = 480;

pub const DEFAULT_BPM: u32 = 120;
pub const MIN_BPM: u32 = 20;
pub const MAX_BPM: u32 = 300;

/// Duration of one sixteenth-note step at the given tempo.
pub fn seconds_per_step(bpm: u32) -> f64 {
    60.0 / bpm.max(1) as f64 / STEPS_PER_BEAT as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_duration_is_a_sixteenth() {
        assert!((seconds_per_step(120) - 0.125).abs() < 1e-12);
        assert!((seconds_per_step(150) - 0.1).abs() < 1e-12);
    }
}
