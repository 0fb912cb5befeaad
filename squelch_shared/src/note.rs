use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone offset above C (0..=11).
    pub fn semitone(self) -> u8 {
        self as u8
    }

    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }

    /// Index used by the CSV format: `C` = 1 ... `B` = 12. Zero is reserved for "no note".
    pub fn csv_index(self) -> u8 {
        self.semitone() + 1
    }

    pub fn from_csv_index(index: u8) -> Option<Self> {
        match index {
            1..=12 => Some(Self::ALL[(index - 1) as usize]),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub const MIN_OCTAVE: u8 = 0;
pub const MAX_OCTAVE: u8 = 8;

/// One slot of a bass track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: PitchClass,
    pub octave: u8,
    pub slide: bool,
    pub accent: bool,
}

impl Note {
    pub fn new(pitch: PitchClass, octave: u8) -> Self {
        Self {
            pitch,
            octave: octave.clamp(MIN_OCTAVE, MAX_OCTAVE),
            slide: false,
            accent: false,
        }
    }

    pub fn with_slide(mut self, slide: bool) -> Self {
        self.slide = slide;
        self
    }

    pub fn with_accent(mut self, accent: bool) -> Self {
        self.accent = accent;
        self
    }

    /// MIDI note number, `(octave + 1) * 12 + semitone`, so C3 is 48.
    pub fn midi_number(&self) -> u8 {
        let n = (self.octave as u16 + 1) * 12 + self.pitch.semitone() as u16;
        n.min(127) as u8
    }

    pub fn from_midi(number: u8) -> Self {
        let octave = (number / 12).saturating_sub(1);
        Self::new(PitchClass::from_semitone(number % 12), octave)
    }

    pub fn frequency(&self) -> f32 {
        440.0 * 2f32.powf((self.midi_number() as f32 - 69.0) / 12.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c3_is_midi_48() {
        let note = Note::new(PitchClass::C, 3);
        assert_eq!(note.midi_number(), 48);
        assert_eq!(Note::from_midi(48), note);
    }

    #[test]
    fn csv_index_reserves_zero() {
        assert_eq!(PitchClass::C.csv_index(), 1);
        assert_eq!(PitchClass::B.csv_index(), 12);
        assert_eq!(PitchClass::from_csv_index(0), None);
        assert_eq!(PitchClass::from_csv_index(13), None);
        assert_eq!(PitchClass::from_csv_index(10), Some(PitchClass::A));
    }

    #[test]
    fn a4_is_concert_pitch() {
        let a4 = Note::new(PitchClass::A, 4);
        assert_eq!(a4.midi_number(), 69);
        assert!((a4.frequency() - 440.0).abs() < 1e-3);
    }
}
