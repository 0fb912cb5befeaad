use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Waveform {
    #[default]
    Sawtooth,
    Square,
}

impl Waveform {
    /// CSV encoding: 1 = square, 0 = sawtooth.
    pub fn csv_value(self) -> u8 {
        match self {
            Waveform::Square => 1,
            Waveform::Sawtooth => 0,
        }
    }

    pub fn from_csv_value(value: u8) -> Self {
        if value == 1 {
            Waveform::Square
        } else {
            Waveform::Sawtooth
        }
    }
}

/// Parameters of one bass voice. The id doubles as the track key in every block.
///
/// All parameters are kept non-negative; the CSV format uses `-` as a separator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BassSynthState {
    pub id: String,
    pub volume: f32,
    pub distortion_amount: f32,
    pub distortion_tone: f32,
    pub distortion_post_gain: f32,
    /// Normalised 0..100.
    pub filter_cutoff: f32,
    /// Raw Q, 0..20.
    pub filter_resonance: f32,
    pub envelope_mod_amount: f32,
    pub decay_amount: f32,
    pub accent_intensity: f32,
    pub waveform: Waveform,
}

pub const MAX_PERCENT: f32 = 100.0;
pub const MAX_RESONANCE: f32 = 20.0;

impl BassSynthState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            volume: 80.0,
            distortion_amount: 30.0,
            distortion_tone: 50.0,
            distortion_post_gain: 50.0,
            filter_cutoff: 50.0,
            filter_resonance: 8.0,
            envelope_mod_amount: 50.0,
            decay_amount: 40.0,
            accent_intensity: 50.0,
            waveform: Waveform::Sawtooth,
        }
    }

    /// The nine numeric parameters in CSV column order.
    pub fn numeric_params(&self) -> [f32; 9] {
        [
            self.volume,
            self.distortion_amount,
            self.distortion_tone,
            self.distortion_post_gain,
            self.filter_cutoff,
            self.filter_resonance,
            self.envelope_mod_amount,
            self.decay_amount,
            self.accent_intensity,
        ]
    }

    /// Assigns parameters in CSV column order. `None` keeps the current value.
    pub fn apply_numeric_params(&mut self, params: [Option<f32>; 9]) {
        let targets: [(&mut f32, f32); 9] = [
            (&mut self.volume, MAX_PERCENT),
            (&mut self.distortion_amount, MAX_PERCENT),
            (&mut self.distortion_tone, MAX_PERCENT),
            (&mut self.distortion_post_gain, MAX_PERCENT),
            (&mut self.filter_cutoff, MAX_PERCENT),
            (&mut self.filter_resonance, MAX_RESONANCE),
            (&mut self.envelope_mod_amount, MAX_PERCENT),
            (&mut self.decay_amount, MAX_PERCENT),
            (&mut self.accent_intensity, MAX_PERCENT),
        ];
        for ((slot, max), value) in targets.into_iter().zip(params) {
            if let Some(v) = value.filter(|v| v.is_finite()) {
                *slot = v.clamp(0.0, max);
            }
        }
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.filter_cutoff = cutoff.clamp(0.0, MAX_PERCENT);
    }

    pub fn set_resonance(&mut self, q: f32) {
        self.filter_resonance = q.clamp(0.0, MAX_RESONANCE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_clamped_non_negative() {
        let mut synth = BassSynthState::new("bass1");
        synth.apply_numeric_params([
            Some(-5.0),
            None,
            None,
            None,
            Some(140.0),
            Some(33.0),
            None,
            None,
            Some(f32::NAN),
        ]);
        assert_eq!(synth.volume, 0.0);
        assert_eq!(synth.distortion_amount, 30.0);
        assert_eq!(synth.filter_cutoff, 100.0);
        assert_eq!(synth.filter_resonance, 20.0);
        assert_eq!(synth.accent_intensity, 50.0);
    }

    #[test]
    fn waveform_csv_value() {
        assert_eq!(Waveform::Square.csv_value(), 1);
        assert_eq!(Waveform::from_csv_value(0), Waveform::Sawtooth);
        assert_eq!(Waveform::from_csv_value(7), Waveform::Sawtooth);
    }
}
