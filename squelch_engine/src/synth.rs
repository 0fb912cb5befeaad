//! Monophonic acid-bass voice.
//!
//! Oscillator -> resonant low-pass with an envelope on the cutoff -> tanh
//! drive -> tone filter. Parameters come from a [`BassSynthState`] snapshot
//! taken when the voice is created; later edits do not reach a sounding voice.

use std::f32::consts::TAU;

use squelch_shared::{BassSynthState, Waveform};

const GLIDE_SECONDS: f32 = 0.06;
const RELEASE_SECONDS: f32 = 0.012;
const SILENCE: f32 = 1.0e-5;

/// Everything a bass voice needs besides its synth parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BassTrigger {
    pub frequency: f32,
    /// Start pitch when gliding in from a sliding note.
    pub glide_from: Option<f32>,
    pub gate_seconds: f32,
    pub accent: bool,
}

#[derive(Debug, Clone)]
pub struct BassVoice {
    sample_rate: f32,
    waveform: Waveform,
    phase: f32,
    freq: f32,
    target_freq: f32,
    glide: f32,

    // filter
    cutoff_hz: f32,
    env_mod_hz: f32,
    damping: f32,
    low: f32,
    band: f32,

    // envelopes
    env: f32,
    env_decay: f32,
    amp: f32,
    amp_decay: f32,
    release: f32,
    gain: f32,

    // drive
    drive: f32,
    drive_norm: f32,
    tone: f32,
    tone_state: f32,
    post_gain: f32,

    gate_remaining: u32,
    remaining: u32,
}

fn decay_coeff(seconds: f32, sample_rate: f32) -> f32 {
    // reaches -60 dB after `seconds`
    (-6.9 / (seconds.max(1.0e-3) * sample_rate)).exp()
}

impl BassVoice {
    pub fn new(synth: &BassSynthState, trigger: BassTrigger, sample_rate: u32, max_seconds: f32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let accent_amount = if trigger.accent {
            synth.accent_intensity / 100.0
        } else {
            0.0
        };

        let cutoff_hz = 40.0 * 2f32.powf(synth.filter_cutoff / 100.0 * 8.5);
        let env_mod_hz = cutoff_hz * (synth.envelope_mod_amount / 100.0) * 6.0 * (1.0 + accent_amount);
        let damping = (2.0 - synth.filter_resonance / 20.0 * 1.85).max(0.15);

        let decay_seconds = 0.05 + synth.decay_amount / 100.0 * 1.5;
        let drive = 1.0 + synth.distortion_amount / 100.0 * 24.0;

        let gate = (trigger.gate_seconds.max(0.0) * sr) as u32;
        let cap = (max_seconds.max(0.0) * sr) as u32;
        let remaining = (gate + (RELEASE_SECONDS * 4.0 * sr) as u32).min(cap);

        Self {
            sample_rate: sr,
            waveform: synth.waveform,
            phase: 0.0,
            freq: trigger.glide_from.unwrap_or(trigger.frequency),
            target_freq: trigger.frequency,
            glide: 1.0 - (-1.0 / (GLIDE_SECONDS * sr)).exp(),
            cutoff_hz,
            env_mod_hz,
            damping,
            low: 0.0,
            band: 0.0,
            env: 1.0,
            env_decay: decay_coeff(decay_seconds * (1.0 - 0.5 * accent_amount), sr),
            amp: 1.0,
            amp_decay: decay_coeff(decay_seconds * 3.0, sr),
            release: decay_coeff(RELEASE_SECONDS, sr),
            gain: synth.volume / 100.0 * (1.0 + accent_amount),
            drive,
            drive_norm: 1.0 / drive.tanh(),
            tone: 0.05 + synth.distortion_tone / 100.0 * 0.95,
            tone_state: 0.0,
            post_gain: synth.distortion_post_gain / 50.0,
            gate_remaining: gate.min(cap),
            remaining,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining_samples(&self) -> u32 {
        self.remaining
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.remaining == 0 {
            return 0.0;
        }
        self.remaining -= 1;

        self.freq += (self.target_freq - self.freq) * self.glide;
        self.phase += self.freq / self.sample_rate;
        self.phase -= self.phase.floor();
        let osc = match self.waveform {
            Waveform::Sawtooth => 2.0 * self.phase - 1.0,
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };

        // Chamberlin state-variable low-pass
        let fc = (self.cutoff_hz + self.env_mod_hz * self.env).min(self.sample_rate * 0.16);
        let f = (TAU * fc / self.sample_rate).min(1.0);
        self.low += f * self.band;
        let high = osc - self.low - self.damping * self.band;
        self.band += f * high;
        let filtered = self.low;

        self.env *= self.env_decay;
        if self.gate_remaining > 0 {
            self.gate_remaining -= 1;
            self.amp *= self.amp_decay;
        } else {
            self.amp *= self.release;
            if self.amp < SILENCE {
                self.remaining = 0;
            }
        }

        let driven = (filtered * self.drive).tanh() * self.drive_norm;
        self.tone_state += self.tone * (driven - self.tone_state);
        self.tone_state * self.post_gain * self.gain * self.amp
    }
}
