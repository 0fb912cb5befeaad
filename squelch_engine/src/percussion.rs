//! Procedural drum voices.
//!
//! A channel's `(DrumKind, variant)` pair selects a [`DrumPatch`] from a
//! fixed table; the patch's generator is evaluated once per sample.

use std::f32::consts::TAU;

use squelch_shared::{DrumKind, DrumKit};

/// Per-voice state shared by all generators.
#[derive(Debug, Clone)]
pub struct DrumState {
    rng: fastrand::Rng,
    phase: f32,
    hp_in: f32,
    hp_out: f32,
}

impl DrumState {
    fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            phase: 0.0,
            hp_in: 0.0,
            hp_out: 0.0,
        }
    }

    fn noise(&mut self) -> f32 {
        self.rng.f32() * 2.0 - 1.0
    }

    fn bright_noise(&mut self) -> f32 {
        let x = self.noise();
        self.hp_out = 0.85 * (self.hp_out + x - self.hp_in);
        self.hp_in = x;
        self.hp_out
    }

    /// Advances the oscillator phase by `freq * dt` and returns a sine.
    fn sweep(&mut self, freq: f32, dt: f32) -> f32 {
        self.phase += freq * dt;
        self.phase -= self.phase.floor();
        (TAU * self.phase).sin()
    }
}

/// `(state, seconds since trigger, seconds per sample) -> sample`.
pub type Generator = fn(&mut DrumState, f32, f32) -> f32;

#[derive(Clone, Copy)]
pub struct DrumPatch {
    pub kind: DrumKind,
    pub variant: u8,
    pub seconds: f32,
    pub generator: Generator,
}

impl std::fmt::Debug for DrumPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrumPatch")
            .field("kind", &self.kind)
            .field("variant", &self.variant)
            .field("seconds", &self.seconds)
            .finish()
    }
}

fn square(t: f32, freq: f32) -> f32 {
    if (t * freq).fract() < 0.5 {
        1.0
    } else {
        -1.0
    }
}

fn kick_deep(s: &mut DrumState, t: f32, dt: f32) -> f32 {
    let freq = 45.0 + 105.0 * (-t * 25.0).exp();
    s.sweep(freq, dt) * (-t * 6.0).exp()
}

fn kick_punch(s: &mut DrumState, t: f32, dt: f32) -> f32 {
    let freq = 55.0 + 200.0 * (-t * 40.0).exp();
    let click = s.noise() * (-t * 300.0).exp() * 0.3;
    s.sweep(freq, dt) * (-t * 12.0).exp() + click
}

fn snare_body(s: &mut DrumState, t: f32, dt: f32) -> f32 {
    let tone = s.sweep(185.0, dt) * (-t * 25.0).exp() * 0.5;
    tone + s.bright_noise() * (-t * 18.0).exp() * 0.7
}

fn snare_tight(s: &mut DrumState, t: f32, dt: f32) -> f32 {
    let tone = s.sweep(240.0, dt) * (-t * 40.0).exp() * 0.3;
    tone + s.bright_noise() * (-t * 35.0).exp()
}

fn hat_closed(s: &mut DrumState, t: f32, _dt: f32) -> f32 {
    s.bright_noise() * (-t * 70.0).exp() * 0.6
}

fn metal(t: f32) -> f32 {
    const PARTIALS: [f32; 6] = [205.3, 304.4, 369.6, 522.7, 540.0, 800.0];
    PARTIALS.iter().map(|&f| square(t, f * 2.0)).sum::<f32>() / 6.0
}

fn hat_metal(s: &mut DrumState, t: f32, _dt: f32) -> f32 {
    (metal(t) * 0.6 + s.bright_noise() * 0.4) * (-t * 55.0).exp() * 0.6
}

fn hat_open(s: &mut DrumState, t: f32, _dt: f32) -> f32 {
    s.bright_noise() * (-t * 7.0).exp() * 0.5
}

fn hat_open_long(s: &mut DrumState, t: f32, _dt: f32) -> f32 {
    (metal(t) * 0.5 + s.bright_noise() * 0.5) * (-t * 4.0).exp() * 0.5
}

fn clap(s: &mut DrumState, t: f32, _dt: f32) -> f32 {
    let bursts: f32 = [0.0f32, 0.011, 0.022]
        .iter()
        .filter(|&&offset| t >= offset)
        .map(|&offset| (-(t - offset) * 180.0).exp())
        .sum();
    let tail = (-t * 14.0).exp() * 0.6;
    s.bright_noise() * (bursts + tail) * 0.6
}

fn tom(s: &mut DrumState, t: f32, dt: f32) -> f32 {
    let freq = 95.0 + 70.0 * (-t * 10.0).exp();
    s.sweep(freq, dt) * (-t * 9.0).exp()
}

fn tom_high(s: &mut DrumState, t: f32, dt: f32) -> f32 {
    let freq = 160.0 + 90.0 * (-t * 12.0).exp();
    s.sweep(freq, dt) * (-t * 11.0).exp()
}

fn rim(s: &mut DrumState, t: f32, dt: f32) -> f32 {
    s.sweep(1700.0, dt) * (-t * 90.0).exp() + s.bright_noise() * (-t * 200.0).exp() * 0.3
}

fn cowbell(_s: &mut DrumState, t: f32, _dt: f32) -> f32 {
    (square(t, 540.0) + square(t, 800.0)) * 0.25 * (-t * 10.0).exp()
}

fn cymbal(s: &mut DrumState, t: f32, _dt: f32) -> f32 {
    s.bright_noise() * (-t * 3.0).exp() * 0.4
}

const PATCHES: [DrumPatch; 15] = [
    DrumPatch { kind: DrumKind::Kick, variant: 1, seconds: 0.6, generator: kick_deep },
    DrumPatch { kind: DrumKind::Kick, variant: 2, seconds: 0.4, generator: kick_punch },
    DrumPatch { kind: DrumKind::Snare, variant: 1, seconds: 0.35, generator: snare_body },
    DrumPatch { kind: DrumKind::Snare, variant: 2, seconds: 0.25, generator: snare_tight },
    DrumPatch { kind: DrumKind::ClosedHat, variant: 1, seconds: 0.12, generator: hat_closed },
    DrumPatch { kind: DrumKind::ClosedHat, variant: 2, seconds: 0.15, generator: hat_metal },
    DrumPatch { kind: DrumKind::OpenHat, variant: 1, seconds: 0.8, generator: hat_open },
    DrumPatch { kind: DrumKind::OpenHat, variant: 2, seconds: 1.2, generator: hat_open_long },
    DrumPatch { kind: DrumKind::Clap, variant: 1, seconds: 0.4, generator: clap },
    DrumPatch { kind: DrumKind::Tom, variant: 1, seconds: 0.6, generator: tom },
    DrumPatch { kind: DrumKind::Tom, variant: 2, seconds: 0.5, generator: tom_high },
    DrumPatch { kind: DrumKind::Rim, variant: 1, seconds: 0.08, generator: rim },
    DrumPatch { kind: DrumKind::Cowbell, variant: 1, seconds: 0.5, generator: cowbell },
    DrumPatch { kind: DrumKind::Cymbal, variant: 1, seconds: 1.8, generator: cymbal },
    DrumPatch { kind: DrumKind::Cymbal, variant: 2, seconds: 2.5, generator: cymbal },
];

/// Looks up the generator for `(kind, variant)`.
///
/// Variant 0 means the channel is off. Variants without an entry of their own
/// use variant 1 of the same kind.
pub fn patch_for(kind: DrumKind, variant: u8) -> Option<DrumPatch> {
    if variant == 0 {
        return None;
    }
    let find = |v: u8| PATCHES.iter().find(|p| p.kind == kind && p.variant == v).copied();
    find(variant).or_else(|| find(1))
}

#[derive(Debug, Clone)]
pub struct DrumVoice {
    patch: DrumPatch,
    state: DrumState,
    dt: f32,
    position: u32,
    length: u32,
    gain: f32,
}

impl DrumVoice {
    pub fn new(patch: DrumPatch, gain: f32, seed: u64, sample_rate: u32, max_seconds: f32) -> Self {
        let sr = sample_rate.max(1) as f32;
        Self {
            patch,
            state: DrumState::new(seed),
            dt: 1.0 / sr,
            position: 0,
            length: (patch.seconds.min(max_seconds).max(0.0) * sr) as u32,
            gain,
        }
    }

    /// Voice for `channel` of `kit`, or `None` when the channel is off or silent.
    pub fn for_channel(kit: &DrumKit, channel: usize, sample_rate: u32, max_seconds: f32) -> Option<Self> {
        let config = kit.channel(channel)?;
        let patch = patch_for(config.kind, config.variant)?;
        let gain = config.volume as f32 / 100.0 * kit.master_volume as f32 / 100.0;
        if gain <= 0.0 {
            return None;
        }
        Some(Self::new(patch, gain, 0x5EED_0000 + channel as u64, sample_rate, max_seconds))
    }

    pub fn patch(&self) -> &DrumPatch {
        &self.patch
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.length
    }

    pub fn remaining_samples(&self) -> u32 {
        self.length.saturating_sub(self.position)
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let t = self.position as f32 * self.dt;
        self.position += 1;
        (self.patch.generator)(&mut self.state, t, self.dt) * self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_first_variant() {
        for kind in DrumKind::LAYOUT {
            let patch = patch_for(kind, 1).unwrap();
            assert_eq!(patch.kind, kind);
            assert_eq!(patch.variant, 1);
        }
    }

    #[test]
    fn variant_zero_is_silent_and_unknown_variants_fall_back() {
        assert!(patch_for(DrumKind::Kick, 0).is_none());
        assert_eq!(patch_for(DrumKind::Kick, 2).unwrap().variant, 2);
        assert_eq!(patch_for(DrumKind::Rim, 7).unwrap().variant, 1);
    }

    #[test]
    fn disabled_channel_gives_no_voice() {
        let kit = DrumKit::default();
        // channels 5.. start disabled
        assert!(DrumVoice::for_channel(&kit, 6, 8000, 2.0).is_none());
        assert!(DrumVoice::for_channel(&kit, 0, 8000, 2.0).is_some());
        assert!(DrumVoice::for_channel(&kit, 42, 8000, 2.0).is_none());
    }

    #[test]
    fn same_channel_renders_identically() {
        let kit = DrumKit::default();
        let render = || {
            let mut voice = DrumVoice::for_channel(&kit, 1, 8000, 2.0).unwrap();
            std::iter::from_fn(|| (!voice.is_finished()).then(|| voice.next_sample())).collect::<Vec<_>>()
        };
        let a = render();
        assert_eq!(a.len(), (0.35f32 * 8000.0) as usize);
        assert_eq!(a, render());
    }

    #[test]
    fn length_is_capped() {
        let kit = DrumKit::default();
        let mut voice = DrumVoice::for_channel(&kit, 3, 1000, 0.1).unwrap();
        assert_eq!(voice.remaining_samples(), 100);
        for _ in 0..100 {
            assert!(voice.next_sample().is_finite());
        }
        assert!(voice.is_finished());
    }
}
