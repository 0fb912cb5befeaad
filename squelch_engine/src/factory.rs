use std::collections::HashMap;

use squelch_shared::{Note, Session};
use tracing::debug;

use crate::mixer::Voice;
use crate::percussion::DrumVoice;
use crate::synth::{BassTrigger, BassVoice};

/// Fraction of the step a plain note is held for.
const GATE_FRACTION: f64 = 0.55;
/// A sliding note is held into the next step so the following note can glide.
const SLIDE_GATE_FRACTION: f64 = 1.05;

/// Turns scheduler triggers into voices using the synth and drum settings of a session.
///
/// Keeps the last sliding pitch per track so the next note on that track glides in.
#[derive(Debug, Clone)]
pub struct VoiceFactory {
    sample_rate: u32,
    max_voice_seconds: f32,
    glide_from: HashMap<String, f32>,
}

impl VoiceFactory {
    pub fn new(sample_rate: u32, max_voice_seconds: f32) -> Self {
        Self {
            sample_rate,
            max_voice_seconds,
            glide_from: HashMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn seconds_to_sample(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    pub fn note(
        &mut self,
        session: &Session,
        track_id: &str,
        note: &Note,
        duration: f64,
        slide: bool,
        accent: bool,
    ) -> Option<Voice> {
        let Some(synth) = session.synth(track_id) else {
            debug!(track_id, "no synth for track, note dropped");
            return None;
        };
        let frequency = note.frequency();
        let glide_from = if slide {
            self.glide_from.insert(track_id.to_string(), frequency)
        } else {
            self.glide_from.remove(track_id)
        };
        let gate = if slide { SLIDE_GATE_FRACTION } else { GATE_FRACTION };
        let trigger = BassTrigger {
            frequency,
            glide_from,
            gate_seconds: (duration * gate) as f32,
            accent,
        };
        Some(Voice::Bass(BassVoice::new(
            synth,
            trigger,
            self.sample_rate,
            self.max_voice_seconds,
        )))
    }

    pub fn drum(&self, session: &Session, channel: usize) -> Option<Voice> {
        DrumVoice::for_channel(&session.drums, channel, self.sample_rate, self.max_voice_seconds)
            .map(Voice::Drum)
    }

    pub fn reset(&mut self) {
        self.glide_from.clear();
    }
}
