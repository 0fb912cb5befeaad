use crate::percussion::DrumVoice;
use crate::synth::BassVoice;

/// Most voices sounding at once. The pool never grows past this on the audio thread.
pub const MAX_VOICES: usize = 64;

#[derive(Debug, Clone)]
pub enum Voice {
    Bass(BassVoice),
    Drum(DrumVoice),
}

impl Voice {
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self {
            Voice::Bass(v) => v.next_sample(),
            Voice::Drum(v) => v.next_sample(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Voice::Bass(v) => v.is_finished(),
            Voice::Drum(v) => v.is_finished(),
        }
    }

    pub fn remaining_samples(&self) -> u32 {
        match self {
            Voice::Bass(v) => v.remaining_samples(),
            Voice::Drum(v) => v.remaining_samples(),
        }
    }
}

#[derive(Debug, Clone)]
struct Scheduled {
    start: u64,
    voice: Voice,
}

/// Sample-accurate mono voice mixer, shared by the live and offline paths.
#[derive(Debug)]
pub struct VoicePool {
    voices: Vec<Scheduled>,
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new()
    }
}

impl VoicePool {
    pub fn new() -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Queues `voice` to begin at absolute sample `start`.
    ///
    /// A start in the past begins at the next rendered sample. When the pool is
    /// full the voice closest to its end is replaced.
    pub fn schedule(&mut self, start: u64, voice: Voice) {
        if voice.is_finished() {
            return;
        }
        if self.voices.len() >= MAX_VOICES {
            if let Some(victim) = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.voice.remaining_samples())
                .map(|(i, _)| i)
            {
                self.voices.swap_remove(victim);
            }
        }
        self.voices.push(Scheduled { start, voice });
    }

    /// Adds every voice into `out`, whose first frame is absolute sample `first_sample`.
    pub fn render(&mut self, out: &mut [f32], first_sample: u64) {
        let frames = out.len() as u64;
        for scheduled in self.voices.iter_mut() {
            let offset = scheduled.start.saturating_sub(first_sample);
            if offset >= frames {
                continue;
            }
            for sample in out[offset as usize..].iter_mut() {
                if scheduled.voice.is_finished() {
                    break;
                }
                *sample += scheduled.voice.next_sample();
            }
        }
        self.voices.retain(|s| !s.voice.is_finished());
    }

    pub fn clear(&mut self) {
        self.voices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::percussion::patch_for;
    use squelch_shared::DrumKind;

    fn click(samples: u32) -> Voice {
        let patch = patch_for(DrumKind::Rim, 1).unwrap();
        Voice::Drum(DrumVoice::new(patch, 1.0, 1, 1000, samples as f32 / 1000.0))
    }

    #[test]
    fn voices_start_on_their_sample() {
        let mut pool = VoicePool::new();
        pool.schedule(10, click(10));
        let mut out = vec![0.0; 8];
        pool.render(&mut out, 0);
        assert!(out.iter().all(|&s| s == 0.0));

        let mut out = vec![0.0; 8];
        pool.render(&mut out, 8);
        assert!(out[..2].iter().all(|&s| s == 0.0));
        assert_eq!(pool.len(), 1);

        let mut out = vec![0.0; 8];
        pool.render(&mut out, 16);
        assert!(pool.is_empty());
    }

    #[test]
    fn late_voices_play_immediately() {
        let mut pool = VoicePool::new();
        pool.schedule(0, click(4));
        let mut out = vec![0.0; 4];
        pool.render(&mut out, 100);
        assert!(pool.is_empty());
    }

    #[test]
    fn pool_never_exceeds_capacity() {
        let mut pool = VoicePool::new();
        for i in 0..(MAX_VOICES as u64 * 2) {
            pool.schedule(i, click(50));
        }
        assert_eq!(pool.len(), MAX_VOICES);
    }
}
