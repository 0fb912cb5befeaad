use serde::{Deserialize, Serialize};

use crate::clipboard::Clipboard;
use crate::drums::DrumKit;
use crate::error::PatternError;
use crate::note::Note;
use crate::pattern::{PatternStore, StepData, DEFAULT_TRACK_ID};
use crate::synth::BassSynthState;
use crate::{DEFAULT_BPM, MAX_BPM, MIN_BPM, STEPS_PER_BLOCK};

/// Aggregate root of an editing session.
///
/// Every bass synth id is also a track key in every block of the pattern; the
/// two are created and destroyed together through [`Session::add_bass_track`]
/// and [`Session::remove_bass_track`]. The pattern is only reachable mutably
/// through the block and cell editors below, none of which touch track keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    bpm: u32,
    pattern: PatternStore,
    synths: Vec<BassSynthState>,
    pub drums: DrumKit,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// One cleared block and one default bass track.
    pub fn new() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            pattern: PatternStore::default(),
            synths: vec![BassSynthState::new(DEFAULT_TRACK_ID)],
            drums: DrumKit::default(),
        }
    }

    /// `block_count` cleared blocks, no bass tracks and a default drum kit.
    pub fn blank(bpm: u32, block_count: usize) -> Self {
        let mut pattern = PatternStore::empty(STEPS_PER_BLOCK);
        pattern.replace_blocks(
            (0..block_count.max(1))
                .map(|_| crate::pattern::Block::empty(std::iter::empty(), STEPS_PER_BLOCK))
                .collect(),
        );
        let mut session = Self {
            bpm: DEFAULT_BPM,
            pattern,
            synths: Vec::new(),
            drums: DrumKit::default(),
        };
        session.set_bpm(bpm);
        session
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    pub fn seconds_per_step(&self) -> f64 {
        crate::seconds_per_step(self.bpm)
    }

    pub fn synths(&self) -> &[BassSynthState] {
        &self.synths
    }

    pub fn synth(&self, id: &str) -> Option<&BassSynthState> {
        self.synths.iter().find(|s| s.id == id)
    }

    pub fn synth_mut(&mut self, id: &str) -> Option<&mut BassSynthState> {
        self.synths.iter_mut().find(|s| s.id == id)
    }

    /// Creates a bass track with the next free `bassN` id and returns the id.
    pub fn add_bass_track(&mut self) -> String {
        let id = (1..)
            .map(|n| format!("bass{n}"))
            .find(|candidate| self.synth(candidate).is_none() && !self.pattern.has_track(candidate))
            .unwrap_or_else(|| format!("bass{}", self.synths.len() + 1));
        self.ensure_bass_track(&id);
        id
    }

    /// Returns the synth for `id`, creating it and its track lane if missing.
    pub fn ensure_bass_track(&mut self, id: &str) -> &mut BassSynthState {
        self.pattern.register_track(id);
        match self.synths.iter().position(|s| s.id == id) {
            Some(pos) => &mut self.synths[pos],
            None => {
                self.synths.push(BassSynthState::new(id));
                let last = self.synths.len() - 1;
                &mut self.synths[last]
            }
        }
    }

    pub fn remove_bass_track(&mut self, id: &str) -> Result<BassSynthState, PatternError> {
        let pos = self
            .synths
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| PatternError::UnknownTrack(id.to_string()))?;
        self.pattern.remove_track(id);
        Ok(self.synths.remove(pos))
    }

    pub fn block_count(&self) -> usize {
        self.pattern.block_count()
    }

    pub fn pattern(&self) -> &PatternStore {
        &self.pattern
    }

    pub fn get_step_data(&self, step: usize, block: usize) -> StepData<'_> {
        self.pattern.get_step_data(step, block)
    }

    pub fn add_block(&mut self) -> usize {
        self.pattern.add_block()
    }

    pub fn duplicate_block(&mut self, index: usize) -> Result<usize, PatternError> {
        self.pattern.duplicate_block(index)
    }

    pub fn copy_block(&self, index: usize, clipboard: &mut Clipboard) -> Result<(), PatternError> {
        self.pattern.copy_block(index, clipboard)
    }

    /// Pasted blocks are conformed to this session's tracks.
    pub fn paste_block(&mut self, index: usize, clipboard: &Clipboard) -> Result<usize, PatternError> {
        self.pattern.paste_block(index, clipboard)
    }

    pub fn remove_block(&mut self, index: usize) -> Result<(), PatternError> {
        self.pattern.remove_block(index)
    }

    pub fn move_block(&mut self, index: usize, direction: isize) -> Result<usize, PatternError> {
        self.pattern.move_block(index, direction)
    }

    pub fn clear_block(&mut self, index: usize) -> Result<(), PatternError> {
        self.pattern.clear_block(index)
    }

    pub fn note(&self, block: usize, track: &str, step: usize) -> Option<&Note> {
        self.pattern.note(block, track, step)
    }

    /// Fails with `UnknownTrack` unless `track` belongs to a bass synth.
    pub fn set_note(
        &mut self,
        block: usize,
        track: &str,
        step: usize,
        note: Option<Note>,
    ) -> Result<(), PatternError> {
        self.pattern.set_note(block, track, step, note)
    }

    pub fn set_drum(
        &mut self,
        block: usize,
        step: usize,
        channel: usize,
        active: bool,
    ) -> Result<(), PatternError> {
        self.pattern.set_drum(block, step, channel, active)
    }

    pub fn toggle_drum(&mut self, block: usize, step: usize, channel: usize) -> Result<bool, PatternError> {
        self.pattern.toggle_drum(block, step, channel)
    }
}
