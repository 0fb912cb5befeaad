use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::clipboard::Clipboard;
use crate::error::PatternError;
use crate::note::Note;
use crate::{DRUM_CHANNEL_COUNT, STEPS_PER_BLOCK};

/// Track id used when the very first block is created.
pub const DEFAULT_TRACK_ID: &str = "bass1";

/// One monophonic lane: a slot per step.
pub type TrackLane = Vec<Option<Note>>;
/// Active drum channel indices at one step.
pub type DrumStep = BTreeSet<usize>;
pub type Tracks = BTreeMap<String, TrackLane>;

static EMPTY_TRACKS: Tracks = BTreeMap::new();
static EMPTY_DRUMS: DrumStep = BTreeSet::new();

/// One bar of the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub tracks: Tracks,
    pub drums: Vec<DrumStep>,
}

impl Block {
    pub fn empty<'a>(track_ids: impl IntoIterator<Item = &'a str>, steps: usize) -> Self {
        Self {
            tracks: track_ids
                .into_iter()
                .map(|id| (id.to_string(), vec![None; steps]))
                .collect(),
            drums: vec![DrumStep::new(); steps],
        }
    }

    pub fn clear(&mut self) {
        for lane in self.tracks.values_mut() {
            lane.iter_mut().for_each(|slot| *slot = None);
        }
        self.drums.iter_mut().for_each(DrumStep::clear);
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.values().all(|lane| lane.iter().all(Option::is_none))
            && self.drums.iter().all(DrumStep::is_empty)
    }

    /// Reshapes this block to the given track set and step count, keeping matching lanes.
    fn conform_to(&mut self, track_ids: &[String], steps: usize) {
        self.tracks.retain(|id, _| track_ids.contains(id));
        for id in track_ids {
            self.tracks.entry(id.clone()).or_insert_with(|| vec![None; steps]);
        }
        for lane in self.tracks.values_mut() {
            lane.resize(steps, None);
        }
        self.drums.resize(steps, DrumStep::new());
    }
}

/// Read-only view of one step handed to the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct StepData<'a> {
    pub step: usize,
    pub tracks: &'a Tracks,
    pub drums: &'a DrumStep,
}

impl<'a> StepData<'a> {
    pub fn empty(step: usize) -> Self {
        Self {
            step,
            tracks: &EMPTY_TRACKS,
            drums: &EMPTY_DRUMS,
        }
    }

    /// Every non-empty note slot at this step, by track id.
    pub fn notes(&self) -> impl Iterator<Item = (&'a str, &'a Note)> + 'a {
        let step = self.step;
        let tracks: &'a Tracks = self.tracks;
        tracks.iter().filter_map(move |(id, lane)| {
            lane.get(step)
                .and_then(Option::as_ref)
                .map(|note| (id.as_str(), note))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.drums.is_empty() && self.notes().next().is_none()
    }
}

/// Ordered sequence of blocks sharing one track-key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStore {
    blocks: Vec<Block>,
    steps_per_block: usize,
}

impl Default for PatternStore {
    fn default() -> Self {
        let mut store = Self::empty(STEPS_PER_BLOCK);
        store.add_block();
        store
    }
}

impl PatternStore {
    /// A store with no blocks. The first `add_block` creates the default track.
    pub fn empty(steps_per_block: usize) -> Self {
        Self {
            blocks: Vec::new(),
            steps_per_block: steps_per_block.max(1),
        }
    }

    pub fn steps_per_block(&self) -> usize {
        self.steps_per_block
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn total_steps(&self) -> usize {
        self.blocks.len() * self.steps_per_block
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Track ids in key order, taken from the first block.
    pub fn track_ids(&self) -> Vec<String> {
        self.blocks
            .first()
            .map(|b| b.tracks.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn check_index(&self, index: usize) -> Result<(), PatternError> {
        if index < self.blocks.len() {
            Ok(())
        } else {
            Err(PatternError::BlockOutOfRange {
                index,
                count: self.blocks.len(),
            })
        }
    }

    /// Appends a cleared block with the same track keys as the first block.
    pub fn add_block(&mut self) -> usize {
        let block = match self.blocks.first() {
            Some(first) => Block::empty(first.tracks.keys().map(String::as_str), self.steps_per_block),
            None => Block::empty([DEFAULT_TRACK_ID], self.steps_per_block),
        };
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    /// Inserts a deep copy of block `index` right after it.
    pub fn duplicate_block(&mut self, index: usize) -> Result<usize, PatternError> {
        self.check_index(index)?;
        let copy = self.blocks[index].clone();
        self.blocks.insert(index + 1, copy);
        Ok(index + 1)
    }

    pub fn copy_block(&self, index: usize, clipboard: &mut Clipboard) -> Result<(), PatternError> {
        self.check_index(index)?;
        clipboard.store(self.blocks[index].clone());
        Ok(())
    }

    /// Inserts the clipboard block after `index`, conformed to the current track set.
    pub fn paste_block(&mut self, index: usize, clipboard: &Clipboard) -> Result<usize, PatternError> {
        self.check_index(index)?;
        let mut block = clipboard.block().cloned().ok_or(PatternError::EmptyClipboard)?;
        block.conform_to(&self.track_ids(), self.steps_per_block);
        self.blocks.insert(index + 1, block);
        Ok(index + 1)
    }

    /// Removes a block, or clears it in place when it is the only one left.
    pub fn remove_block(&mut self, index: usize) -> Result<(), PatternError> {
        self.check_index(index)?;
        if self.blocks.len() == 1 {
            self.blocks[0].clear();
        } else {
            self.blocks.remove(index);
        }
        Ok(())
    }

    /// Swaps block `index` with its neighbour at `index + direction`.
    pub fn move_block(&mut self, index: usize, direction: isize) -> Result<usize, PatternError> {
        self.check_index(index)?;
        let target = index
            .checked_add_signed(direction)
            .filter(|t| *t < self.blocks.len())
            .ok_or(PatternError::MoveOutOfRange { index, direction })?;
        self.blocks.swap(index, target);
        Ok(target)
    }

    pub fn clear_block(&mut self, index: usize) -> Result<(), PatternError> {
        self.check_index(index)?;
        self.blocks[index].clear();
        Ok(())
    }

    /// Adds a lane to every block. Registering an existing id does nothing.
    pub fn register_track(&mut self, id: &str) {
        let steps = self.steps_per_block;
        for block in self.blocks.iter_mut() {
            block
                .tracks
                .entry(id.to_string())
                .or_insert_with(|| vec![None; steps]);
        }
    }

    pub fn remove_track(&mut self, id: &str) {
        for block in self.blocks.iter_mut() {
            block.tracks.remove(id);
        }
    }

    pub fn has_track(&self, id: &str) -> bool {
        self.blocks.first().is_some_and(|b| b.tracks.contains_key(id))
    }

    pub fn note(&self, block: usize, track: &str, step: usize) -> Option<&Note> {
        self.blocks
            .get(block)?
            .tracks
            .get(track)?
            .get(step)?
            .as_ref()
    }

    pub fn set_note(
        &mut self,
        block: usize,
        track: &str,
        step: usize,
        note: Option<Note>,
    ) -> Result<(), PatternError> {
        self.check_index(block)?;
        let steps = self.steps_per_block;
        let lane = self.blocks[block]
            .tracks
            .get_mut(track)
            .ok_or_else(|| PatternError::UnknownTrack(track.to_string()))?;
        if step >= steps {
            return Err(PatternError::StepOutOfRange(step));
        }
        lane[step] = note;
        Ok(())
    }

    pub fn set_drum(
        &mut self,
        block: usize,
        step: usize,
        channel: usize,
        active: bool,
    ) -> Result<(), PatternError> {
        self.check_index(block)?;
        if channel >= DRUM_CHANNEL_COUNT {
            return Err(PatternError::ChannelOutOfRange(channel));
        }
        let drums = self.blocks[block]
            .drums
            .get_mut(step)
            .ok_or(PatternError::StepOutOfRange(step))?;
        if active {
            drums.insert(channel);
        } else {
            drums.remove(&channel);
        }
        Ok(())
    }

    /// Flips a drum hit and returns the new state.
    pub fn toggle_drum(&mut self, block: usize, step: usize, channel: usize) -> Result<bool, PatternError> {
        let active = self
            .blocks
            .get(block)
            .and_then(|b| b.drums.get(step))
            .is_some_and(|d| d.contains(&channel));
        self.set_drum(block, step, channel, !active)?;
        Ok(!active)
    }

    /// Step view for the scheduler. Invalid indices give an empty view instead of failing.
    pub fn get_step_data(&self, step: usize, block_index: usize) -> StepData<'_> {
        match self.blocks.get(block_index) {
            Some(block) => StepData {
                step,
                tracks: &block.tracks,
                drums: block.drums.get(step).unwrap_or(&EMPTY_DRUMS),
            },
            None => StepData::empty(step),
        }
    }

    /// Replaces every block. Used by importers that build a store from scratch.
    pub(crate) fn replace_blocks(&mut self, blocks: Vec<Block>) {
        self.blocks = blocks;
    }
}
