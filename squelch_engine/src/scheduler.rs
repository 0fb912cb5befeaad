//! Look-ahead step scheduler.
//!
//! Ticks only prompt a refill: every step whose start time falls inside
//! `now + lookahead` is dispatched with its absolute audio time, so late or
//! bunched ticks never move a trigger.

use std::collections::VecDeque;

use squelch_shared::Session;
use tracing::trace;

use crate::voice::VoiceDispatch;

/// Display cue for one scheduled step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMarker {
    pub step: usize,
    pub block: usize,
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Seconds beyond the clock that are kept filled with triggers.
    pub lookahead: f64,
    /// Delay between `start` and the first step.
    pub start_offset: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead: 0.1,
            start_offset: 0.1,
        }
    }
}

impl From<&crate::config::EngineConfig> for SchedulerConfig {
    fn from(config: &crate::config::EngineConfig) -> Self {
        Self {
            lookahead: config.lookahead(),
            start_offset: config.start_offset(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    next_event_time: f64,
    current_step: usize,
    current_block: usize,
    running: bool,
    steps_scheduled: u64,
    markers: VecDeque<StepMarker>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            next_event_time: 0.0,
            current_step: 0,
            current_block: 0,
            running: false,
            steps_scheduled: 0,
            markers: VecDeque::new(),
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Resets to step 0 of `block`; the first step sounds `start_offset` after `now`.
    pub fn start(&mut self, now: f64, block: usize) {
        self.current_step = 0;
        self.current_block = block;
        self.next_event_time = now + self.config.start_offset;
        self.steps_scheduled = 0;
        self.markers.clear();
        self.running = true;
    }

    /// Stops further scheduling. Triggers already dispatched still play out.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn next_event_time(&self) -> f64 {
        self.next_event_time
    }

    /// `(block, step)` of the next step to be scheduled.
    pub fn position(&self) -> (usize, usize) {
        (self.current_block, self.current_step)
    }

    pub fn steps_scheduled(&self) -> u64 {
        self.steps_scheduled
    }

    /// Tops up the look-ahead window. Returns the number of steps scheduled.
    pub fn tick(
        &mut self,
        session: &Session,
        now: f64,
        mut voices: Option<&mut (dyn VoiceDispatch + '_)>,
    ) -> usize {
        if !self.running {
            return 0;
        }
        let horizon = now + self.config.lookahead;
        let mut scheduled = 0;
        while self.next_event_time < horizon {
            self.schedule_next_step(session, voices.as_deref_mut());
            scheduled += 1;
        }
        scheduled
    }

    /// Dispatches the current step at `next_event_time` and advances by one step.
    ///
    /// Block count, step count and tempo are read from `session` on every call,
    /// so structural edits and tempo changes apply from the next step on.
    pub fn schedule_next_step(
        &mut self,
        session: &Session,
        voices: Option<&mut (dyn VoiceDispatch + '_)>,
    ) {
        let block_count = session.block_count().max(1);
        let steps_per_block = session.pattern().steps_per_block().max(1);
        if self.current_block >= block_count {
            self.current_block = block_count - 1;
        }
        if self.current_step >= steps_per_block {
            self.current_step = 0;
        }

        let at_time = self.next_event_time;
        let duration = session.seconds_per_step();
        let data = session.get_step_data(self.current_step, self.current_block);

        if let Some(voices) = voices {
            for &channel in data.drums {
                voices.trigger_drum(channel, at_time);
            }
            for (track_id, note) in data.notes() {
                voices.trigger_note(track_id, note, at_time, duration, note.slide, note.accent);
            }
        }

        trace!(
            block = self.current_block,
            step = self.current_step,
            at_time,
            "scheduled step"
        );
        self.markers.push_back(StepMarker {
            step: self.current_step,
            block: self.current_block,
            time: at_time,
        });

        self.next_event_time += duration;
        self.steps_scheduled += 1;
        self.current_step += 1;
        if self.current_step >= steps_per_block {
            self.current_step = 0;
            self.current_block = (self.current_block + 1) % block_count;
        }
    }

    /// Markers in scheduling order, oldest first.
    pub fn drain_markers(&mut self) -> impl Iterator<Item = StepMarker> + '_ {
        self.markers.drain(..)
    }

    /// Removes and returns markers whose time has been reached.
    pub fn take_due_markers(&mut self, now: f64) -> Vec<StepMarker> {
        let due = self.markers.iter().take_while(|m| m.time <= now).count();
        self.markers.drain(..due).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{RecordingDispatch, VoiceEvent};
    use squelch_shared::{Note, PitchClass};

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            lookahead: 0.1,
            start_offset: 0.1,
        }
    }

    #[test]
    fn does_nothing_until_started() {
        let mut scheduler = Scheduler::new(config());
        let mut rec = RecordingDispatch::new();
        assert_eq!(scheduler.tick(&Session::new(), 10.0, Some(&mut rec)), 0);
        assert!(rec.events().is_empty());
    }

    #[test]
    fn fills_exactly_the_lookahead_window() {
        // 150 bpm: one step is 0.1s
        let mut session = Session::new();
        session.set_bpm(150);
        let mut scheduler = Scheduler::new(config());
        scheduler.start(0.0, 0);
        assert_eq!(scheduler.tick(&session, 0.0, None), 0);
        assert_eq!(scheduler.tick(&session, 0.05, None), 1);
        assert_eq!(scheduler.tick(&session, 0.05, None), 0);
        assert_eq!(scheduler.tick(&session, 0.35, None), 3);
        assert_eq!(scheduler.position(), (0, 4));
    }

    #[test]
    fn dispatches_drums_and_notes_with_step_time() {
        let mut session = Session::new();
        session.set_bpm(120);
        session.toggle_drum(0, 0, 2).unwrap();
        let note = Note::new(PitchClass::E, 2).with_accent(true);
        session.set_note(0, "bass1", 1, Some(note)).unwrap();

        let mut scheduler = Scheduler::new(config());
        let mut rec = RecordingDispatch::new();
        scheduler.start(1.0, 0);
        scheduler.tick(&session, 1.2, Some(&mut rec));

        assert_eq!(
            rec.events(),
            &[
                VoiceEvent::Drum {
                    channel: 2,
                    at_time: 1.1
                },
                VoiceEvent::Note {
                    track_id: "bass1".into(),
                    note,
                    at_time: 1.1 + 0.125,
                    duration: 0.125,
                    slide: false,
                    accent: true,
                },
            ]
        );
    }

    #[test]
    fn wraps_steps_into_following_blocks() {
        let mut session = Session::new();
        session.add_block();
        let mut scheduler = Scheduler::new(config());
        scheduler.start(0.0, 1);
        for _ in 0..16 {
            scheduler.schedule_next_step(&session, None);
        }
        assert_eq!(scheduler.position(), (0, 0));
        let markers: Vec<_> = scheduler.drain_markers().collect();
        assert_eq!(markers.len(), 16);
        assert!(markers.iter().all(|m| m.block == 1));
    }

    #[test]
    fn removed_active_block_is_clamped() {
        let mut session = Session::new();
        session.add_block();
        session.add_block();
        let mut scheduler = Scheduler::new(config());
        scheduler.start(0.0, 2);
        scheduler.schedule_next_step(&session, None);

        session.remove_block(2).unwrap();
        scheduler.schedule_next_step(&session, None);
        let last = scheduler.drain_markers().last().unwrap();
        assert_eq!((last.block, last.step), (1, 1));
    }

    #[test]
    fn missing_dispatch_still_advances() {
        let mut session = Session::new();
        session.toggle_drum(0, 0, 0).unwrap();
        let mut scheduler = Scheduler::new(config());
        scheduler.start(0.0, 0);
        assert_eq!(scheduler.tick(&session, 0.5, None), 4);
        assert_eq!(scheduler.steps_scheduled(), 4);
    }

    #[test]
    fn due_markers_are_released_in_order() {
        let session = Session::new();
        let mut scheduler = Scheduler::new(config());
        scheduler.start(0.0, 0);
        scheduler.tick(&session, 0.4, None);
        let due = scheduler.take_due_markers(0.25);
        assert_eq!(due.iter().map(|m| m.step).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(scheduler.take_due_markers(0.25), vec![]);
        assert_eq!(scheduler.drain_markers().next().map(|m| m.step), Some(2));
    }

    #[test]
    fn stop_halts_scheduling() {
        let session = Session::new();
        let mut scheduler = Scheduler::new(config());
        scheduler.start(0.0, 0);
        scheduler.stop();
        assert_eq!(scheduler.tick(&session, 5.0, None), 0);
        assert!(!scheduler.is_running());
    }
}
