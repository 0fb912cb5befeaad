//! The boundary between scheduling and sound generation.

use squelch_shared::Note;

/// Receives absolutely-timed triggers from the scheduler.
///
/// Calls arrive up to one look-ahead window before `at_time`; implementations
/// must place the sound relative to the audio clock, not to the call.
/// Triggers are fire-and-forget and cannot be cancelled once issued.
pub trait VoiceDispatch: Send {
    fn trigger_note(
        &mut self,
        track_id: &str,
        note: &Note,
        at_time: f64,
        duration: f64,
        slide: bool,
        accent: bool,
    );

    fn trigger_drum(&mut self, channel: usize, at_time: f64);
}

/// One trigger as issued by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceEvent {
    Note {
        track_id: String,
        note: Note,
        at_time: f64,
        duration: f64,
        slide: bool,
        accent: bool,
    },
    Drum {
        channel: usize,
        at_time: f64,
    },
}

impl VoiceEvent {
    pub fn at_time(&self) -> f64 {
        match self {
            VoiceEvent::Note { at_time, .. } | VoiceEvent::Drum { at_time, .. } => *at_time,
        }
    }
}

/// Dispatch that only records, in call order.
#[derive(Debug, Default, Clone)]
pub struct RecordingDispatch {
    events: Vec<VoiceEvent>,
}

impl RecordingDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[VoiceEvent] {
        &self.events
    }

    pub fn take(&mut self) -> Vec<VoiceEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn into_events(self) -> Vec<VoiceEvent> {
        self.events
    }

    pub fn drum_times(&self, channel: usize) -> Vec<f64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                VoiceEvent::Drum { channel: c, at_time } if *c == channel => Some(*at_time),
                _ => None,
            })
            .collect()
    }
}

impl VoiceDispatch for RecordingDispatch {
    fn trigger_note(
        &mut self,
        track_id: &str,
        note: &Note,
        at_time: f64,
        duration: f64,
        slide: bool,
        accent: bool,
    ) {
        self.events.push(VoiceEvent::Note {
            track_id: track_id.to_string(),
            note: *note,
            at_time,
            duration,
            slide,
            accent,
        });
    }

    fn trigger_drum(&mut self, channel: usize, at_time: f64) {
        self.events.push(VoiceEvent::Drum { channel, at_time });
    }
}
