/// Playback position published by the player thread for display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportState {
    pub is_playing: bool,
    pub bpm: u32,
    /// Block of the next step to be scheduled.
    pub block: usize,
    /// Next step to be scheduled within `block`.
    pub step: usize,
    /// Audio time of that step.
    pub next_step_time: f64,
    pub steps_scheduled: u64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            is_playing: false,
            bpm: squelch_shared::DEFAULT_BPM,
            block: 0,
            step: 0,
            next_step_time: 0.0,
            steps_scheduled: 0,
        }
    }
}
