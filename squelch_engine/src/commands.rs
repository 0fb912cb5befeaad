use crate::mixer::Voice;

/// Messages from the scheduler thread to the audio callback.
#[derive(Debug)]
pub enum VoiceCommand {
    /// Start `voice` at absolute sample `at_sample` of the output clock.
    Play { at_sample: u64, voice: Voice },
    SetMasterGain(f32),
    /// Drop every sounding voice.
    Silence,
}
