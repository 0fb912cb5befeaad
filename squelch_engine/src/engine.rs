use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use squelch_shared::Note;
use tracing::{debug, error, info, warn};

use crate::clock::{AudioClock, SampleClock};
use crate::commands::VoiceCommand;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::factory::VoiceFactory;
use crate::handle::SessionHandle;
use crate::mixer::VoicePool;
use crate::voice::VoiceDispatch;

const MAX_BUFFER_FRAMES: usize = 8192;

/// Live output on the default device.
///
/// The callback drains [`VoiceCommand`]s, mixes the voice pool and advances
/// the sample clock that the scheduler reads as audio time.
pub struct AudioEngine {
    _stream: cpal::Stream,
    clock: SampleClock,
    commands: Sender<VoiceCommand>,
    config: EngineConfig,
}

impl AudioEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, anyhow::Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(EngineError::NoOutputDevice)?;
        let supported = device.default_output_config()?;

        let sample_rate = supported.sample_rate();
        let channels = supported.channels() as usize;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        info!(sample_rate, channels, "opening output stream");

        let clock = SampleClock::new(sample_rate);
        let (command_tx, command_rx) = crossbeam_channel::unbounded::<VoiceCommand>();

        let callback_clock = clock.clone();
        let mut pool = VoicePool::new();
        let mut mono = vec![0.0f32; MAX_BUFFER_FRAMES];
        let mut gain = config.master_gain;

        let err_clock = clock.clone();
        let err_fn = move |err: cpal::StreamError| {
            if matches!(err, cpal::StreamError::DeviceNotAvailable) {
                error!("output device lost");
                err_clock.mark_lost();
                return;
            }
            let s = err.to_string();
            if !s.contains("underrun") && !s.contains("overrun") {
                warn!("stream error: {}", s);
            }
        };

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    drain_commands(&command_rx, &mut pool, &mut gain);

                    let frames = data.len() / channels.max(1);
                    let mut first = callback_clock.position();
                    for chunk in data.chunks_mut(MAX_BUFFER_FRAMES * channels.max(1)) {
                        let chunk_frames = chunk.len() / channels.max(1);
                        let buf = &mut mono[..chunk_frames];
                        buf.fill(0.0);
                        pool.render(buf, first);
                        for (frame, &sample) in chunk.chunks_mut(channels.max(1)).zip(buf.iter()) {
                            frame.fill((sample * gain).clamp(-1.0, 1.0));
                        }
                        first += chunk_frames as u64;
                    }
                    callback_clock.advance_frames(frames as u64);
                },
                err_fn,
                None,
            )?,
            other => return Err(EngineError::UnsupportedSampleFormat(format!("{other:?}")).into()),
        };

        stream.play()?;

        Ok(Self {
            _stream: stream,
            clock,
            commands: command_tx,
            config: config.clone(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn clock(&self) -> Arc<dyn AudioClock> {
        Arc::new(self.clock.clone())
    }

    /// A dispatcher that feeds this engine, reading synth settings from `session`.
    pub fn dispatch(&self, session: SessionHandle) -> ChannelDispatch {
        ChannelDispatch::new(
            self.commands.clone(),
            session,
            VoiceFactory::new(self.sample_rate(), self.config.max_voice_seconds),
        )
    }

    pub fn set_master_gain(&self, gain: f32) {
        let _ = self.commands.send(VoiceCommand::SetMasterGain(gain));
    }

    pub fn silence(&self) {
        let _ = self.commands.send(VoiceCommand::Silence);
    }
}

fn drain_commands(rx: &Receiver<VoiceCommand>, pool: &mut VoicePool, gain: &mut f32) {
    while let Ok(command) = rx.try_recv() {
        match command {
            VoiceCommand::Play { at_sample, voice } => pool.schedule(at_sample, voice),
            VoiceCommand::SetMasterGain(g) => *gain = g.max(0.0),
            VoiceCommand::Silence => pool.clear(),
        }
    }
}

/// Real-time [`VoiceDispatch`]: builds voices on the scheduler thread and
/// hands them to the audio callback stamped with their start sample.
pub struct ChannelDispatch {
    commands: Sender<VoiceCommand>,
    session: SessionHandle,
    factory: VoiceFactory,
}

impl ChannelDispatch {
    pub fn new(commands: Sender<VoiceCommand>, session: SessionHandle, factory: VoiceFactory) -> Self {
        Self {
            commands,
            session,
            factory,
        }
    }

    fn send(&self, at_time: f64, voice: crate::mixer::Voice) {
        let at_sample = self.factory.seconds_to_sample(at_time);
        if self
            .commands
            .send(VoiceCommand::Play { at_sample, voice })
            .is_err()
        {
            debug!("audio callback gone, trigger dropped");
        }
    }
}

impl VoiceDispatch for ChannelDispatch {
    fn trigger_note(
        &mut self,
        track_id: &str,
        note: &Note,
        at_time: f64,
        duration: f64,
        slide: bool,
        accent: bool,
    ) {
        let session = self.session.load();
        if let Some(voice) = self
            .factory
            .note(&session, track_id, note, duration, slide, accent)
        {
            self.send(at_time, voice);
        }
    }

    fn trigger_drum(&mut self, channel: usize, at_time: f64) {
        let session = self.session.load();
        if let Some(voice) = self.factory.drum(&session, channel) {
            self.send(at_time, voice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squelch_shared::PitchClass;

    #[test]
    fn dispatch_stamps_voices_with_start_sample() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = SessionHandle::default();
        let mut dispatch = ChannelDispatch::new(tx, handle, VoiceFactory::new(1000, 2.0));

        dispatch.trigger_drum(0, 0.25);
        dispatch.trigger_drum(7, 0.25);
        dispatch.trigger_note("bass1", &Note::new(PitchClass::D, 2), 0.5, 0.125, false, false);
        dispatch.trigger_note("ghost", &Note::new(PitchClass::D, 2), 0.5, 0.125, false, false);

        let starts: Vec<u64> = rx
            .try_iter()
            .map(|c| match c {
                VoiceCommand::Play { at_sample, .. } => at_sample,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        // channel 7 is disabled and "ghost" has no synth
        assert_eq!(starts, vec![250, 500]);
    }

    #[test]
    fn commands_reach_the_pool() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let factory = VoiceFactory::new(1000, 2.0);
        let session = squelch_shared::Session::new();
        let voice = factory.drum(&session, 0).unwrap();
        tx.send(VoiceCommand::Play { at_sample: 0, voice }).unwrap();
        tx.send(VoiceCommand::SetMasterGain(0.5)).unwrap();

        let mut pool = VoicePool::new();
        let mut gain = 1.0;
        drain_commands(&rx, &mut pool, &mut gain);
        assert_eq!(pool.len(), 1);
        assert_eq!(gain, 0.5);

        tx.send(VoiceCommand::Silence).unwrap();
        drain_commands(&rx, &mut pool, &mut gain);
        assert!(pool.is_empty());
    }
}
