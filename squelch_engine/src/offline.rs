//! Non-realtime rendering.
//!
//! Runs the same [`Scheduler`] as live playback against a simulated clock and
//! a private copy of the session, then mixes the recorded triggers through the
//! same voice pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use squelch_shared::Session;
use tracing::{debug, info, instrument};

use crate::clock::{AudioClock, ManualClock};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::factory::VoiceFactory;
use crate::mixer::VoicePool;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::voice::{RecordingDispatch, VoiceEvent};

const RENDER_CHUNK: usize = 4096;

/// Mono render result.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub events: Vec<VoiceEvent>,
    /// Audio time at which the rendered loops end; the rest is voice tail.
    pub pattern_seconds: f64,
}

impl RenderOutput {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }

    /// Interleaved two-channel copy for export.
    pub fn to_stereo(&self) -> Vec<f32> {
        self.samples.iter().flat_map(|&s| [s, s]).collect()
    }

    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}

#[derive(Debug, Clone)]
pub struct OfflineRenderer {
    config: EngineConfig,
    cancel: Arc<AtomicBool>,
}

impl OfflineRenderer {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the returned flag abandons an in-flight render.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn check_cancel(&self) -> Result<(), EngineError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(EngineError::RenderCancelled);
        }
        Ok(())
    }

    /// Triggers for `loops` passes over every block, starting at time 0.
    pub fn collect_events(&self, session: &Session, loops: usize) -> Result<Vec<VoiceEvent>, EngineError> {
        self.schedule(&session.clone(), loops).map(|(events, _)| events)
    }

    fn schedule(&self, snapshot: &Session, loops: usize) -> Result<(Vec<VoiceEvent>, f64), EngineError> {
        let total_steps = (snapshot.pattern().total_steps() * loops.max(1)) as u64;
        let mut scheduler = Scheduler::new(SchedulerConfig {
            lookahead: self.config.lookahead(),
            start_offset: 0.0,
        });
        let clock = ManualClock::new();
        let tick = self.config.tick_interval().as_secs_f64();
        let mut recorder = RecordingDispatch::new();
        let mut step_times = Vec::with_capacity(total_steps as usize + 8);

        scheduler.start(0.0, 0);
        while scheduler.steps_scheduled() <= total_steps {
            self.check_cancel()?;
            let now = clock.now().unwrap_or_default();
            scheduler.tick(snapshot, now, Some(&mut recorder));
            step_times.extend(scheduler.drain_markers().map(|m| m.time));
            clock.advance(tick);
        }

        // The first step past the last loop marks the end; anything from there on
        // was only scheduled because the final tick overshot.
        let end = step_times
            .get(total_steps as usize)
            .copied()
            .unwrap_or_else(|| scheduler.next_event_time());
        let mut events = recorder.into_events();
        events.retain(|e| e.at_time() < end);
        debug!(steps = total_steps, events = events.len(), "offline schedule complete");
        Ok((events, end))
    }

    #[instrument(skip(self, session))]
    pub fn render(&self, session: &Session, loops: usize) -> Result<RenderOutput, EngineError> {
        let snapshot = session.clone();
        let (events, pattern_seconds) = self.schedule(&snapshot, loops)?;

        let sample_rate = self.config.sample_rate.max(1);
        let mut factory = VoiceFactory::new(sample_rate, self.config.max_voice_seconds);
        let total_frames = ((pattern_seconds + self.config.max_voice_seconds as f64)
            * sample_rate as f64)
            .ceil() as usize;

        let mut pool = VoicePool::new();
        let mut samples = vec![0.0f32; total_frames];
        let mut pending = events.iter().peekable();
        let mut position = 0usize;

        while position < total_frames {
            self.check_cancel()?;
            let end = (position + RENDER_CHUNK).min(total_frames);
            while let Some(event) = pending.peek() {
                let start = factory.seconds_to_sample(event.at_time());
                if start >= end as u64 {
                    break;
                }
                let voice = match event {
                    VoiceEvent::Note {
                        track_id,
                        note,
                        duration,
                        slide,
                        accent,
                        ..
                    } => factory.note(&snapshot, track_id, note, *duration, *slide, *accent),
                    VoiceEvent::Drum { channel, .. } => factory.drum(&snapshot, *channel),
                };
                if let Some(voice) = voice {
                    pool.schedule(start, voice);
                }
                pending.next();
            }
            pool.render(&mut samples[position..end], position as u64);
            position = end;
        }

        let gain = self.config.master_gain;
        for sample in samples.iter_mut() {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
        info!(
            seconds = total_frames as f64 / sample_rate as f64,
            events = events.len(),
            "offline render complete"
        );

        Ok(RenderOutput {
            samples,
            sample_rate,
            events,
            pattern_seconds,
        })
    }
}
