//! Live playback: a background thread that refills the look-ahead window on
//! every tick and forwards step markers to the display.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use arc_swap::ArcSwap;
use crossbeam_channel::{select, Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

use crate::clock::AudioClock;
use crate::error::EngineError;
use crate::handle::SessionHandle;
use crate::scheduler::{Scheduler, SchedulerConfig, StepMarker};
use crate::tick::TickSource;
use crate::transport::TransportState;
use crate::voice::VoiceDispatch;

/// Markers held for the display before new ones are dropped.
pub const MARKER_CAPACITY: usize = 256;

enum PlayerCommand {
    Start { now: f64, block: usize },
    Stop,
    Shutdown,
}

pub struct Player {
    session: SessionHandle,
    clock: Arc<dyn AudioClock>,
    commands: Sender<PlayerCommand>,
    markers: Receiver<StepMarker>,
    transport: Arc<ArcSwap<TransportState>>,
    playing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Spawns the scheduler thread. `voices` of `None` schedules silently.
    pub fn spawn(
        session: SessionHandle,
        clock: Arc<dyn AudioClock>,
        ticks: &dyn TickSource,
        voices: Option<Box<dyn VoiceDispatch>>,
        config: SchedulerConfig,
    ) -> anyhow::Result<Self> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (marker_tx, marker_rx) = crossbeam_channel::bounded(MARKER_CAPACITY);
        let transport = Arc::new(ArcSwap::from_pointee(TransportState {
            bpm: session.load().bpm(),
            ..TransportState::default()
        }));
        let playing = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            scheduler: Scheduler::new(config),
            session: session.clone(),
            clock: clock.clone(),
            voices,
            markers: marker_tx,
            transport: transport.clone(),
            playing: playing.clone(),
        };
        let tick_rx = ticks.ticks();
        let thread = std::thread::Builder::new()
            .name("squelch-scheduler".into())
            .spawn(move || worker.run(command_rx, tick_rx))?;

        Ok(Self {
            session,
            clock,
            commands: command_tx,
            markers: marker_rx,
            transport,
            playing,
            thread: Some(thread),
        })
    }

    /// Starts at step 0 of `block`.
    pub fn start(&self, block: usize) -> Result<(), EngineError> {
        if self.playing.load(Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }
        let now = self.clock.now().ok_or(EngineError::ClockUnavailable)?;
        self.playing.store(true, Ordering::SeqCst);
        self.commands
            .send(PlayerCommand::Start { now, block })
            .map_err(|_| EngineError::PlayerGone)
    }

    /// Halts scheduling. Voices already triggered ring out.
    pub fn stop(&self) -> Result<(), EngineError> {
        self.playing.store(false, Ordering::SeqCst);
        self.commands
            .send(PlayerCommand::Stop)
            .map_err(|_| EngineError::PlayerGone)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Takes effect from the next scheduled step.
    pub fn set_bpm(&self, bpm: u32) {
        self.session.set_bpm(bpm);
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Step markers in scheduling order, each stamped with its audio time.
    ///
    /// Holds at most [`MARKER_CAPACITY`] undrained markers; newer ones are
    /// dropped until the receiver catches up.
    pub fn markers(&self) -> Receiver<StepMarker> {
        self.markers.clone()
    }

    pub fn transport(&self) -> TransportState {
        **self.transport.load()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.commands.send(PlayerCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("scheduler thread panicked");
            }
        }
    }
}

struct Worker {
    scheduler: Scheduler,
    session: SessionHandle,
    clock: Arc<dyn AudioClock>,
    voices: Option<Box<dyn VoiceDispatch>>,
    markers: Sender<StepMarker>,
    transport: Arc<ArcSwap<TransportState>>,
    playing: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self, commands: Receiver<PlayerCommand>, ticks: Receiver<Instant>) {
        debug!("scheduler thread started");
        loop {
            select! {
                recv(commands) -> command => match command {
                    Ok(PlayerCommand::Start { now, block }) => {
                        self.scheduler.start(now, block);
                        info!(block, "playback started");
                        self.refill();
                    }
                    Ok(PlayerCommand::Stop) => {
                        self.scheduler.stop();
                        self.publish();
                        info!("playback stopped");
                    }
                    Ok(PlayerCommand::Shutdown) | Err(_) => break,
                },
                recv(ticks) -> tick => {
                    if tick.is_err() {
                        warn!("tick source closed");
                        break;
                    }
                    self.refill();
                }
            }
        }
        debug!("scheduler thread exiting");
    }

    fn refill(&mut self) {
        if !self.scheduler.is_running() {
            return;
        }
        let Some(now) = self.clock.now() else {
            error!("audio clock lost, stopping playback");
            self.scheduler.stop();
            self.playing.store(false, Ordering::SeqCst);
            self.publish();
            return;
        };
        let snapshot = self.session.load();
        self.scheduler.tick(&snapshot, now, self.voices.as_deref_mut());
        let mut dropped = 0usize;
        for marker in self.scheduler.drain_markers() {
            if self.markers.try_send(marker).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            trace!(dropped, "marker channel full");
        }
        self.publish();
    }

    fn publish(&self) {
        let (block, step) = self.scheduler.position();
        self.transport.store(Arc::new(TransportState {
            is_playing: self.scheduler.is_running(),
            bpm: self.session.load().bpm(),
            block,
            step,
            next_step_time: self.scheduler.next_event_time(),
            steps_scheduled: self.scheduler.steps_scheduled(),
        }));
    }
}
