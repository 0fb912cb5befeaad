pub mod clock;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod factory;
pub mod handle;
pub mod mixer;
pub mod offline;
pub mod percussion;
pub mod player;
pub mod scheduler;
pub mod synth;
pub mod tick;
pub mod transport;
pub mod voice;

// Re-exports
pub use clock::{AudioClock, ManualClock, SampleClock};
pub use commands::VoiceCommand;
pub use config::EngineConfig;
pub use engine::{AudioEngine, ChannelDispatch};
pub use error::EngineError;
pub use handle::SessionHandle;
pub use offline::{OfflineRenderer, RenderOutput};
pub use player::Player;
pub use scheduler::{Scheduler, SchedulerConfig, StepMarker};
pub use tick::{IntervalTicker, ManualTicker, TickSource};
pub use transport::TransportState;
pub use voice::{RecordingDispatch, VoiceDispatch, VoiceEvent};
