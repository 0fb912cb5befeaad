use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("audio clock is not available")]
    ClockUnavailable,
    #[error("playback is already running")]
    AlreadyRunning,
    #[error("player thread has shut down")]
    PlayerGone,
    #[error("offline render was cancelled")]
    RenderCancelled,
    #[error("no output device available")]
    NoOutputDevice,
    #[error("unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),
}
