use thiserror::Error;

/// Failure indicators for pattern editing. None of these leave the store modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("block index {index} out of range (block count {count})")]
    BlockOutOfRange { index: usize, count: usize },
    #[error("cannot move block {index} by {direction}: neighbour out of range")]
    MoveOutOfRange { index: usize, direction: isize },
    #[error("step {0} out of range")]
    StepOutOfRange(usize),
    #[error("drum channel {0} out of range")]
    ChannelOutOfRange(usize),
    #[error("unknown track '{0}'")]
    UnknownTrack(String),
    #[error("clipboard is empty")]
    EmptyClipboard,
}

/// Structural CSV import failures. Per-cell anomalies are skipped, not reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvError {
    #[error("expected at least 2 lines, found {0}")]
    TooFewLines(usize),
    #[error("header field is malformed: '{0}'")]
    MalformedHeader(String),
    #[error("invalid tempo '{0}'")]
    InvalidBpm(String),
    #[error("invalid total step count '{0}'")]
    InvalidStepCount(String),
}

/// Structural MIDI import failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MidiError {
    #[error("missing MThd header chunk")]
    BadHeader,
    #[error("file truncated at byte {0}")]
    Truncated(usize),
    #[error("expected MTrk chunk at byte {0}")]
    BadTrackChunk(usize),
}
