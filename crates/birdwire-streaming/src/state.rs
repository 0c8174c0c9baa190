//! Stream state machine.
//!
//! | from \ request | start  | resume | pause | stop |
//! |----------------|--------|--------|-------|------|
//! | Stop           | Resume | Stop   | Stop  | Stop |
//! | Resume         | Resume | Resume | Pause | Stop |
//! | Pause          | Pause  | Resume | Pause | Stop |
//!
//! Stop only leaves through `start`, so a late resume cannot revive a stream
//! that is shutting down.

use std::fmt;

/// Lifecycle state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Reading lines.
    Resume,
    /// Connected, not reading the next line.
    Pause,
    /// Not running, or shutting down.
    #[default]
    Stop,
}

/// A requested state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A stream is starting.
    Start,
    /// Resume reading.
    Resume,
    /// Pause reading.
    Pause,
    /// Stop the stream.
    Stop,
}

impl StreamState {
    /// Apply a transition and return the resulting state.
    #[must_use]
    pub const fn apply(self, transition: Transition) -> Self {
        match (self, transition) {
            (_, Transition::Stop) => Self::Stop,
            (Self::Stop, Transition::Start) => Self::Resume,
            (Self::Stop, _) => Self::Stop,
            (Self::Resume | Self::Pause, Transition::Resume) => Self::Resume,
            (Self::Resume | Self::Pause, Transition::Pause) => Self::Pause,
            (state, Transition::Start) => state,
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resume => write!(f, "resume"),
            Self::Pause => write!(f, "pause"),
            Self::Stop => write!(f, "stop"),
        }
    }
}
