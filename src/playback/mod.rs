//! Playback module - transport state machine and time keeping
//!
//! This module provides:
//! - Transport controller (play, pause, seek, stop)
//! - Wall-clock position tracking with an injectable clock

mod clock;
mod controller;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{
    InvalidPositionError, PlaybackController, PlaybackError, PlaybackSnapshot, PlaybackState,
};
