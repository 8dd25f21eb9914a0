//! Audio annotation workstation core.
//!
//! Loads audio files, decimates their waveforms for display, plays them
//! through a transport state machine and places or auto-detects
//! time-stamped markers for later review.
//!
//! The crate splits into:
//! - [`audio`]: decoding, track data and device output
//! - [`playback`]: the transport controller and its clock
//! - [`analysis`]: the automatic marker detector
//! - [`markers`], [`waveform`], [`library`]: annotation state and display data
//! - [`session`]: the facade a front end drives

pub mod analysis;
pub mod audio;
pub mod library;
pub mod markers;
pub mod playback;
pub mod session;
pub mod settings;
pub mod waveform;

pub use analysis::{AutoMarkerDetector, DetectorParams, Segment};
pub use audio::{AudioTrack, CpalOutput, DecodeError, DeviceError, OutputDevice};
pub use library::AudioLibrary;
pub use markers::{Marker, MarkerStore};
pub use playback::{
    Clock, InvalidPositionError, ManualClock, PlaybackController, PlaybackError,
    PlaybackSnapshot, PlaybackState, SystemClock,
};
pub use session::{EventRow, Session, SessionError};
pub use settings::AppSettings;
pub use waveform::{DisplaySeries, MAX_DISPLAY_POINTS};
