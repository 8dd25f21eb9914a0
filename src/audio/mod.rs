//! Audio module - decoding, track data and device output
//!
//! This module provides:
//! - Symphonia-backed decoding to a mono sample buffer
//! - Immutable decoded tracks shared across playback and analysis
//! - cpal output device behind the transport's device contract

pub mod decoder;
pub mod output;
mod track;

pub use decoder::DecodeError;
pub use output::{CpalOutput, DeviceError, OutputDevice};
pub use track::AudioTrack;
