//! Analysis module - signal processing that proposes markers
//!
//! This module provides:
//! - Segment value type cut from a track
//! - Windowed peak detection with an autocorrelation pitch gate
//! - Per-path caching of detection results

mod detector;
mod segment;

pub use detector::{AutoMarkerDetector, DetectorParams};
pub use segment::Segment;
