//! Decoded audio track
//!
//! An `AudioTrack` is the immutable result of decoding one file: a mono
//! sample buffer plus its sample rate. The samples live behind an `Arc`
//! so the playback worker, the detector and the renderer can all hold
//! the same buffer without copying it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A fully decoded audio file.
///
/// Duration is always derived from the buffer length, so
/// `duration == len / sample_rate` holds by construction.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    path: PathBuf,
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioTrack {
    pub fn new(path: impl Into<PathBuf>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            path: path.into(),
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name portion of the path, for display.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("Unknown")
            .to_string()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Track length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Track length as a `Duration`, for display.
    pub fn duration_time(&self) -> Duration {
        Duration::from_secs_f64(self.duration())
    }

    /// Sample index nearest to a time position, clamped to the buffer.
    pub fn index_at(&self, time: f64) -> usize {
        let index = (time.max(0.0) * self.sample_rate as f64).round() as usize;
        index.min(self.samples.len())
    }

    /// Sample value at the index nearest to a time position.
    ///
    /// Returns 0.0 past the end of the buffer.
    pub fn amplitude_at(&self, time: f64) -> f32 {
        self.samples.get(self.index_at(time)).copied().unwrap_or(0.0)
    }

    /// Remaining samples from a start index, as a fresh shared buffer.
    ///
    /// This is what the output device receives on `play`: the tail of the
    /// track from the current position onward.
    pub fn samples_from(&self, index: usize) -> Arc<[f32]> {
        let start = index.min(self.samples.len());
        self.samples[start..].into()
    }
}
