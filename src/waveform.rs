//! Waveform display series
//!
//! Decimates a decoded track down to something a plot widget can draw at
//! interactive rates. Stride decimation keeps every n-th sample; it can skip
//! a true local extreme between kept samples, which is accepted for display
//! purposes.

use crate::audio::AudioTrack;

/// Default cap on plotted points.
pub const MAX_DISPLAY_POINTS: usize = 100_000;

/// Downsampled series ready for display.
///
/// `times[i]` is `i / effective_sample_rate`, so the series spans the same
/// duration as the source track.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySeries {
    pub times: Vec<f64>,
    pub amplitudes: Vec<f32>,
    pub effective_sample_rate: f64,
}

impl DisplaySeries {
    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }
}

/// Decimate a track to at most `max_points` samples.
///
/// Tracks within the cap pass through verbatim. Longer tracks keep every
/// stride-th sample, where the stride is the smallest that fits the cap,
/// and report the correspondingly reduced effective sample rate. The result
/// is deterministic for identical inputs.
pub fn render(track: &AudioTrack, max_points: usize) -> DisplaySeries {
    let samples = track.samples();
    let max_points = max_points.max(1);

    let stride = if samples.len() <= max_points {
        1
    } else {
        // Ceiling keeps the output within the cap when it does not divide
        // the length evenly
        samples.len().div_ceil(max_points)
    };

    let effective_sample_rate = track.sample_rate() as f64 / stride as f64;
    let amplitudes: Vec<f32> = samples.iter().step_by(stride).copied().collect();
    let times: Vec<f64> = (0..amplitudes.len())
        .map(|i| i as f64 / effective_sample_rate)
        .collect();

    log::debug!(
        "Rendered {} of {} samples (stride {})",
        amplitudes.len(),
        samples.len(),
        stride
    );

    DisplaySeries {
        times,
        amplitudes,
        effective_sample_rate,
    }
}
