//! Automatic marker detection
//!
//! Scans a track for loud events and keeps the tonal ones.
//!
//! ## Design
//!
//! The track is partitioned into fixed-length scan windows and each window
//! contributes at most one candidate: its loudest sample, gated by an
//! amplitude threshold derived from the whole track's standard deviation.
//! Each surviving candidate gets a short segment cut around it and an
//! autocorrelation pass estimates the local fundamental; candidates whose
//! fundamental falls below the frequency gate are dropped as broadband
//! noise rather than voiced events.
//!
//! The lag window searched by the autocorrelation is derived from the
//! sample rate and a pitch band, so the same parameters work across
//! differently-sampled material.
//!
//! Results are cached per track path. The cache is a single critical
//! section around check and insert; concurrent misses for one path may both
//! compute, and the first insert wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::audio::AudioTrack;
use crate::markers::Marker;

use super::segment::Segment;

/// Detector tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Scan window length in seconds; at most one candidate per window.
    pub interval: f64,
    /// Weight of the track's standard deviation in the amplitude gate.
    pub noise_factor: f64,
    /// Base of the amplitude gate, before the deviation term.
    pub base_amp_offset: f64,
    /// Candidates estimating a fundamental below this are dropped (Hz).
    pub freq_threshold: f64,
    /// Pitch band searched by the autocorrelation (Hz).
    pub pitch_min_hz: f64,
    pub pitch_max_hz: f64,
    /// Segments shorter than this estimate a fundamental of zero.
    pub min_segment_samples: usize,
    /// Half width of the analysis segment around a candidate (seconds).
    pub segment_half_width: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            interval: 5.0,
            noise_factor: 15.0,
            base_amp_offset: 0.05,
            freq_threshold: 90.0,
            pitch_min_hz: 90.0,
            pitch_max_hz: 300.0,
            min_segment_samples: 300,
            segment_half_width: 0.2,
        }
    }
}

/// Windowed peak detector with a per-path result cache.
pub struct AutoMarkerDetector {
    params: DetectorParams,
    cache: Mutex<HashMap<PathBuf, Arc<[Marker]>>>,
    computations: AtomicUsize,
}

impl AutoMarkerDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self {
            params,
            cache: Mutex::new(HashMap::new()),
            computations: AtomicUsize::new(0),
        }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Detect markers for a track, ascending by time.
    ///
    /// The first call for a path computes; later calls return the cached
    /// sequence until the entry is cleared.
    pub fn detect(&self, track: &AudioTrack) -> Arc<[Marker]> {
        if let Some(cached) = self.cache.lock().unwrap().get(track.path()).cloned() {
            return cached;
        }

        // Compute outside the lock so a slow track does not block hits
        let markers: Arc<[Marker]> = self.analyze(track).into();
        self.computations.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Detected {} markers in {}",
            markers.len(),
            track.filename()
        );

        let mut cache = self.cache.lock().unwrap();
        Arc::clone(
            cache
                .entry(track.path().to_path_buf())
                .or_insert(markers),
        )
    }

    /// Drop one path's cached result, or the whole cache.
    pub fn clear_cache(&self, path: Option<&Path>) {
        let mut cache = self.cache.lock().unwrap();
        match path {
            Some(p) => {
                cache.remove(p);
            }
            None => cache.clear(),
        }
    }

    /// How many full analyses have run (cache hits excluded).
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    fn analyze(&self, track: &AudioTrack) -> Vec<Marker> {
        let samples = track.samples();
        let rate = track.sample_rate();
        if samples.is_empty() || rate == 0 {
            return Vec::new();
        }

        let amp_threshold =
            self.params.base_amp_offset + std_dev(samples) * self.params.noise_factor;
        let window = ((self.params.interval * rate as f64) as usize).max(1);
        log::debug!(
            "Scanning {} in {} windows of {} samples, amplitude gate {:.4}",
            track.filename(),
            samples.len().div_ceil(window),
            window,
            amp_threshold
        );

        let mut markers = Vec::new();
        let mut start = 0;
        while start < samples.len() {
            let end = (start + window).min(samples.len());

            // One candidate per window: the loudest sample
            let mut peak_index = start;
            let mut peak = f32::NEG_INFINITY;
            for (i, &s) in samples[start..end].iter().enumerate() {
                if s > peak {
                    peak = s;
                    peak_index = start + i;
                }
            }

            if f64::from(peak) > amp_threshold {
                let time = peak_index as f64 / rate as f64;
                let segment = Segment::cut(track, peak_index, self.params.segment_half_width);
                let freq = self.fundamental(&segment);
                if freq >= self.params.freq_threshold {
                    markers.push(Marker {
                        time,
                        amplitude: peak,
                    });
                } else {
                    log::debug!(
                        "Rejected candidate at {:.3}s: {:.1} Hz below pitch gate",
                        time,
                        freq
                    );
                }
            }

            start = end;
        }
        markers
    }

    /// Estimate the fundamental frequency of a segment in Hz.
    ///
    /// Autocorrelation searched over the lag window of the pitch band.
    /// Too-short and silent segments estimate zero.
    fn fundamental(&self, segment: &Segment) -> f64 {
        // An empty segment can slip past a zeroed minimum from settings
        if segment.is_empty() || segment.len() < self.params.min_segment_samples {
            return 0.0;
        }

        let samples = segment.samples();
        let rate = segment.sample_rate() as f64;
        let lag_min = ((rate / self.params.pitch_max_hz).round() as usize).max(1);
        let lag_max =
            ((rate / self.params.pitch_min_hz).round() as usize).min(samples.len() - 1);
        if lag_min > lag_max {
            return 0.0;
        }

        let energy: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
        if energy == 0.0 {
            return 0.0;
        }

        // The zero-lag energy bounds every other lag, so scaling by it
        // cannot move the argmax; raw products are compared directly.
        let mut best_lag = lag_min;
        let mut best = f64::NEG_INFINITY;
        for lag in lag_min..=lag_max {
            let r: f64 = samples[..samples.len() - lag]
                .iter()
                .zip(&samples[lag..])
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum();
            if r > best {
                best = r;
                best_lag = lag;
            }
        }

        rate / best_lag as f64
    }
}

impl Default for AutoMarkerDetector {
    fn default() -> Self {
        Self::new(DetectorParams::default())
    }
}

/// Population standard deviation, accumulated in f64.
fn std_dev(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
    let variance = samples
        .iter()
        .map(|&s| {
            let d = f64::from(s) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}
