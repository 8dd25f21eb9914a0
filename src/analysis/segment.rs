//! Sample segment
//!
//! An owned run of samples cut out of a track around a point of interest,
//! carrying its own position and rate so the analysis pipeline can pass it
//! around as a plain value.

use crate::audio::AudioTrack;

/// Immutable slice of a track with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    samples: Vec<f32>,
    start: usize,
    sample_rate: u32,
}

impl Segment {
    /// Cut `[center - half_width, center + half_width]` seconds around the
    /// given sample index, clamped to the track bounds. Near the edges the
    /// segment shrinks rather than padding.
    pub fn cut(track: &AudioTrack, center: usize, half_width: f64) -> Self {
        let sample_rate = track.sample_rate();
        let half = (half_width.max(0.0) * sample_rate as f64).round() as usize;
        let start = center.saturating_sub(half);
        let end = center.saturating_add(half).min(track.len());
        Self {
            samples: track.samples()[start.min(end)..end].to_vec(),
            start,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Time of the segment's first sample in the source track.
    pub fn start_time(&self) -> f64 {
        self.seconds(self.start)
    }

    pub fn duration(&self) -> f64 {
        self.seconds(self.samples.len())
    }

    /// Source-track time of the sample at `index` within the segment.
    pub fn time_at(&self, index: usize) -> f64 {
        self.seconds(self.start + index)
    }

    /// Time axis aligned with `samples`.
    pub fn times(&self) -> Vec<f64> {
        (0..self.samples.len()).map(|i| self.time_at(i)).collect()
    }

    fn seconds(&self, samples: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        samples as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(len: usize, rate: u32) -> AudioTrack {
        let samples: Vec<f32> = (0..len).map(|i| i as f32).collect();
        AudioTrack::new("/tmp/ramp.wav", samples, rate)
    }

    #[test]
    fn test_cut_mid_track() {
        let t = track(10_000, 1000);
        let seg = Segment::cut(&t, 5000, 0.2);

        assert_eq!(seg.len(), 400);
        assert_eq!(seg.samples()[0], 4800.0);
        assert!((seg.start_time() - 4.8).abs() < 1e-9);
        assert!((seg.duration() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_cut_clamps_at_track_start() {
        let t = track(10_000, 1000);
        let seg = Segment::cut(&t, 50, 0.2);

        // Shrinks to [0, center + half]
        assert_eq!(seg.len(), 250);
        assert_eq!(seg.samples()[0], 0.0);
        assert!((seg.start_time() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_clamps_at_track_end() {
        let t = track(10_000, 1000);
        let seg = Segment::cut(&t, 9950, 0.2);

        assert_eq!(seg.len(), 250);
        assert_eq!(seg.samples()[0], 9750.0);
    }

    #[test]
    fn test_time_axis_matches_source_track() {
        let t = track(10_000, 1000);
        let seg = Segment::cut(&t, 5000, 0.1);

        let times = seg.times();
        assert_eq!(times.len(), seg.len());
        assert!((times[0] - seg.start_time()).abs() < 1e-9);
        assert!((seg.time_at(100) - (seg.start_time() + 0.1)).abs() < 1e-9);
    }
}
