//! Annotation session
//!
//! Facade a front end drives: a file library, the playback transport, the
//! marker store and the detector behind one API. The session keeps the
//! pieces consistent - selecting a file decodes it, loads the transport
//! and, when auto analysis is on, merges detected markers into the store.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analysis::{AutoMarkerDetector, DetectorParams};
use crate::audio::{decoder, DecodeError, OutputDevice};
use crate::library::AudioLibrary;
use crate::markers::{Marker, MarkerStore};
use crate::playback::{PlaybackController, PlaybackError, PlaybackSnapshot};
use crate::settings::AppSettings;
use crate::waveform::{self, DisplaySeries};

/// Errors surfaced by session commands
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    #[error("No file selected")]
    NoSelection,

    #[error("Library is empty")]
    EmptyLibrary,
}

/// One row of the event table shown by a front end.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub index: usize,
    pub time: f64,
    pub amplitude: f32,
    pub label: String,
    pub file: String,
}

/// Coordinates the library, transport, markers and detector.
pub struct Session {
    library: AudioLibrary,
    store: MarkerStore,
    detector: AutoMarkerDetector,
    controller: PlaybackController,
    selected: Option<PathBuf>,
    auto_analysis: bool,
    max_display_points: usize,
}

impl Session {
    pub fn new(device: Box<dyn OutputDevice>, settings: &AppSettings) -> Self {
        Self::with_controller(PlaybackController::new(device), settings)
    }

    /// Build a session around an existing transport controller.
    pub fn with_controller(controller: PlaybackController, settings: &AppSettings) -> Self {
        Self {
            library: AudioLibrary::new(),
            store: MarkerStore::new(),
            detector: AutoMarkerDetector::new(settings.detector.clone()),
            controller,
            selected: None,
            auto_analysis: settings.auto_analysis,
            max_display_points: settings.max_display_points,
        }
    }

    pub fn add_files<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.library.add_paths(paths)
    }

    pub fn library(&self) -> &AudioLibrary {
        &self.library
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selected.as_deref()
    }

    /// Make a file current: decode it, load the transport and, when auto
    /// analysis is on, merge detected markers into the store.
    ///
    /// Re-selecting the current file is a no-op that preserves the playback
    /// position. On decode failure the previous selection stays current.
    pub fn select(&mut self, path: &Path) -> Result<(), SessionError> {
        if self.selected.as_deref() == Some(path) {
            log::debug!("Already selected: {}", path.display());
            return Ok(());
        }

        let track = decoder::decode(path)?;
        self.controller.load(track.clone())?;
        self.selected = Some(track.path().to_path_buf());

        if self.auto_analysis {
            self.run_detection()?;
        }
        Ok(())
    }

    /// Select the library file after the current one, wrapping at the end.
    pub fn next_track(&mut self) -> Result<(), SessionError> {
        let current = self.selected.clone().unwrap_or_default();
        let next = self
            .library
            .next_after(&current)
            .ok_or(SessionError::EmptyLibrary)?
            .to_path_buf();
        self.select(&next)
    }

    /// Select the library file before the current one, wrapping at the start.
    pub fn previous_track(&mut self) -> Result<(), SessionError> {
        let current = self.selected.clone().unwrap_or_default();
        let previous = self
            .library
            .previous_before(&current)
            .ok_or(SessionError::EmptyLibrary)?
            .to_path_buf();
        self.select(&previous)
    }

    // Transport

    pub fn play(&self) -> Result<(), SessionError> {
        self.controller.play()?;
        Ok(())
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        self.controller.pause()?;
        Ok(())
    }

    pub fn seek(&self, position: f64) -> Result<(), SessionError> {
        self.controller.seek(position)?;
        Ok(())
    }

    pub fn stop(&self) -> Result<(), SessionError> {
        self.controller.stop()?;
        Ok(())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.controller.snapshot()
    }

    // Markers

    /// Drop a marker at the current playback position.
    pub fn place_marker(&mut self) -> Result<bool, SessionError> {
        self.place_marker_at(self.controller.position())
    }

    /// Drop a marker at `time`, with the amplitude sampled from the track.
    ///
    /// Out-of-range times clamp to the track bounds so every stored marker
    /// stays inside `[0, duration]`; a non-finite time places nothing.
    /// Returns false when a marker at exactly that time already exists.
    pub fn place_marker_at(&mut self, time: f64) -> Result<bool, SessionError> {
        let track = self.controller.track().ok_or(SessionError::NoSelection)?;
        if !time.is_finite() {
            return Ok(false);
        }
        let time = time.clamp(0.0, track.duration());
        let amplitude = track.amplitude_at(time);
        Ok(self.store.add(track.path(), time, amplitude))
    }

    /// Remove markers of the selected file by their event table indices.
    pub fn remove_markers(&mut self, indices: &[usize]) -> Result<usize, SessionError> {
        let path = self.selected.as_deref().ok_or(SessionError::NoSelection)?;
        Ok(self.store.remove(path, indices))
    }

    /// Drop all markers of the selected file.
    pub fn clear_markers(&mut self) -> Result<(), SessionError> {
        let path = self.selected.as_deref().ok_or(SessionError::NoSelection)?;
        self.store.clear(Some(path));
        Ok(())
    }

    /// Markers of the selected file, ascending by time.
    pub fn markers(&self) -> &[Marker] {
        match &self.selected {
            Some(path) => self.store.markers(path),
            None => &[],
        }
    }

    /// Event table rows for the selected file.
    pub fn event_rows(&self) -> Vec<EventRow> {
        let Some(path) = self.selected.as_deref() else {
            return Vec::new();
        };
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.store
            .markers(path)
            .iter()
            .enumerate()
            .map(|(index, m)| EventRow {
                index,
                time: m.time,
                amplitude: m.amplitude,
                label: format!("Event at {:.3}s", m.time),
                file: file.clone(),
            })
            .collect()
    }

    // Analysis

    /// Run detection for the selected track and merge the results into the
    /// store. Returns how many markers were newly added.
    pub fn run_detection(&mut self) -> Result<usize, SessionError> {
        let track = self.controller.track().ok_or(SessionError::NoSelection)?;
        let markers = self.detector.detect(&track);

        let mut merged = 0;
        for m in markers.iter() {
            if self.store.add(track.path(), m.time, m.amplitude) {
                merged += 1;
            }
        }
        Ok(merged)
    }

    /// Enable or disable auto analysis. Turning it on runs detection for
    /// the selected track immediately.
    pub fn set_auto_analysis(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.auto_analysis = enabled;
        if enabled && self.controller.track().is_some() {
            self.run_detection()?;
        }
        Ok(())
    }

    pub fn toggle_auto_analysis(&mut self) -> Result<bool, SessionError> {
        self.set_auto_analysis(!self.auto_analysis)?;
        Ok(self.auto_analysis)
    }

    pub fn auto_analysis(&self) -> bool {
        self.auto_analysis
    }

    pub fn detector_params(&self) -> &DetectorParams {
        self.detector.params()
    }

    // Display

    /// Display series for the selected track, decimated to the session's
    /// point cap.
    pub fn waveform(&self) -> Option<DisplaySeries> {
        self.controller
            .track()
            .map(|track| waveform::render(&track, self.max_display_points))
    }

    pub fn max_display_points(&self) -> usize {
        self.max_display_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::fake::FakeDevice;
    use crate::playback::{ManualClock, PlaybackState};
    use std::f64::consts::PI;
    use std::sync::Arc;
    use std::time::Duration;

    const RATE: u32 = 8000;

    fn write_wav(dir: &Path, name: &str, samples: &[f32]) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    /// 10s of silence with a 200 Hz burst at 2.0s.
    fn burst_samples() -> Vec<f32> {
        let mut samples = vec![0.0f32; 10 * RATE as usize];
        let begin = 2 * RATE as usize;
        for i in 0..(0.05 * RATE as f64) as usize {
            let t = i as f64 / RATE as f64;
            samples[begin + i] = (0.8 * (2.0 * PI * 200.0 * t).sin()) as f32;
        }
        samples
    }

    fn silence(seconds: f64) -> Vec<f32> {
        vec![0.0f32; (seconds * RATE as f64) as usize]
    }

    fn session_with(settings: &AppSettings) -> (Session, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let controller = PlaybackController::with_clock(
            Box::new(FakeDevice::new()),
            clock.clone(),
            Duration::from_millis(5),
        );
        (Session::with_controller(controller, settings), clock)
    }

    #[test]
    fn test_select_decodes_and_auto_detects() {
        let dir = tempfile::tempdir().unwrap();
        let clip = write_wav(dir.path(), "clip.wav", &burst_samples());

        let settings = AppSettings {
            auto_analysis: true,
            ..AppSettings::default()
        };
        let (mut session, _) = session_with(&settings);

        assert_eq!(session.add_files([clip]), 1);
        let path = session.library().files()[0].clone();
        session.select(&path).unwrap();

        assert_eq!(session.selected_path(), Some(path.as_path()));
        assert!((session.snapshot().duration - 10.0).abs() < 1e-6);

        let rows = session.event_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 0);
        assert!((rows[0].time - 2.0).abs() < 0.1);
        assert!(rows[0].label.starts_with("Event at 2.0"));
        assert_eq!(rows[0].file, "clip.wav");
        assert!(session.markers()[0].amplitude > 0.7);
    }

    #[test]
    fn test_reselect_same_file_preserves_position() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wav(dir.path(), "a.wav", &silence(10.0));
        let b = write_wav(dir.path(), "b.wav", &silence(2.0));

        let (mut session, clock) = session_with(&AppSettings::default());
        session.add_files([&a, &b]);
        let files: Vec<PathBuf> = session.library().files().to_vec();

        session.select(&files[0]).unwrap();
        session.play().unwrap();
        clock.advance(Duration::from_secs(1));
        session.pause().unwrap();

        session.select(&files[0]).unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.state, PlaybackState::Paused);
        assert!((snap.position - 1.0).abs() < 1e-9);

        // A different file starts over
        session.select(&files[1]).unwrap();
        let snap = session.snapshot();
        assert_eq!(snap.state, PlaybackState::Stopped);
        assert!((snap.position - 0.0).abs() < 1e-9);
        assert!((snap.duration - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_detection_is_cached_across_reselects() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wav(dir.path(), "a.wav", &burst_samples());
        let b = write_wav(dir.path(), "b.wav", &silence(2.0));

        let settings = AppSettings {
            auto_analysis: true,
            ..AppSettings::default()
        };
        let (mut session, _) = session_with(&settings);
        session.add_files([&a, &b]);
        let files: Vec<PathBuf> = session.library().files().to_vec();

        session.select(&files[0]).unwrap();
        session.select(&files[1]).unwrap();
        assert_eq!(session.detector.computations(), 2);

        session.select(&files[0]).unwrap();
        assert_eq!(session.detector.computations(), 2);
    }

    #[test]
    fn test_place_and_remove_markers() {
        let dir = tempfile::tempdir().unwrap();
        let clip = write_wav(dir.path(), "clip.wav", &silence(10.0));

        let (mut session, _) = session_with(&AppSettings::default());
        session.add_files([&clip]);
        let path = session.library().files()[0].clone();
        session.select(&path).unwrap();

        session.seek(3.0).unwrap();
        assert!(session.place_marker().unwrap());
        assert!(!session.place_marker().unwrap());
        assert!(session.place_marker_at(1.0).unwrap());

        let rows = session.event_rows();
        assert_eq!(rows.len(), 2);
        assert!((rows[0].time - 1.0).abs() < 1e-9);
        assert!((rows[1].time - 3.0).abs() < 1e-9);
        assert!(rows[1].amplitude.abs() < 1e-3);

        assert_eq!(session.remove_markers(&[0]).unwrap(), 1);
        let rows = session.event_rows();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].time - 3.0).abs() < 1e-9);

        session.clear_markers().unwrap();
        assert!(session.event_rows().is_empty());
    }

    #[test]
    fn test_place_marker_at_clamps_to_track_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let clip = write_wav(dir.path(), "clip.wav", &silence(1.0));

        let (mut session, _) = session_with(&AppSettings::default());
        session.add_files([&clip]);
        let path = session.library().files()[0].clone();
        session.select(&path).unwrap();

        assert!(session.place_marker_at(999.0).unwrap());
        assert!(session.place_marker_at(-5.0).unwrap());
        assert!(!session.place_marker_at(f64::NAN).unwrap());

        let duration = session.snapshot().duration;
        let times: Vec<f64> = session.markers().iter().map(|m| m.time).collect();
        assert_eq!(times.len(), 2);
        assert!((times[0] - 0.0).abs() < 1e-9);
        assert!((times[1] - duration).abs() < 1e-9);

        // Every stored marker is a valid seek target
        for time in times {
            session.seek(time).unwrap();
        }
    }

    #[test]
    fn test_marker_commands_require_selection() {
        let (mut session, _) = session_with(&AppSettings::default());
        assert!(matches!(
            session.place_marker_at(1.0),
            Err(SessionError::NoSelection)
        ));
        assert!(matches!(
            session.remove_markers(&[0]),
            Err(SessionError::NoSelection)
        ));
        assert!(matches!(
            session.run_detection(),
            Err(SessionError::NoSelection)
        ));
    }

    #[test]
    fn test_next_and_previous_track_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_wav(dir.path(), "a.wav", &silence(0.5));
        let b = write_wav(dir.path(), "b.wav", &silence(0.5));
        let c = write_wav(dir.path(), "c.wav", &silence(0.5));

        let (mut session, _) = session_with(&AppSettings::default());
        session.add_files([&a, &b, &c]);
        let files: Vec<PathBuf> = session.library().files().to_vec();

        session.next_track().unwrap();
        assert_eq!(session.selected_path(), Some(files[0].as_path()));
        session.next_track().unwrap();
        assert_eq!(session.selected_path(), Some(files[1].as_path()));
        session.next_track().unwrap();
        session.next_track().unwrap();
        assert_eq!(session.selected_path(), Some(files[0].as_path()));

        session.previous_track().unwrap();
        assert_eq!(session.selected_path(), Some(files[2].as_path()));
    }

    #[test]
    fn test_next_track_on_empty_library() {
        let (mut session, _) = session_with(&AppSettings::default());
        assert!(matches!(
            session.next_track(),
            Err(SessionError::EmptyLibrary)
        ));
    }

    #[test]
    fn test_toggle_auto_analysis_runs_detection() {
        let dir = tempfile::tempdir().unwrap();
        let clip = write_wav(dir.path(), "clip.wav", &burst_samples());

        let (mut session, _) = session_with(&AppSettings::default());
        session.add_files([&clip]);
        let path = session.library().files()[0].clone();
        session.select(&path).unwrap();
        assert!(session.event_rows().is_empty());

        assert!(session.toggle_auto_analysis().unwrap());
        assert_eq!(session.event_rows().len(), 1);

        // Turning it off keeps the accepted markers
        assert!(!session.toggle_auto_analysis().unwrap());
        assert_eq!(session.event_rows().len(), 1);
    }

    #[test]
    fn test_waveform_respects_display_cap() {
        let dir = tempfile::tempdir().unwrap();
        let clip = write_wav(dir.path(), "clip.wav", &silence(10.0));

        let settings = AppSettings {
            max_display_points: 1000,
            ..AppSettings::default()
        };
        let (mut session, _) = session_with(&settings);
        assert!(session.waveform().is_none());

        session.add_files([&clip]);
        let path = session.library().files()[0].clone();
        session.select(&path).unwrap();

        let series = session.waveform().unwrap();
        assert_eq!(series.len(), 1000);
        assert_eq!(series.effective_sample_rate, 100.0);
    }

    #[test]
    fn test_transport_errors_surface() {
        let (session, _) = session_with(&AppSettings::default());
        assert!(matches!(
            session.play(),
            Err(SessionError::Playback(PlaybackError::NoTrackLoaded))
        ));
    }
}
