//! Playback transport
//!
//! This module owns the transport state machine: Stopped, Playing, Paused,
//! and a current position tracked against the wall clock.
//!
//! ## Ownership
//!
//! All transport state lives behind one mutex, and only controller commands
//! mutate it. The output device streams asynchronously but communicates a
//! single fact back: whether the stream is still active. A small watcher
//! thread polls that flag and settles natural completion (stream drained on
//! its own) to Stopped with the position reset to the start. Readers take a
//! [`PlaybackSnapshot`] instead of touching fields, so a UI refresh can never
//! observe a half-applied command.
//!
//! The position is wall-clock derived: the device reports no precise cursor,
//! so `play` records a start instant and the position is the frozen time
//! plus elapsed. Drift stays within device scheduling latency, which is fine
//! at annotation granularity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::audio::{AudioTrack, DeviceError, OutputDevice};

use super::clock::{Clock, SystemClock};

/// How often the watcher checks the device for natural completion.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Seek target outside the track bounds
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("Position {position:.3}s is outside the track bounds [0, {duration:.3}s]")]
pub struct InvalidPositionError {
    pub position: f64,
    pub duration: f64,
}

/// Errors surfaced by transport commands
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No track loaded")]
    NoTrackLoaded,

    #[error(transparent)]
    InvalidPosition(#[from] InvalidPositionError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Consistent transport snapshot for readers.
///
/// While Playing, `position` includes the wall-clock time elapsed since the
/// stream started, clamped to the track duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub position: f64,
    pub duration: f64,
}

/// Transport state guarded by the controller mutex
struct Inner {
    device: Box<dyn OutputDevice>,
    track: Option<AudioTrack>,
    state: PlaybackState,
    current_time: f64,
    started_at: Option<Instant>,
}

impl Inner {
    /// Force Stopped, halting the device if anything was streaming.
    fn halt_to_stopped(&mut self) -> Result<(), DeviceError> {
        let halt = if self.state != PlaybackState::Stopped {
            self.device.stop()
        } else {
            Ok(())
        };
        self.state = PlaybackState::Stopped;
        self.started_at = None;
        halt
    }
}

/// Transport controller
pub struct PlaybackController {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
    shutdown: Arc<AtomicBool>,
    watcher: Option<thread::JoinHandle<()>>,
}

impl PlaybackController {
    /// Create a controller on the system clock with the default poll rate.
    pub fn new(device: Box<dyn OutputDevice>) -> Self {
        Self::with_clock(device, Arc::new(SystemClock), POLL_INTERVAL)
    }

    /// Create a controller with an injected clock and completion poll rate.
    pub fn with_clock(
        device: Box<dyn OutputDevice>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            device,
            track: None,
            state: PlaybackState::Stopped,
            current_time: 0.0,
            started_at: None,
        }));

        let shutdown = Arc::new(AtomicBool::new(false));
        let watcher_inner = Arc::clone(&inner);
        let watcher_shutdown = Arc::clone(&shutdown);

        let watcher = thread::spawn(move || {
            watch_completion(watcher_inner, watcher_shutdown, poll_interval)
        });

        Self {
            inner,
            clock,
            shutdown,
            watcher: Some(watcher),
        }
    }

    /// Make a track current, forcing a transition to Stopped first.
    ///
    /// Two tracks never stream concurrently: any active output is halted
    /// before the new track is installed. If halting the device fails the
    /// error is surfaced and the previous track stays current.
    pub fn load(&self, track: AudioTrack) -> Result<(), PlaybackError> {
        let mut inner = self.inner.lock().unwrap();
        let halt = inner.halt_to_stopped();
        inner.current_time = 0.0;
        halt?;

        log::info!(
            "Loaded track: {} ({:.2}s at {} Hz)",
            track.filename(),
            track.duration(),
            track.sample_rate()
        );
        inner.track = Some(track);
        Ok(())
    }

    /// Start or resume playback from the current position.
    ///
    /// A no-op while already Playing. On device failure the controller
    /// settles to Stopped and surfaces the error.
    pub fn play(&self) -> Result<(), PlaybackError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == PlaybackState::Playing {
            return Ok(());
        }

        let resuming = inner.state == PlaybackState::Paused;
        let (samples, sample_rate) = {
            let track = inner.track.as_ref().ok_or(PlaybackError::NoTrackLoaded)?;
            let offset = track.index_at(inner.current_time);
            (track.samples_from(offset), track.sample_rate())
        };

        if let Err(e) = inner.device.start(samples, sample_rate) {
            inner.state = PlaybackState::Stopped;
            inner.started_at = None;
            return Err(e.into());
        }

        inner.started_at = Some(self.clock.now());
        inner.state = PlaybackState::Playing;
        log::info!(
            "{} at {:.3}s",
            if resuming { "Resumed" } else { "Playing" },
            inner.current_time
        );
        Ok(())
    }

    /// Freeze playback at the elapsed position.
    ///
    /// From Stopped or Paused this is a benign no-op. The frozen position is
    /// the time accumulated before `play` plus the wall-clock time elapsed
    /// since, clamped to the track duration.
    pub fn pause(&self) -> Result<(), PlaybackError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != PlaybackState::Playing {
            return Ok(());
        }

        let halt = inner.device.stop();

        let now = self.clock.now();
        if let Some(started) = inner.started_at.take() {
            let elapsed = now.saturating_duration_since(started).as_secs_f64();
            let duration = inner.track.as_ref().map(|t| t.duration()).unwrap_or(0.0);
            inner.current_time = (inner.current_time + elapsed).min(duration);
        }

        match halt {
            Ok(()) => {
                inner.state = PlaybackState::Paused;
                log::info!("Paused at {:.3}s", inner.current_time);
                Ok(())
            }
            Err(e) => {
                inner.state = PlaybackState::Stopped;
                Err(e.into())
            }
        }
    }

    /// Move the position, halting playback.
    ///
    /// Valid from any state for `0 <= position <= duration`; out-of-range
    /// targets are rejected with the state untouched. Seeking always lands
    /// in Stopped - the caller re-issues `play` to resume from the new
    /// position.
    pub fn seek(&self, position: f64) -> Result<(), PlaybackError> {
        let mut inner = self.inner.lock().unwrap();
        let duration = inner
            .track
            .as_ref()
            .ok_or(PlaybackError::NoTrackLoaded)?
            .duration();
        if !(0.0..=duration).contains(&position) {
            return Err(InvalidPositionError { position, duration }.into());
        }

        let halt = inner.halt_to_stopped();
        inner.current_time = position;
        halt?;

        log::info!("Seek to {:.3}s", position);
        Ok(())
    }

    /// Halt playback and reset the position to the start.
    pub fn stop(&self) -> Result<(), PlaybackError> {
        let mut inner = self.inner.lock().unwrap();
        let halt = inner.halt_to_stopped();
        inner.current_time = 0.0;
        halt?;
        Ok(())
    }

    /// Consistent view of state, position and duration.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        let inner = self.inner.lock().unwrap();
        let duration = inner.track.as_ref().map(|t| t.duration()).unwrap_or(0.0);
        let position = match (inner.state, inner.started_at) {
            (PlaybackState::Playing, Some(started)) => {
                let elapsed = self
                    .clock
                    .now()
                    .saturating_duration_since(started)
                    .as_secs_f64();
                (inner.current_time + elapsed).min(duration)
            }
            _ => inner.current_time,
        };

        PlaybackSnapshot {
            state: inner.state,
            position,
            duration,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.lock().unwrap().state
    }

    pub fn position(&self) -> f64 {
        self.snapshot().position
    }

    /// Currently loaded track, if any. Cheap: the sample buffer is shared.
    pub fn track(&self) -> Option<AudioTrack> {
        self.inner.lock().unwrap().track.clone()
    }

    pub fn has_track(&self) -> bool {
        self.inner.lock().unwrap().track.is_some()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.join();
        }
    }
}

/// Watcher loop: settle natural completion within one poll interval.
fn watch_completion(
    inner: Arc<Mutex<Inner>>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    while !shutdown.load(Ordering::Relaxed) {
        {
            let mut inner = inner.lock().unwrap();
            if inner.state == PlaybackState::Playing && !inner.device.is_active() {
                // Stream drained on its own: back to the start
                inner.state = PlaybackState::Stopped;
                inner.current_time = 0.0;
                inner.started_at = None;
                log::info!("Playback finished");
            }
        }
        thread::sleep(poll_interval);
    }
}
