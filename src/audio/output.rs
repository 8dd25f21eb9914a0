//! Audio output device
//!
//! This module defines the output contract the transport layer drives
//! ([`OutputDevice`]) and its cpal implementation.
//!
//! ## Threading
//!
//! `cpal::Stream` is not `Send`, but the transport controller is shared
//! across threads. [`CpalOutput`] therefore keeps the stream on a dedicated
//! worker thread and talks to it over a command channel; every command
//! carries a reply sender so start/stop report their outcome synchronously.
//!
//! The stream callback owns the sample buffer and steps through it with a
//! cursor. When the cursor passes the end of the buffer the callback clears
//! the shared `active` flag - that flag is the device's only externally
//! observable state, polled by the controller to detect natural completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

/// Errors that can occur when driving an output device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No output device available")]
    NoDevice,

    #[error("Failed to get output config: {0}")]
    Config(String),

    #[error("Failed to build output stream: {0}")]
    BuildStream(String),

    #[error("Failed to start output stream: {0}")]
    PlayStream(String),

    #[error("Failed to stop output stream: {0}")]
    StopStream(String),

    #[error("Output worker is gone")]
    WorkerGone,
}

/// Asynchronous audio sink consumed by the playback controller.
///
/// `start` receives the samples remaining from the playback position and
/// plays them to completion unless `stop` intervenes. `is_active` must flip
/// to `false` on its own once the buffer has drained.
pub trait OutputDevice: Send {
    fn start(&mut self, samples: Arc<[f32]>, sample_rate: u32) -> Result<(), DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError>;

    fn is_active(&self) -> bool;
}

/// Commands handled by the stream worker thread
enum WorkerCmd {
    Start {
        samples: Arc<[f32]>,
        sample_rate: u32,
        reply: mpsc::Sender<Result<(), DeviceError>>,
    },
    Stop {
        reply: mpsc::Sender<Result<(), DeviceError>>,
    },
    Shutdown,
}

/// cpal-backed output device.
///
/// Mono samples are duplicated across all device channels. If the device
/// cannot run at the track's sample rate the callback steps through the
/// source at a fractional ratio instead (nearest neighbor).
pub struct CpalOutput {
    cmd_tx: mpsc::Sender<WorkerCmd>,
    active: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CpalOutput {
    /// Spawn the stream worker. No device is opened until `start`.
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(false));
        let worker_active = Arc::clone(&active);

        let worker = thread::spawn(move || worker_loop(cmd_rx, worker_active));

        Self {
            cmd_tx,
            active,
            worker: Some(worker),
        }
    }

    fn request(
        &self,
        make: impl FnOnce(mpsc::Sender<Result<(), DeviceError>>) -> WorkerCmd,
    ) -> Result<(), DeviceError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(make(reply_tx))
            .map_err(|_| DeviceError::WorkerGone)?;
        reply_rx.recv().map_err(|_| DeviceError::WorkerGone)?
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for CpalOutput {
    fn start(&mut self, samples: Arc<[f32]>, sample_rate: u32) -> Result<(), DeviceError> {
        self.request(|reply| WorkerCmd::Start {
            samples,
            sample_rate,
            reply,
        })
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.request(|reply| WorkerCmd::Stop { reply })
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WorkerCmd::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Worker loop: owns the non-Send stream, executes commands until shutdown.
fn worker_loop(cmd_rx: mpsc::Receiver<WorkerCmd>, active: Arc<AtomicBool>) {
    let mut stream: Option<cpal::Stream> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            WorkerCmd::Start {
                samples,
                sample_rate,
                reply,
            } => {
                halt(&mut stream, &active);

                let outcome = match build_stream(samples, sample_rate, Arc::clone(&active)) {
                    Ok(s) => {
                        // Set before play: the callback may finish a short
                        // buffer immediately, and it only ever clears the flag
                        active.store(true, Ordering::Relaxed);
                        match s.play() {
                            Ok(()) => {
                                stream = Some(s);
                                Ok(())
                            }
                            Err(e) => {
                                active.store(false, Ordering::Relaxed);
                                Err(DeviceError::PlayStream(e.to_string()))
                            }
                        }
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(outcome);
            }
            WorkerCmd::Stop { reply } => {
                halt(&mut stream, &active);
                let _ = reply.send(Ok(()));
            }
            WorkerCmd::Shutdown => break,
        }
    }

    halt(&mut stream, &active);
}

/// Pause and drop the current stream, clearing the active flag.
fn halt(stream: &mut Option<cpal::Stream>, active: &AtomicBool) {
    if let Some(s) = stream.take() {
        if let Err(e) = s.pause() {
            log::warn!("Failed to pause output stream: {}", e);
        }
        drop(s);
    }
    active.store(false, Ordering::Relaxed);
}

fn build_stream(
    samples: Arc<[f32]>,
    sample_rate: u32,
    active: Arc<AtomicBool>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;

    let config = best_config(&device, sample_rate)?;
    log::info!(
        "Output: {} at {} Hz ({:?})",
        device.name().unwrap_or_else(|_| "Unknown".to_string()),
        config.sample_rate().0,
        config.sample_format()
    );

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream_for::<f32>(&device, &config.into(), samples, sample_rate, active)
        }
        cpal::SampleFormat::I16 => {
            build_stream_for::<i16>(&device, &config.into(), samples, sample_rate, active)
        }
        cpal::SampleFormat::U16 => {
            build_stream_for::<u16>(&device, &config.into(), samples, sample_rate, active)
        }
        format => Err(DeviceError::Config(format!(
            "Unsupported sample format: {:?}",
            format
        ))),
    }
}

/// Pick an output config, preferring one that runs at the track's own rate.
fn best_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig, DeviceError> {
    if let Ok(configs) = device.supported_output_configs() {
        for range in configs {
            if range.min_sample_rate().0 <= sample_rate && sample_rate <= range.max_sample_rate().0
            {
                return Ok(range.with_sample_rate(cpal::SampleRate(sample_rate)));
            }
        }
    }

    device
        .default_output_config()
        .map_err(|e| DeviceError::Config(e.to_string()))
}

fn build_stream_for<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<[f32]>,
    sample_rate: u32,
    active: Arc<AtomicBool>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    // Source samples consumed per device frame
    let step = sample_rate as f64 / config.sample_rate.0 as f64;
    let error_active = Arc::clone(&active);
    let mut cursor = 0.0f64;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let value = samples.get(cursor as usize).copied().unwrap_or(0.0);
                    let converted = T::from_sample(value);
                    for ch in frame.iter_mut() {
                        *ch = converted;
                    }
                    cursor += step;
                }
                if cursor as usize >= samples.len() {
                    active.store(false, Ordering::Relaxed);
                }
            },
            move |err| {
                log::error!("Audio output error: {}", err);
                // A failed stream reports as finished
                error_active.store(false, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| DeviceError::BuildStream(e.to_string()))
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted output device for transport tests. No hardware: the test
    //! observes start/stop calls and flips `active` to simulate the stream
    //! finishing on its own.

    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{DeviceError, OutputDevice};

    #[derive(Default)]
    pub(crate) struct FakeState {
        active: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        last_len: AtomicUsize,
        last_rate: AtomicU32,
    }

    impl FakeState {
        /// Simulate the stream draining its buffer.
        pub fn finish_stream(&self) {
            self.active.store(false, Ordering::Relaxed);
        }

        pub fn is_active(&self) -> bool {
            self.active.load(Ordering::Relaxed)
        }

        pub fn start_count(&self) -> usize {
            self.starts.load(Ordering::Relaxed)
        }

        pub fn stop_count(&self) -> usize {
            self.stops.load(Ordering::Relaxed)
        }

        pub fn last_len(&self) -> usize {
            self.last_len.load(Ordering::Relaxed)
        }

        pub fn last_rate(&self) -> u32 {
            self.last_rate.load(Ordering::Relaxed)
        }
    }

    pub(crate) struct FakeDevice {
        state: Arc<FakeState>,
        pub fail_start: bool,
        pub fail_stop: bool,
    }

    impl FakeDevice {
        pub fn new() -> Self {
            Self {
                state: Arc::new(FakeState::default()),
                fail_start: false,
                fail_stop: false,
            }
        }

        /// Shared handle for scripting and assertions after the device has
        /// been boxed away.
        pub fn state(&self) -> Arc<FakeState> {
            Arc::clone(&self.state)
        }
    }

    impl OutputDevice for FakeDevice {
        fn start(&mut self, samples: Arc<[f32]>, sample_rate: u32) -> Result<(), DeviceError> {
            if self.fail_start {
                return Err(DeviceError::PlayStream("scripted failure".to_string()));
            }
            self.state.starts.fetch_add(1, Ordering::Relaxed);
            self.state.last_len.store(samples.len(), Ordering::Relaxed);
            self.state.last_rate.store(sample_rate, Ordering::Relaxed);
            self.state.active.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), DeviceError> {
            if self.fail_stop {
                return Err(DeviceError::StopStream("scripted failure".to_string()));
            }
            self.state.stops.fetch_add(1, Ordering::Relaxed);
            self.state.active.store(false, Ordering::Relaxed);
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.state.active.load(Ordering::Relaxed)
        }
    }
}
