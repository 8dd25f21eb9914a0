//! Audio file decoding
//!
//! This module turns a file on disk into an [`AudioTrack`] using symphonia.
//! Multi-channel sources are folded to mono by averaging the channels, since
//! annotation works on a single amplitude series.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::track::AudioTrack;

/// File extensions accepted for decoding, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg"];

/// Errors that can occur while decoding an audio file
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),

    #[error("Failed to probe audio format: {0}")]
    Probe(String),

    #[error("No audio tracks found")]
    NoTracks,

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("No audio frames decoded")]
    NoFrames,
}

/// Whether a path carries one of the supported audio extensions.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode an audio file into a mono track.
///
/// Fails without partial state: either the whole file decodes or the caller
/// gets a [`DecodeError`] and no track.
pub fn decode(path: impl AsRef<Path>) -> Result<AudioTrack, DecodeError> {
    let path = path.as_ref();

    if !is_supported(path) {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("<none>")
            .to_string();
        return Err(DecodeError::UnsupportedExtension(ext));
    }

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint the probe with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    // First track with a real codec
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTracks)?;

    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decoder(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of file
                break;
            }
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => extract_mono(&decoded, &mut samples),
            // Skip damaged packets, keep decoding
            Err(_) => continue,
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::NoFrames);
    }

    let track = AudioTrack::new(path, samples, sample_rate);
    log::info!(
        "Decoded {:?}: {:.2}s at {} Hz ({} samples)",
        path,
        track.duration(),
        track.sample_rate(),
        track.len()
    );

    Ok(track)
}

/// Append mono samples from a decoded buffer, averaging the channels.
fn extract_mono(buffer: &AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match buffer {
        AudioBufferRef::F32(buf) => {
            let channels = buf.spec().channels.count();
            let frames = buf.frames();

            for frame in 0..frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += buf.chan(ch)[frame];
                }
                out.push(sum / channels as f32);
            }
        }
        AudioBufferRef::S16(buf) => {
            let channels = buf.spec().channels.count();
            let frames = buf.frames();

            for frame in 0..frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += buf.chan(ch)[frame] as f32 / 32768.0;
                }
                out.push(sum / channels as f32);
            }
        }
        AudioBufferRef::S32(buf) => {
            let channels = buf.spec().channels.count();
            let frames = buf.frames();

            for frame in 0..frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += buf.chan(ch)[frame] as f32 / 2147483648.0;
                }
                out.push(sum / channels as f32);
            }
        }
        _ => {}
    }
}
