//! wavemark - audio annotation workstation core
//!
//! Command line front end over the library: inspect files, summarize
//! waveforms, run marker detection and play audio to the default output.

use std::env;
use std::error::Error;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use wavemark::analysis::AutoMarkerDetector;
use wavemark::audio::{decoder, CpalOutput};
use wavemark::playback::PlaybackState;
use wavemark::session::Session;
use wavemark::settings::AppSettings;
use wavemark::waveform;

fn main() {
    env_logger::init();
    log::info!("Starting wavemark");

    let args: Vec<String> = env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let (command, rest) = match args {
        [_, command, rest @ ..] => (command.as_str(), rest),
        _ => {
            usage();
            return Ok(());
        }
    };

    let settings = AppSettings::load();
    match (command, rest) {
        ("info", [path]) => info(Path::new(path)),
        ("waveform", [path]) => summarize_waveform(Path::new(path), settings.max_display_points),
        ("waveform", [path, points]) => summarize_waveform(Path::new(path), points.parse()?),
        ("detect", [path]) => detect(Path::new(path), &settings),
        ("play", [path]) => play(Path::new(path), &settings),
        _ => {
            usage();
            Ok(())
        }
    }
}

fn usage() {
    eprintln!("Usage: wavemark <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  info <file>              Show track metadata");
    eprintln!("  waveform <file> [cap]    Summarize the decimated display series");
    eprintln!("  detect <file>            Run automatic marker detection");
    eprintln!("  play <file>              Play through the default output device");
}

fn info(path: &Path) -> Result<(), Box<dyn Error>> {
    let track = decoder::decode(path)?;
    let peak = track
        .samples()
        .iter()
        .fold(0.0f32, |acc, &s| acc.max(s.abs()));

    println!("File:        {}", track.filename());
    println!("Duration:    {:.2}s", track.duration());
    println!("Sample rate: {} Hz", track.sample_rate());
    println!("Samples:     {}", track.len());
    println!("Peak:        {:.3}", peak);
    Ok(())
}

fn summarize_waveform(path: &Path, max_points: usize) -> Result<(), Box<dyn Error>> {
    let track = decoder::decode(path)?;
    let series = waveform::render(&track, max_points);

    println!("{} points for {} samples", series.len(), track.len());
    println!("Effective rate: {:.1} Hz", series.effective_sample_rate);
    if let Some(last) = series.times.last() {
        println!("Time span:      0.000s - {:.3}s", last);
    }
    Ok(())
}

fn detect(path: &Path, settings: &AppSettings) -> Result<(), Box<dyn Error>> {
    let track = decoder::decode(path)?;
    let detector = AutoMarkerDetector::new(settings.detector.clone());
    let markers = detector.detect(&track);

    if markers.is_empty() {
        println!("No events detected");
        return Ok(());
    }
    for (i, m) in markers.iter().enumerate() {
        println!("{:>3}  {:8.3}s  amplitude {:.3}", i, m.time, m.amplitude);
    }
    println!("{} events in {}", markers.len(), track.filename());
    Ok(())
}

fn play(path: &Path, settings: &AppSettings) -> Result<(), Box<dyn Error>> {
    let mut session = Session::new(Box::new(CpalOutput::new()), settings);
    if session.add_files([path]) == 0 {
        return Err(format!("Not a playable file: {}", path.display()).into());
    }
    let selected = session.library().files()[0].clone();
    session.select(&selected)?;
    session.play()?;

    let duration = session.snapshot().duration;
    loop {
        let snap = session.snapshot();
        print!("\r{:6.1}s / {:.1}s", snap.position, duration);
        std::io::stdout().flush()?;
        if snap.state == PlaybackState::Stopped {
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }
    println!();

    AppSettings::from_session(&session).save();
    Ok(())
}
