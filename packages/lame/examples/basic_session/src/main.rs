#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Basic encoding session example.
//!
//! This example shows how to:
//! - Configure a session from JSON and typed options
//! - Encode PCM in chunks and collect the returned bytes
//! - Flush, inspect the frame statistics, and write the trailer tags
//!
//! Usage: `basic_session [output.mp3]` (defaults to `basic_session.mp3`)

use std::{
    f64::consts::PI,
    fs::OpenOptions,
    io::Write as _,
    path::{Path, PathBuf},
};

use moosicbox_lame::{CodecEngine, ConfigOption, Session, SessionConfig, VbrMode};
use thiserror::Error;

const SAMPLE_RATE: u32 = 44_100;
const SECONDS: u32 = 2;
const CHUNK_FRAMES: usize = 4096;

#[derive(Debug, Error)]
enum ExampleError {
    #[error("Encoding error: {0}")]
    Lame(#[from] moosicbox_lame::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Interleaved stereo sine tone at `frequency` Hz.
#[allow(clippy::cast_possible_truncation)]
fn sine(frequency: f64, frames: u32) -> Vec<i16> {
    (0..frames)
        .flat_map(|frame| {
            let t = f64::from(frame) / f64::from(SAMPLE_RATE);
            let sample = ((2.0 * PI * frequency * t).sin() * 8000.0) as i16;
            [sample, sample]
        })
        .collect()
}

fn encode<E: CodecEngine>(mut session: Session<E>, path: &Path) -> Result<(), ExampleError> {
    let config = SessionConfig::from_json(&format!(
        r#"{{"in_samplerate": {SAMPLE_RATE}, "num_channels": 2, "num_samples": {}}}"#,
        SAMPLE_RATE * SECONDS
    ))?;
    session.apply_config(&config)?;
    session.configure(ConfigOption::Vbr, VbrMode::Abr)?;
    session.configure(ConfigOption::AbrBitrate, 160)?;
    session.configure(ConfigOption::Quality, 2)?;
    session.initialize()?;

    println!("  Engine version: {}", session.engine_version()?);
    println!("  Output buffer: {} bytes", session.capacity());

    let pcm = sine(440.0, SAMPLE_RATE * SECONDS);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    for chunk in pcm.chunks(CHUNK_FRAMES * 2) {
        // The returned bytes are only valid until the next call.
        file.write_all(session.encode(chunk)?)?;
    }
    file.write_all(session.flush()?)?;
    session.write_trailer_tags(&mut file)?;

    println!("  Frames: {}", session.frame_count()?);
    println!("  Estimated frames: {}", session.estimated_total_frames()?);
    for bucket in session.bitrate_histogram()? {
        if bucket.frames > 0 {
            println!("  {:>3} kbps: {} frames", bucket.bitrate_kbps, bucket.frames);
        }
    }
    for (mode, frames) in session.stereo_mode_histogram()?.iter() {
        println!("  {mode:<12} {frames} frames");
    }

    session.close();

    log::info!("Wrote {}", path.display());

    Ok(())
}

fn main() -> Result<(), ExampleError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("MoosicBox LAME - Basic Session Example");
    println!("======================================\n");

    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("basic_session.mp3"), PathBuf::from);

    #[cfg(feature = "lame")]
    {
        println!("=== libmp3lame ===");
        encode(moosicbox_lame::LameSession::new()?, &path)?;
    }

    #[cfg(all(feature = "simulator", not(feature = "lame")))]
    {
        println!("=== Simulator ===");
        encode(moosicbox_lame::SimulatedSession::new()?, &path)?;
    }

    Ok(())
}
