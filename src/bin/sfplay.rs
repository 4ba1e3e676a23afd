//! # sfplay - Command-line Player
//!
//! **Purpose:** Play one audio file through the default output device,
//! exercising both the fully-buffered and the streamed playback paths.
//!
//! Sources larger than 1 MiB stream from disk; smaller ones are decoded
//! into a single buffer up front. `--stream` forces the streamed path
//! regardless of size.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundfield::{AudioContext, PlaybackState, Sound, SoundBuffer, SoundStream};

/// Sources at or above this size stream instead of loading fully.
const STREAM_THRESHOLD: u64 = 1024 * 1024;

const STATUS_INTERVAL: Duration = Duration::from_millis(200);

/// Command-line arguments for sfplay
#[derive(Parser, Debug)]
#[command(name = "sfplay")]
#[command(about = "Play an audio file through the default output device")]
#[command(version)]
struct Args {
    /// Audio file to play (WAV or Ogg Vorbis)
    file: PathBuf,

    /// Stream from disk even when the file is small
    #[arg(short, long)]
    stream: bool,

    /// Restart from the beginning when the source runs out
    #[arg(short, long)]
    looping: bool,

    /// Source gain, 0.0 to 1.0
    #[arg(short, long, default_value = "1.0")]
    volume: f32,

    /// Playback rate multiplier
    #[arg(short, long, default_value = "1.0")]
    pitch: f32,

    /// Source position in listener space
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    position: Option<Vec<f32>>,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<f64>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sfplay=info,soundfield=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let ctx = AudioContext::new().context("Failed to open audio device")?;

    let size = std::fs::metadata(&args.file)
        .with_context(|| format!("Failed to stat {}", args.file.display()))?
        .len();
    let streamed = args.stream || size >= STREAM_THRESHOLD;

    info!(
        "Playing {} ({} bytes, {})",
        args.file.display(),
        size,
        if streamed { "streamed" } else { "buffered" }
    );

    if streamed {
        play_streamed(&ctx, &args)
    } else {
        play_buffered(&ctx, &args)
    }
}

fn play_streamed(ctx: &AudioContext, args: &Args) -> Result<()> {
    let mut stream = SoundStream::open_file(ctx, &args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    info!(
        "{} ch, {} Hz, {:.2}s",
        stream.channel_count(),
        stream.sample_rate(),
        stream.duration().as_secs_f64()
    );
    stream.set_looping(args.looping);
    stream.set_volume(args.volume);
    stream.set_pitch(args.pitch);
    if let Some(pos) = position(args) {
        stream.set_position(pos);
    }
    stream.play();
    let deadline = deadline(args);
    while stream.status() != PlaybackState::Stopped {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Duration cap reached; stopping");
            stream.stop();
            break;
        }
        thread::sleep(STATUS_INTERVAL);
    }
    info!("Done at {:.2}s", stream.playing_offset().as_secs_f64());
    Ok(())
}

fn play_buffered(ctx: &AudioContext, args: &Args) -> Result<()> {
    let buffer = SoundBuffer::load_file(ctx, &args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;
    info!(
        "{} ch, {} Hz, {:.2}s",
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration().as_secs_f64()
    );
    let sound = Sound::with_buffer(ctx, &buffer).context("Failed to create playback voice")?;
    sound.set_looping(args.looping);
    sound.set_volume(args.volume);
    sound.set_pitch(args.pitch);
    if let Some(pos) = position(args) {
        sound.set_position(pos);
    }
    sound.play();
    let deadline = deadline(args);
    while sound.status() != PlaybackState::Stopped {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Duration cap reached; stopping");
            sound.stop();
            break;
        }
        thread::sleep(STATUS_INTERVAL);
    }
    info!("Done at {:.2}s", sound.playing_offset().as_secs_f64());
    Ok(())
}

fn position(args: &Args) -> Option<[f32; 3]> {
    args.position.as_ref().map(|p| [p[0], p[1], p[2]])
}

fn deadline(args: &Args) -> Option<Instant> {
    args.duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs))
}
