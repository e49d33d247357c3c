//! Detect silent intervals in a video and export them as timeline markers.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use silence_cut::ffmpeg;
use silence_cut::markers::{self, MarkerDocument, MarkerFormat};
use silence_cut::silence;

#[derive(Parser)]
#[command(
    name = "silence-mark",
    about = "Detect silent parts in a video and export timeline markers"
)]
struct Args {
    /// Input video file
    #[arg(short, long, default_value = "video.mp4")]
    input: PathBuf,

    /// Output marker file
    #[arg(short, long, default_value = "marker.json")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: MarkerFormat,

    /// Noise floor below which audio counts as silent
    #[arg(long, default_value = "-30dB")]
    noise: String,

    /// Minimum silence duration in seconds
    #[arg(long, default_value_t = 0.5)]
    min_silence: f64,

    /// Frame rate used for EDL timecodes
    #[arg(long, default_value_t = markers::DEFAULT_EDL_FPS)]
    fps: f64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    ffmpeg::locate_tools()?;

    info!(input = %args.input.display(), "detecting silence");
    let log = ffmpeg::detect_silence(&args.input, &args.noise, args.min_silence)
        .with_context(|| format!("silence detection failed for {}", args.input.display()))?;

    let parsed = silence::parse_silence_log(&log);
    if let Some(start) = parsed.open_start {
        // Silence that runs to the end of the media has no end marker in
        // the log. Markers annotate closed regions only, so it is dropped.
        warn!(start, "silence still open at end of log, not exported as a marker");
    }
    info!(intervals = parsed.intervals.len(), "parsed silence intervals");

    let body = match args.format {
        MarkerFormat::Json => MarkerDocument::from_intervals(&parsed.intervals).to_json()?,
        MarkerFormat::Edl => markers::to_edl(&parsed.intervals, args.fps),
    };
    fs::write(&args.output, body)
        .with_context(|| format!("could not write {}", args.output.display()))?;

    info!(output = %args.output.display(), format = ?args.format, "markers written");
    Ok(())
}
