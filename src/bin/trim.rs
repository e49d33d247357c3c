//! Remove silent parts from a video and reassemble the rest.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use silence_cut::ffmpeg;
use silence_cut::trim::{self, ConcatMethod, TrimOptions};

#[derive(Parser)]
#[command(
    name = "silence-trim",
    about = "Remove silent parts from a video while preserving audio"
)]
struct Args {
    /// Input video file
    input: PathBuf,

    /// Output trimmed video file
    output: PathBuf,

    /// Keep the entire video without trimming
    #[arg(long)]
    keep_all: bool,

    /// Method for reassembling the kept spans
    #[arg(long, value_enum, default_value = "concat")]
    method: ConcatMethod,

    /// Noise floor below which audio counts as silent
    #[arg(long, default_value = "-30dB")]
    noise: String,

    /// Minimum silence duration in seconds
    #[arg(long, default_value_t = 1.0)]
    min_silence: f64,
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

    let options = TrimOptions {
        method: args.method,
        keep_all: args.keep_all,
        noise: args.noise,
        min_silence: args.min_silence,
    };

    trim::run_trim(&args.input, &args.output, &options)
        .with_context(|| format!("could not trim {}", args.input.display()))?;

    Ok(())
}
