//! External tool invocations: ffmpeg for decoding and cutting, ffprobe
//! for stream metadata. Everything here blocks until the child exits.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "192k";

/// Stream metadata needed by both pipelines.
#[derive(Debug, Clone, Copy)]
pub struct MediaInfo {
    pub duration: f64,
    pub has_audio: bool,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
}

/// Fail early when the external tools are missing instead of at the first
/// invocation deep inside a pipeline.
pub fn locate_tools() -> Result<()> {
    which::which("ffmpeg").map_err(|_| Error::ToolNotFound("ffmpeg"))?;
    which::which("ffprobe").map_err(|_| Error::ToolNotFound("ffprobe"))?;
    Ok(())
}

/// Run the decoder's silence detector over `input` and return the raw
/// diagnostic stream. ffmpeg reports silence intervals on stderr.
///
/// The exit status is deliberately not turned into an error: an input
/// without any audio stream makes the filter chain fail, and the callers
/// treat an empty log as "no silence found".
pub fn detect_silence(input: &Path, noise: &str, min_silence: f64) -> Result<String> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-i")
        .arg(input)
        .arg("-af")
        .arg(format!("silencedetect=noise={noise}:d={min_silence}"))
        .args(["-f", "null", "-"]);

    let output = run(&mut cmd)?;
    if !output.status.success() {
        debug!(code = ?output.status.code(), "silencedetect exited non-zero");
    }
    Ok(String::from_utf8_lossy(&output.stderr).into_owned())
}

/// Probe a media file for its duration and whether it carries audio.
pub fn probe(input: &Path) -> Result<MediaInfo> {
    if !input.exists() {
        return Err(Error::FileNotFound(input.to_path_buf()));
    }

    let mut cmd = Command::new("ffprobe");
    cmd.args([
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ])
    .arg(input);

    let output = run(&mut cmd)?;
    check("ffprobe", &output)?;
    decode_probe(&output.stdout, input)
}

fn decode_probe(raw: &[u8], input: &Path) -> Result<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(raw)?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| Error::MissingDuration(input.to_path_buf()))?;

    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(MediaInfo {
        duration,
        has_audio,
    })
}

/// Copy the whole input into `dest`, video stream untouched, audio
/// re-encoded to a fixed codec so later concatenation stays compatible.
pub fn copy_full(input: &Path, dest: &Path) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-i")
        .arg(input)
        .args(["-c:v", "copy", "-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE, "-y"])
        .arg(dest);

    check("ffmpeg", &run(&mut cmd)?)
}

/// Cut one keep span into `dest` by lossless video stream copy. The audio
/// track is re-encoded when present, since stream-copy concatenation later
/// needs matching codec parameters across segments. `relaxed` adds the
/// encoder's experimental-compliance switch for the retry path.
pub fn cut_segment(
    input: &Path,
    start: f64,
    duration: f64,
    dest: &Path,
    with_audio: bool,
    relaxed: bool,
) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-ss")
        .arg(start.to_string())
        .arg("-i")
        .arg(input)
        .arg("-to")
        .arg(duration.to_string())
        .args(["-c:v", "copy"]);
    if with_audio {
        cmd.args(["-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE]);
    }
    if relaxed {
        cmd.args(["-strict", "experimental"]);
    }
    cmd.arg("-y").arg(dest);

    check("ffmpeg", &run(&mut cmd)?)
}

/// Concatenate the segments listed in `manifest` by stream copy. The
/// fastest path, but it needs identical codec parameters across segments.
pub fn concat_demuxer(manifest: &Path, dest: &Path, with_audio: bool) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-f", "concat", "-safe", "0", "-i"]).arg(manifest);
    if with_audio {
        cmd.args(["-c:v", "copy", "-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE]);
    } else {
        cmd.args(["-c", "copy"]);
    }
    cmd.arg("-y").arg(dest);

    check("ffmpeg", &run(&mut cmd)?)
}

/// Feed `inputs` through a prepared filter graph that must label its video
/// chain `[outv]` and, with audio, its audio chain `[outa]`. Video is
/// re-encoded for compatibility.
pub fn concat_filter(inputs: &[PathBuf], graph: &str, dest: &Path, with_audio: bool) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    for input in inputs {
        cmd.arg("-i").arg(input);
    }
    cmd.arg("-filter_complex")
        .arg(graph)
        .args(["-map", "[outv]"]);
    if with_audio {
        cmd.args(["-map", "[outa]"]);
    }
    cmd.args(["-c:v", "libx264"]);
    if with_audio {
        cmd.args(["-c:a", AUDIO_CODEC, "-b:a", AUDIO_BITRATE]);
    }
    cmd.arg("-y").arg(dest);

    check("ffmpeg", &run(&mut cmd)?)
}

fn run(cmd: &mut Command) -> Result<Output> {
    debug!(?cmd, "running");
    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;
    Ok(output)
}

fn check(tool: &'static str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(Error::CommandFailed {
        tool,
        code: output.status.code(),
        stderr: stderr_tail(&output.stderr),
    })
}

/// Last few stderr lines, usually where ffmpeg states the actual problem.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(4)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_probe_output() {
        let raw = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "93.440000", "size": "1048576"}
        }"#;
        let info = decode_probe(raw, Path::new("clip.mp4")).unwrap();
        assert!((info.duration - 93.44).abs() < 1e-9);
        assert!(info.has_audio);
    }

    #[test]
    fn detects_missing_audio_stream() {
        let raw = br#"{
            "streams": [{"codec_type": "video"}],
            "format": {"duration": "10.0"}
        }"#;
        let info = decode_probe(raw, Path::new("clip.mp4")).unwrap();
        assert!(!info.has_audio);
    }

    #[test]
    fn missing_duration_is_an_error() {
        let raw = br#"{"streams": [], "format": {}}"#;
        let err = decode_probe(raw, Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, Error::MissingDuration(_)));
    }

    #[test]
    fn stderr_tail_keeps_the_last_lines() {
        let stderr = b"one\ntwo\nthree\nfour\nfive\nsix";
        assert_eq!(stderr_tail(stderr), "three\nfour\nfive\nsix");
        assert_eq!(stderr_tail(b"only"), "only");
    }
}
