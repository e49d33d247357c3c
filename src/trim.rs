//! Trimming pipeline: cut every keep span into a segment, reassemble the
//! segments, and only swap the result over the output path once the audio
//! track is confirmed to have survived.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ffmpeg;
use crate::silence::{self, KeepInterval};

/// Reassembly strategy for the kept spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConcatMethod {
    /// Concat demuxer with stream copy, the fastest path.
    #[value(name = "concat")]
    Demuxer,
    /// One filter graph over all segment files, re-encoding video.
    Filter,
    /// Single pass straight from the source, no segment files at all.
    Direct,
}

#[derive(Debug, Clone)]
pub struct TrimOptions {
    pub method: ConcatMethod,
    /// Bypass trimming and copy the whole file.
    pub keep_all: bool,
    /// Noise floor below which audio counts as silent, e.g. "-30dB".
    pub noise: String,
    /// Minimum silence duration in seconds.
    pub min_silence: f64,
}

impl Default for TrimOptions {
    fn default() -> Self {
        TrimOptions {
            method: ConcatMethod::Demuxer,
            keep_all: false,
            noise: "-30dB".to_string(),
            min_silence: 1.0,
        }
    }
}

/// States of the two-phase output commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Produced,
    Verified,
    Committed,
    RolledBack,
}

/// Remove the silent parts of `input` and write the reassembled footage
/// to `output`.
pub fn run_trim(input: &Path, output: &Path, options: &TrimOptions) -> Result<()> {
    let info = ffmpeg::probe(input)?;
    let expect_audio = info.has_audio;
    if expect_audio {
        info!("input has audio streams, audio will be preserved");
    } else {
        info!("input has no audio streams, output will be video-only");
    }

    if options.keep_all {
        info!("keeping the whole video");
        return finish_commit(input, output, expect_audio, |candidate| {
            ffmpeg::copy_full(input, candidate)
        });
    }

    info!(input = %input.display(), noise = %options.noise, min_silence = options.min_silence, "detecting silence");
    let log = ffmpeg::detect_silence(input, &options.noise, options.min_silence)?;
    let parsed = silence::parse_silence_log(&log);

    if parsed.intervals.is_empty() && parsed.open_start.is_none() {
        info!("no silence detected, copying the whole file");
        return finish_commit(input, output, expect_audio, |candidate| {
            ffmpeg::copy_full(input, candidate)
        });
    }

    // A silence region still open at the end of the log runs to the end of
    // the media, so close it at the probed duration.
    let silences = parsed.close_at(info.duration);
    let keeps = silence::keep_intervals(&silences, info.duration);
    info!(
        silences = silences.len(),
        keeps = keeps.len(),
        duration = info.duration,
        "computed keep intervals"
    );

    if keeps.is_empty() {
        return Err(Error::NothingToKeep);
    }

    match options.method {
        ConcatMethod::Direct => {
            let graph = direct_trim_graph(&keeps, expect_audio);
            finish_commit(input, output, expect_audio, |candidate| {
                ffmpeg::concat_filter(&[input.to_path_buf()], &graph, candidate, expect_audio)
            })
        }
        method => {
            // Segments and the concat manifest are scoped to this run.
            let workdir = TempDir::new()?;
            let segments = cut_segments(input, &keeps, expect_audio, workdir.path())?;
            let graph = segment_concat_graph(segments.len(), expect_audio);

            let result = finish_commit(input, output, expect_audio, |candidate| {
                if method == ConcatMethod::Filter {
                    return ffmpeg::concat_filter(&segments, &graph, candidate, expect_audio);
                }
                let manifest = write_manifest(&segments, workdir.path())?;
                match demux_and_check(&manifest, candidate, expect_audio) {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        warn!(%err, "concat demuxer did not produce a usable output, retrying with the filter graph");
                        ffmpeg::concat_filter(&segments, &graph, candidate, expect_audio)
                    }
                }
            });

            if let Err(err) = workdir.close() {
                warn!(%err, "could not remove temporary segment directory");
            }
            result
        }
    }
}

/// Cut each keep span into `part<i>.mp4` under `workdir`. When a segment
/// comes out without the expected audio, retry it once with relaxed
/// encoder rules and take the retry if it carries audio.
fn cut_segments(
    input: &Path,
    keeps: &[KeepInterval],
    with_audio: bool,
    workdir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut segments = Vec::with_capacity(keeps.len());

    for (i, span) in keeps.iter().enumerate() {
        let dest = workdir.join(format!("part{i}.mp4"));
        debug!(segment = i, start = span.start, end = span.end, "cutting segment");
        ffmpeg::cut_segment(input, span.start, span.duration(), &dest, with_audio, false)?;

        if with_audio && !segment_has_audio(&dest) {
            warn!(segment = i, "segment is missing audio, retrying with relaxed encoding");
            let fallback = workdir.join(format!("fallback_part{i}.mp4"));
            ffmpeg::cut_segment(input, span.start, span.duration(), &fallback, true, true)?;
            if segment_has_audio(&fallback) {
                fs::rename(&fallback, &dest)?;
            } else {
                warn!(segment = i, "retry still has no audio, keeping the first cut");
            }
        }

        segments.push(dest);
    }

    Ok(segments)
}

fn segment_has_audio(path: &Path) -> bool {
    matches!(ffmpeg::probe(path), Ok(info) if info.has_audio)
}

/// Demuxer concat plus the audio spot-check that decides whether the
/// filter-graph fallback is needed.
fn demux_and_check(manifest: &Path, candidate: &Path, expect_audio: bool) -> Result<()> {
    ffmpeg::concat_demuxer(manifest, candidate, expect_audio)?;
    if expect_audio && !segment_has_audio(candidate) {
        return Err(Error::AudioLost);
    }
    Ok(())
}

/// Write the concat demuxer manifest, one `file '<path>'` line per segment.
fn write_manifest(segments: &[PathBuf], workdir: &Path) -> Result<PathBuf> {
    let path = workdir.join("file_list.txt");
    let mut body = String::new();
    for segment in segments {
        body.push_str(&format!("file '{}'\n", segment.display()));
    }
    fs::write(&path, body)?;
    Ok(path)
}

/// Filter graph that concatenates `n` segment inputs:
/// `[0:v:0][0:a:0][1:v:0][1:a:0]...concat=n=N:v=1:a=1[outv][outa]`.
fn segment_concat_graph(n: usize, with_audio: bool) -> String {
    let mut graph = String::new();
    for i in 0..n {
        graph.push_str(&format!("[{i}:v:0]"));
        if with_audio {
            graph.push_str(&format!("[{i}:a:0]"));
        }
    }
    if with_audio {
        graph.push_str(&format!("concat=n={n}:v=1:a=1[outv][outa]"));
    } else {
        graph.push_str(&format!("concat=n={n}:v=1:a=0[outv]"));
    }
    graph
}

/// Single-pass graph: trim every keep span from the one source input and
/// concatenate, video and audio chains kept separate.
fn direct_trim_graph(keeps: &[KeepInterval], with_audio: bool) -> String {
    let mut graph = String::new();
    for (i, span) in keeps.iter().enumerate() {
        graph.push_str(&format!(
            "[0:v]trim=start={}:duration={},setpts=PTS-STARTPTS[v{i}];",
            span.start,
            span.duration()
        ));
        if with_audio {
            graph.push_str(&format!(
                "[0:a]atrim=start={}:duration={},asetpts=PTS-STARTPTS[a{i}];",
                span.start,
                span.duration()
            ));
        }
    }

    let n = keeps.len();
    for i in 0..n {
        graph.push_str(&format!("[v{i}]"));
    }
    if with_audio {
        graph.push_str(&format!("concat=n={n}:v=1:a=0[outv];"));
        for i in 0..n {
            graph.push_str(&format!("[a{i}]"));
        }
        graph.push_str(&format!("concat=n={n}:v=0:a=1[outa]"));
    } else {
        graph.push_str(&format!("concat=n={n}:v=1:a=0[outv]"));
    }
    graph
}

/// Produce the output through the commit machine with the standard
/// ffmpeg-backed verify and recovery steps.
fn finish_commit(
    input: &Path,
    output: &Path,
    expect_audio: bool,
    produce: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    let state = produce_and_commit(
        output,
        produce,
        |candidate| !expect_audio || segment_has_audio(candidate),
        |candidate| ffmpeg::copy_full(input, candidate),
    )?;

    match state {
        CommitState::Committed => {
            info!(output = %output.display(), "output saved");
            Ok(())
        }
        _ => Err(Error::AudioLost),
    }
}

/// Drive a candidate through produce → verify → commit. The candidate is
/// a sibling of the destination, so the final rename is atomic and the
/// destination is never touched until a candidate verifies. `recover`
/// gets one attempt at rebuilding the candidate after a failed
/// verification; a second failure rolls everything back, leaving any
/// previous output intact.
fn produce_and_commit(
    destination: &Path,
    produce: impl FnOnce(&Path) -> Result<()>,
    verify: impl Fn(&Path) -> bool,
    recover: impl FnOnce(&Path) -> Result<()>,
) -> Result<CommitState> {
    let mut commit = OutputCommit::begin(destination);

    if let Err(err) = produce(&commit.candidate) {
        commit.rollback();
        return Err(err);
    }

    if verify(&commit.candidate) {
        commit.state = CommitState::Verified;
        return commit.commit();
    }

    warn!("output verification failed, attempting recovery from the original input");
    if let Err(err) = recover(&commit.candidate) {
        commit.rollback();
        return Err(err);
    }
    if verify(&commit.candidate) {
        info!("audio recovered in the output");
        commit.state = CommitState::Verified;
        return commit.commit();
    }

    warn!("recovery failed, previous output left untouched");
    Ok(commit.rollback())
}

/// Two-phase output commit: the pipeline writes into a `.part` sibling of
/// the destination and only a verified candidate gets renamed over it.
#[derive(Debug)]
struct OutputCommit {
    destination: PathBuf,
    candidate: PathBuf,
    state: CommitState,
}

impl OutputCommit {
    fn begin(destination: &Path) -> Self {
        let mut name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "output".into());
        name.push(".part");
        OutputCommit {
            destination: destination.to_path_buf(),
            candidate: destination.with_file_name(name),
            state: CommitState::Produced,
        }
    }

    fn commit(mut self) -> Result<CommitState> {
        fs::rename(&self.candidate, &self.destination)?;
        self.state = CommitState::Committed;
        debug!(output = %self.destination.display(), "candidate committed");
        Ok(self.state)
    }

    fn rollback(&mut self) -> CommitState {
        if let Err(err) = fs::remove_file(&self.candidate) {
            debug!(%err, candidate = %self.candidate.display(), "no candidate to remove");
        }
        self.state = CommitState::RolledBack;
        self.state
    }
}
