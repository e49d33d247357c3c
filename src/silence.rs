//! Silence-log parsing and keep-interval arithmetic.

use std::sync::LazyLock;

use regex::Regex;

static START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"silence_start:\s*(\d+\.?\d*)").expect("silence_start pattern"));
static END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"silence_end:\s*(\d+\.?\d*)").expect("silence_end pattern"));

/// A silent span reported by the decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceInterval {
    pub start: f64,
    pub duration: f64,
}

impl SilenceInterval {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A span of footage to keep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeepInterval {
    pub start: f64,
    pub end: f64,
}

impl KeepInterval {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Parse result of one silencedetect run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SilenceLog {
    pub intervals: Vec<SilenceInterval>,
    /// `silence_start` still pending when the log ended, i.e. the decoder
    /// never reported a matching `silence_end`. Happens when silence runs
    /// to the end of the media. Callers decide whether to drop it (marker
    /// export) or close it at the total duration (trimming).
    pub open_start: Option<f64>,
}

impl SilenceLog {
    /// Close a pending trailing start at `total_duration`, treating the
    /// silence as running to the end of the media. An open start at or
    /// past the total duration is dropped.
    pub fn close_at(mut self, total_duration: f64) -> Vec<SilenceInterval> {
        if let Some(start) = self.open_start.take() {
            if start < total_duration {
                self.intervals.push(SilenceInterval {
                    start,
                    duration: total_duration - start,
                });
            }
        }
        self.intervals
    }
}

/// Scan the decoder's diagnostic stream line by line and pair up
/// `silence_start` / `silence_end` markers. Lines that match neither
/// pattern are ignored, as is an end marker with no pending start.
pub fn parse_silence_log(log: &str) -> SilenceLog {
    let mut intervals = Vec::new();
    let mut pending: Option<f64> = None;

    for line in log.lines() {
        if let Some(start) = capture_seconds(&START_RE, line) {
            pending = Some(start);
        } else if let Some(end) = capture_seconds(&END_RE, line) {
            if let Some(start) = pending.take() {
                intervals.push(SilenceInterval {
                    start,
                    duration: end - start,
                });
            }
        }
    }

    SilenceLog {
        intervals,
        open_start: pending,
    }
}

fn capture_seconds(pattern: &Regex, line: &str) -> Option<f64> {
    pattern.captures(line).and_then(|cap| cap[1].parse().ok())
}

/// Complement of the silence list within `[0, total_duration]`.
///
/// The silences must be sorted and non-overlapping, which is what the
/// decoder emits. The result is sorted, non-overlapping, every interval
/// has positive length, and keep plus silence covers the whole timeline.
pub fn keep_intervals(silences: &[SilenceInterval], total_duration: f64) -> Vec<KeepInterval> {
    let mut keep = Vec::new();
    let mut prev_end = 0.0;

    for silence in silences {
        if silence.start > prev_end {
            keep.push(KeepInterval {
                start: prev_end,
                end: silence.start,
            });
        }
        prev_end = silence.end();
    }

    if prev_end < total_duration {
        keep.push(KeepInterval {
            start: prev_end,
            end: total_duration,
        });
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
[silencedetect @ 0x5591] silence_start: 20
frame=  100 fps=0.0 q=-0.0 size=N/A time=00:00:25.00 bitrate=N/A
[silencedetect @ 0x5591] silence_end: 25 | silence_duration: 5
[silencedetect @ 0x5591] silence_start: 60.5
[silencedetect @ 0x5591] silence_end: 62.25 | silence_duration: 1.75
";

    #[test]
    fn parses_paired_markers_in_order() {
        let log = parse_silence_log(LOG);
        assert_eq!(
            log.intervals,
            vec![
                SilenceInterval {
                    start: 20.0,
                    duration: 5.0
                },
                SilenceInterval {
                    start: 60.5,
                    duration: 1.75
                },
            ]
        );
        assert_eq!(log.open_start, None);
    }

    #[test]
    fn ignores_lines_without_markers() {
        let log = parse_silence_log("frame=  100\nsize=N/A\nDuration: 00:01:40.00\n");
        assert!(log.intervals.is_empty());
        assert_eq!(log.open_start, None);
    }

    #[test]
    fn end_without_pending_start_is_ignored() {
        let log = parse_silence_log("silence_end: 10 | silence_duration: 10\n");
        assert!(log.intervals.is_empty());
        assert_eq!(log.open_start, None);
    }

    #[test]
    fn trailing_start_is_surfaced_not_silently_dropped() {
        let log = parse_silence_log("silence_start: 20\nsilence_end: 25\nsilence_start: 90.5\n");
        assert_eq!(log.intervals.len(), 1);
        assert_eq!(log.open_start, Some(90.5));
    }

    #[test]
    fn close_at_turns_open_start_into_final_interval() {
        let log = parse_silence_log("silence_start: 90\n");
        let silences = log.close_at(100.0);
        assert_eq!(
            silences,
            vec![SilenceInterval {
                start: 90.0,
                duration: 10.0
            }]
        );
    }

    #[test]
    fn close_at_drops_open_start_past_the_duration() {
        let log = parse_silence_log("silence_start: 120\n");
        assert!(log.close_at(100.0).is_empty());
    }

    #[test]
    fn keep_intervals_complement_the_silences() {
        let silences = [
            SilenceInterval {
                start: 20.0,
                duration: 5.0,
            },
            SilenceInterval {
                start: 60.0,
                duration: 2.0,
            },
        ];
        assert_eq!(
            keep_intervals(&silences, 100.0),
            vec![
                KeepInterval {
                    start: 0.0,
                    end: 20.0
                },
                KeepInterval {
                    start: 25.0,
                    end: 60.0
                },
                KeepInterval {
                    start: 62.0,
                    end: 100.0
                },
            ]
        );
    }

    #[test]
    fn keep_union_exactly_covers_the_timeline() {
        let silences = [
            SilenceInterval {
                start: 0.0,
                duration: 3.0,
            },
            SilenceInterval {
                start: 10.0,
                duration: 2.5,
            },
            SilenceInterval {
                start: 97.0,
                duration: 3.0,
            },
        ];
        let keeps = keep_intervals(&silences, 100.0);
        assert_eq!(
            keeps,
            vec![
                KeepInterval {
                    start: 3.0,
                    end: 10.0
                },
                KeepInterval {
                    start: 12.5,
                    end: 97.0
                },
            ]
        );
        // Interleaving silences and keeps walks the timeline end to end
        // with no gap and no overlap.
        let mut cursor = 0.0;
        let mut remaining = keeps.iter().peekable();
        for silence in &silences {
            if let Some(keep) = remaining.peek() {
                if keep.start == cursor {
                    cursor = keep.end;
                    remaining.next();
                }
            }
            assert_eq!(silence.start, cursor);
            cursor = silence.end();
        }
        if let Some(keep) = remaining.next() {
            assert_eq!(keep.start, cursor);
            cursor = keep.end;
        }
        assert_eq!(cursor, 100.0);
    }

    #[test]
    fn no_silence_keeps_everything() {
        assert_eq!(
            keep_intervals(&[], 42.0),
            vec![KeepInterval {
                start: 0.0,
                end: 42.0
            }]
        );
    }

    #[test]
    fn fully_silent_input_keeps_nothing() {
        let silences = [SilenceInterval {
            start: 0.0,
            duration: 100.0,
        }];
        assert!(keep_intervals(&silences, 100.0).is_empty());
    }
}
