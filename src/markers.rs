//! Timeline marker export: a structured JSON document for the editing
//! tool's marker importer, or a CMX-style edit decision list.

use clap::ValueEnum;
use serde::Serialize;

use crate::silence::SilenceInterval;

/// Frame rate used for EDL timecodes unless overridden. The EDL carries a
/// frame-mode declaration but no rate of its own, so this stays a
/// documented configuration value rather than something derived from the
/// source media.
pub const DEFAULT_EDL_FPS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarkerFormat {
    Json,
    Edl,
}

/// One labeled timeline annotation. Field order matters: the consuming
/// editor expects the document exactly as written here.
#[derive(Debug, Serialize)]
pub struct MarkerRecord {
    pub start: f64,
    pub duration: f64,
    pub color: String,
    pub name: String,
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct MarkerDocument {
    pub version: String,
    pub markers: Vec<MarkerRecord>,
}

impl MarkerDocument {
    pub fn from_intervals(intervals: &[SilenceInterval]) -> Self {
        MarkerDocument {
            version: "1.0".to_string(),
            markers: intervals
                .iter()
                .map(|s| MarkerRecord {
                    start: s.start,
                    duration: s.duration,
                    color: "Blue".to_string(),
                    name: "Silence".to_string(),
                    note: "Auto-marked silent section".to_string(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `HH:MM:SS:FF` with every field two-digit zero-padded and the frame
/// count floored from the fractional seconds.
pub fn seconds_to_timecode(seconds: f64, fps: f64) -> String {
    let h = (seconds / 3600.0).floor() as u64;
    let m = ((seconds % 3600.0) / 60.0).floor() as u64;
    let s = (seconds % 60.0).floor() as u64;
    let f = (seconds.fract() * fps).floor() as u64;
    format!("{h:02}:{m:02}:{s:02}:{f:02}")
}

/// Render the interval list as an edit decision list. Each numbered entry
/// repeats the same timecode for source and record because the entries
/// annotate the source timeline rather than describe a real edit.
pub fn to_edl(intervals: &[SilenceInterval], fps: f64) -> String {
    let mut lines = vec![
        "TITLE: Silence Detection".to_string(),
        "FCM: NON-DROP FRAME".to_string(),
        String::new(),
    ];

    for (i, s) in intervals.iter().enumerate() {
        let start_tc = seconds_to_timecode(s.start, fps);
        let end_tc = seconds_to_timecode(s.end(), fps);
        lines.push(format!(
            "{:03}  AX       V     C        {start_tc} {end_tc} {start_tc} {end_tc}",
            i + 1
        ));
        lines.push(format!("* FROM: {} TO: {}", s.start, s.end()));
        lines.push("* SILENCE\n".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timecode_at_30fps() {
        assert_eq!(seconds_to_timecode(3661.5, 30.0), "01:01:01:15");
        assert_eq!(seconds_to_timecode(0.0, 30.0), "00:00:00:00");
    }

    #[test]
    fn timecode_honors_the_frame_rate() {
        assert_eq!(seconds_to_timecode(1.5, 24.0), "00:00:01:12");
        assert_eq!(seconds_to_timecode(1.5, 60.0), "00:00:01:30");
    }

    #[test]
    fn marker_document_carries_the_fixed_labels() {
        let doc = MarkerDocument::from_intervals(&[SilenceInterval {
            start: 10.0,
            duration: 2.5,
        }]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["markers"][0]["start"], 10.0);
        assert_eq!(value["markers"][0]["duration"], 2.5);
        assert_eq!(value["markers"][0]["color"], "Blue");
        assert_eq!(value["markers"][0]["name"], "Silence");
        assert_eq!(value["markers"][0]["note"], "Auto-marked silent section");
    }

    #[test]
    fn marker_json_field_order_is_stable() {
        let doc = MarkerDocument::from_intervals(&[SilenceInterval {
            start: 10.0,
            duration: 2.5,
        }]);
        let json = doc.to_json().unwrap();
        let positions: Vec<usize> = ["\"version\"", "\"markers\"", "\"start\"", "\"duration\"", "\"color\"", "\"name\"", "\"note\""]
            .iter()
            .map(|field| json.find(field).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn edl_layout() {
        let intervals = [
            SilenceInterval {
                start: 10.0,
                duration: 2.5,
            },
            SilenceInterval {
                start: 60.0,
                duration: 2.0,
            },
        ];
        let edl = to_edl(&intervals, 30.0);
        let lines: Vec<&str> = edl.lines().collect();
        assert_eq!(lines[0], "TITLE: Silence Detection");
        assert_eq!(lines[1], "FCM: NON-DROP FRAME");
        assert_eq!(lines[2], "");
        assert_eq!(
            lines[3],
            "001  AX       V     C        00:00:10:00 00:00:12:15 00:00:10:00 00:00:12:15"
        );
        assert_eq!(lines[4], "* FROM: 10 TO: 12.5");
        assert_eq!(lines[5], "* SILENCE");
        assert_eq!(lines[6], "");
        assert!(lines[7].starts_with("002  AX"));
        assert!(edl.ends_with("* SILENCE\n"));
    }

    #[test]
    fn empty_interval_list_yields_just_the_header() {
        let edl = to_edl(&[], DEFAULT_EDL_FPS);
        assert_eq!(edl, "TITLE: Silence Detection\nFCM: NON-DROP FRAME\n");
    }
}
