use anyhow::{Context, Result};
use serde::Serialize;

use crate::parsers::time::format_cue_timestamp;
use crate::parsers::vtt;
use crate::transcript::{Segment, TranscriptResult};
use crate::utils::format_duration;

/// Plain text, one segment per line when timestamps are requested
pub fn format_as_text(result: &TranscriptResult, include_timestamps: bool) -> String {
    if !include_timestamps {
        return result.full_text();
    }

    result
        .segments
        .iter()
        .map(|segment| format!("[{}] {}", format_cue_timestamp(segment.start, '.'), segment.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct JsonTranscript<'a> {
    language: &'a str,
    method: &'a str,
    has_real_timing: bool,
    segment_count: usize,
    duration: String,
    text: String,
    segments: &'a [Segment],
}

pub fn format_as_json(result: &TranscriptResult) -> Result<String> {
    let doc = JsonTranscript {
        language: &result.language,
        method: &result.method,
        has_real_timing: result.has_real_timing,
        segment_count: result.segments.len(),
        duration: format_duration(result.total_duration()),
        text: result.full_text(),
        segments: &result.segments,
    };
    serde_json::to_string_pretty(&doc).context("Failed to serialize transcript")
}

/// SubRip, 1-based cue numbers
pub fn format_as_srt(result: &TranscriptResult) -> String {
    let mut out = String::new();
    for (i, segment) in result.segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_cue_timestamp(segment.start, ','),
            format_cue_timestamp(segment.end(), ','),
            segment.text
        ));
    }
    out
}

pub fn format_as_vtt(result: &TranscriptResult) -> String {
    vtt::render(&result.segments)
}
