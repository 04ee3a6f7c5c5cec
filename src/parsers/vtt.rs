//! Cue-based text format (WebVTT as written by the platform and by yt-dlp).

use lazy_static::lazy_static;
use regex::Regex;

use super::time::{format_cue_timestamp, parse_cue_timestamp};
use super::{collapse_whitespace, decode_entities, strip_tags, MIN_CUE_DURATION};
use crate::transcript::Segment;

lazy_static! {
    static ref TIMING_LINE: Regex =
        Regex::new(r"^\s*((?:\d+:)?\d{2}:\d{2}[.,]\d{1,3})\s*-->\s*((?:\d+:)?\d{2}:\d{2}[.,]\d{1,3})").unwrap();
    static ref BLOCK_SEPARATOR: Regex = Regex::new(r"\n[ \t]*\n").unwrap();
}

/// Decode a cue-text payload into segments.
///
/// Header, `NOTE`, `STYLE` and `REGION` blocks carry no timing line and are
/// skipped whole, as are cue identifiers above the timing line. Everything
/// below the timing line is caption text.
pub fn parse(raw: &str) -> Vec<Segment> {
    let normalized = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n").replace('\r', "\n");
    let mut segments = Vec::new();

    for block in BLOCK_SEPARATOR.split(&normalized) {
        let mut lines = block.lines().map(str::trim).skip_while(|line| !TIMING_LINE.is_match(line));

        let Some(timing) = lines.next() else {
            continue;
        };
        let Some(caps) = TIMING_LINE.captures(timing) else {
            continue;
        };
        let (Some(start), Some(end)) = (parse_cue_timestamp(&caps[1]), parse_cue_timestamp(&caps[2])) else {
            continue;
        };

        let text = lines
            .filter(|line| !line.is_empty())
            .map(|line| decode_entities(&strip_tags(line)))
            .collect::<Vec<_>>()
            .join(" ");
        let text = collapse_whitespace(&text);

        if let Some(segment) = Segment::from_bounds(&text, start, end) {
            if segment.duration > MIN_CUE_DURATION {
                segments.push(segment);
            }
        }
    }

    segments
}

/// Render segments back into cue-text form
pub fn render(segments: &[Segment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in segments {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_cue_timestamp(segment.start, '.'),
            format_cue_timestamp(segment.end(), '.'),
            segment.text
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "WEBVTT\nKind: captions\nLanguage: en\n\n\
        1\n00:00:00.000 --> 00:00:02.500\nHello <c.colorE5E5E5>there</c>\nworld\n\n\
        2\n00:00:02.500 --> 00:00:02.510\nblip\n\n\
        3\n00:00:03.000 --> 00:00:05.000 align:start position:0%\n<00:00:03.500><c> second</c> cue &amp; more\n\n\
        4\n00:00:06.000 --> 00:00:07.000\n   \n\n\
        NOTE this is a comment\n\n\
        101:00:00.000 --> 101:00:01.250\nlong video\n";

    #[test]
    fn test_parse_sample() {
        let segments = parse(SAMPLE);
        assert_eq!(segments.len(), 3);

        assert_eq!(segments[0].text, "Hello there world");
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].duration, 2.5);

        assert_eq!(segments[1].text, "second cue & more");
        assert_eq!(segments[1].start, 3.0);

        assert_eq!(segments[2].text, "long video");
        assert_eq!(segments[2].start, 363600.0);
        assert_eq!(segments[2].duration, 1.25);
    }

    #[test]
    fn test_short_cue_boundary() {
        let raw = "WEBVTT\n\n00:00:01.000 --> 00:00:01.300\nexactly short\n\n00:00:02.000 --> 00:00:02.500\nhalf second\n";
        let segments = parse(raw);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "half second");
    }

    #[test]
    fn test_inverted_range_is_dropped() {
        let raw = "WEBVTT\n\n00:00:05.000 --> 00:00:04.000\nbackwards\n";
        assert!(parse(raw).is_empty());
    }

    #[test]
    fn test_hourless_timestamps() {
        let segments = parse("WEBVTT\n\n01:02.500 --> 01:04.000\nshort form\n");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 62.5);
        assert_eq!(segments[0].duration, 1.5);
    }

    #[test]
    fn test_header_words_inside_cues_are_kept() {
        let raw = "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nNOTEBOOKS are on sale today\n\n\
            00:00:04.000 --> 00:00:06.000\nLanguage: it matters a lot\n\n\
            intro\n00:00:07.000 --> 00:00:09.000\n1984\nNOTE the date\n";
        let segments = parse(raw);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].text, "NOTEBOOKS are on sale today");
        assert_eq!(segments[1].text, "Language: it matters a lot");
        assert_eq!(segments[2].text, "1984 NOTE the date");
    }

    #[test]
    fn test_crlf_input() {
        let raw = "WEBVTT\r\n\r\n00:00:01.000 --> 00:00:03.000\r\nwindows line\r\n";
        let segments = parse(raw);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "windows line");
    }

    #[test]
    fn test_reparse_is_idempotent() {
        let first = parse(SAMPLE);
        let second = parse(&render(&first));
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a.start - b.start).abs() < 0.001);
            assert!((a.duration - b.duration).abs() < 0.001);
            assert_eq!(a.text, b.text);
        }
    }
}
