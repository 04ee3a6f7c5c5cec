//! Decoders for the subtitle wire formats served by the platform.
//!
//! Every decoder yields segments in source order, with times normalised to
//! seconds at millisecond precision. Cues that are too short, blank, or have an
//! inverted time range are dropped rather than reported as errors.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::transcript::Segment;

pub mod json3;
pub mod time;
pub mod vtt;
pub mod xml;

/// Cues at or below this duration (seconds) are transition artefacts and get dropped
pub const MIN_CUE_DURATION: f64 = 0.3;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON caption payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unrecognised subtitle payload")]
    UnknownFormat,
}

/// Wire formats understood by the parsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// Cue-based text format (WebVTT)
    Vtt,
    /// JSON event format (json3)
    Json3,
    /// XML cue format (srv1 / timedtext XML)
    Xml,
}

impl SubtitleFormat {
    /// File extension / `fmt` query value for the format
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Json3 => "json3",
            SubtitleFormat::Xml => "srv1",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "vtt" | "webvtt" => Some(SubtitleFormat::Vtt),
            "json3" | "json" => Some(SubtitleFormat::Json3),
            "srv1" | "xml" => Some(SubtitleFormat::Xml),
            _ => None,
        }
    }

    /// Guess the format from the payload itself
    pub fn detect(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with("WEBVTT") {
            Some(SubtitleFormat::Vtt)
        } else if trimmed.starts_with('{') {
            Some(SubtitleFormat::Json3)
        } else if trimmed.starts_with('<') && trimmed.contains("<text") {
            Some(SubtitleFormat::Xml)
        } else if trimmed.contains("-->") {
            Some(SubtitleFormat::Vtt)
        } else {
            None
        }
    }

    /// Decode a payload in this format
    pub fn parse(&self, raw: &str) -> Result<Vec<Segment>, ParseError> {
        match self {
            SubtitleFormat::Vtt => Ok(vtt::parse(raw)),
            SubtitleFormat::Json3 => json3::parse(raw),
            SubtitleFormat::Xml => Ok(xml::parse(raw)),
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the format of a payload and decode it
pub fn parse_any(raw: &str) -> Result<Vec<Segment>, ParseError> {
    SubtitleFormat::detect(raw)
        .ok_or(ParseError::UnknownFormat)?
        .parse(raw)
}

lazy_static! {
    static ref MARKUP_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref ENTITY: Regex = Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Remove anything that looks like a markup tag
pub(crate) fn strip_tags(text: &str) -> String {
    MARKUP_TAG.replace_all(text, "").into_owned()
}

/// Decode HTML entities in a single pass so `&amp;lt;` stays `&lt;`
pub(crate) fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            let decoded = match name {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ if name.starts_with("#x") || name.starts_with("#X") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ if name.starts_with('#') => name[1..].parse::<u32>().ok().and_then(char::from_u32),
                _ => None,
            };
            decoded
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Collapse runs of whitespace (including newlines) into single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&lt;b&gt; &quot;hi&quot; it&#39;s"), "<b> \"hi\" it's");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("caf&#xE9; &unknown;"), "café &unknown;");
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(SubtitleFormat::detect("WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nhi"), Some(SubtitleFormat::Vtt));
        assert_eq!(SubtitleFormat::detect("{\"events\": []}"), Some(SubtitleFormat::Json3));
        assert_eq!(
            SubtitleFormat::detect("<?xml version=\"1.0\"?><transcript><text start=\"0\" dur=\"1\">x</text></transcript>"),
            Some(SubtitleFormat::Xml)
        );
        assert_eq!(SubtitleFormat::detect("plain words"), None);
    }

    #[test]
    fn test_parse_any_rejects_unknown() {
        assert!(matches!(parse_any("nothing here"), Err(ParseError::UnknownFormat)));
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(SubtitleFormat::from_extension("VTT"), Some(SubtitleFormat::Vtt));
        assert_eq!(SubtitleFormat::from_extension("json3"), Some(SubtitleFormat::Json3));
        assert_eq!(SubtitleFormat::from_extension("srv1"), Some(SubtitleFormat::Xml));
        assert_eq!(SubtitleFormat::from_extension("srt"), None);
    }
}
