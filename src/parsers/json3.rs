//! JSON event format (`fmt=json3`).

use serde::Deserialize;

use super::{collapse_whitespace, ParseError, MIN_CUE_DURATION};
use crate::transcript::Segment;

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs")]
    t_start_ms: Option<f64>,

    #[serde(rename = "dDurationMs")]
    d_duration_ms: Option<f64>,

    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Decode a json3 payload into segments
pub fn parse(raw: &str) -> Result<Vec<Segment>, ParseError> {
    let document: Json3Document = serde_json::from_str(raw.trim_start_matches('\u{feff}'))?;

    let segments = document
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            let start = event.t_start_ms? / 1000.0;
            let duration = event.d_duration_ms? / 1000.0;
            if duration <= MIN_CUE_DURATION {
                return None;
            }

            let text: String = segs.iter().map(|seg| seg.utf8.as_str()).collect();
            Segment::new(collapse_whitespace(&text), start, duration)
        })
        .collect();

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "wireMagic": "pb3",
        "events": [
            {"tStartMs": 0, "dDurationMs": 48000, "id": 1, "wpWinPosId": 1, "wsWinStyleId": 1},
            {"tStartMs": 160, "dDurationMs": 4080, "wWinId": 1, "segs": [{"utf8": "we're"}, {"utf8": " going", "tOffsetMs": 240}, {"utf8": " to talk", "tOffsetMs": 480}]},
            {"tStartMs": 2250, "dDurationMs": 300, "segs": [{"utf8": "blink"}]},
            {"tStartMs": 4230, "dDurationMs": 10, "aAppend": 1, "segs": [{"utf8": "\n"}]},
            {"tStartMs": 4240, "dDurationMs": 500, "segs": [{"utf8": "\n"}]},
            {"tStartMs": 5000, "dDurationMs": 2500, "segs": [{"utf8": "about\nrust"}]}
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let segments = parse(SAMPLE).unwrap();
        assert_eq!(segments.len(), 2);

        assert_eq!(segments[0].text, "we're going to talk");
        assert_eq!(segments[0].start, 0.16);
        assert_eq!(segments[0].duration, 4.08);

        assert_eq!(segments[1].text, "about rust");
        assert_eq!(segments[1].end(), 7.5);
    }

    #[test]
    fn test_duration_boundary() {
        let raw = r#"{"events": [
            {"tStartMs": 0, "dDurationMs": 300, "segs": [{"utf8": "too short"}]},
            {"tStartMs": 1000, "dDurationMs": 301, "segs": [{"utf8": "just enough"}]}
        ]}"#;
        let segments = parse(raw).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "just enough");
    }

    #[test]
    fn test_missing_events_is_empty() {
        assert!(parse("{}").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(parse("{\"events\": ["), Err(ParseError::InvalidJson(_))));
    }
}
