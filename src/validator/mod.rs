//! Acceptance checks applied to every candidate transcript, plus the
//! classification helpers the orchestrator uses to decide between
//! short-circuiting and moving on to the next strategy.

use serde::Serialize;

use crate::errors::TranscriptError;
use crate::signals::{self, Signal};
use crate::transcript::TranscriptResult;

pub const DEFAULT_MIN_LENGTH: usize = 250;

/// Fewer meaningful segments than this and the transcript is rejected
pub const MIN_MEANINGFUL_SEGMENTS: usize = 3;

/// A segment counts as meaningful when its trimmed text is longer than this
pub const MEANINGFUL_SEGMENT_CHARS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub full_text: String,
    pub meaningful_segments: usize,
    pub total_length: usize,
}

/// Check a candidate result against the quality thresholds
pub fn validate(
    result: &TranscriptResult,
    video_id: &str,
    min_length: usize,
) -> Result<ValidationReport, TranscriptError> {
    if result.segments.is_empty() {
        return Err(TranscriptError::NotFound {
            video_id: video_id.to_string(),
            attempted: vec![result.method.clone()],
            last_error: Some("strategy returned no segments".to_string()),
            reason: None,
        });
    }

    let full_text = result.full_text().trim().to_string();
    let total_length = full_text.chars().count();
    let meaningful_segments = result
        .segments
        .iter()
        .filter(|segment| segment.text.trim().chars().count() > MEANINGFUL_SEGMENT_CHARS)
        .count();

    if total_length < min_length || meaningful_segments < MIN_MEANINGFUL_SEGMENTS {
        return Err(TranscriptError::TooShort {
            video_id: video_id.to_string(),
            actual_length: total_length,
            required_length: min_length,
            meaningful_segments,
        });
    }

    Ok(ValidationReport {
        full_text,
        meaningful_segments,
        total_length,
    })
}

/// Owner disabled captions
pub fn is_disabled_error(text: &str) -> bool {
    signals::has_signal(text, Signal::CaptionsDisabled)
}

/// No captions found for what was asked; another strategy may still succeed
pub fn is_not_found_error(text: &str) -> bool {
    signals::has_signal(text, Signal::NoCaptions)
}

/// Video is private, removed or terminated
pub fn is_unavailable_error(text: &str) -> bool {
    signals::has_signal(text, Signal::VideoUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::transcript::Segment;

    fn result_with(texts: &[&str]) -> TranscriptResult {
        let segments = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Segment::new(text, i as f64, 1.0).unwrap())
            .collect();
        TranscriptResult::new(segments, "en", "test")
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let err = validate(&result_with(&[]), "vid", DEFAULT_MIN_LENGTH).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptNotFound);
    }

    #[test]
    fn test_short_text_reports_actual_length() {
        let err = validate(&result_with(&["ok ok ok ok ok"]), "vid", 250).unwrap_err();
        match err {
            TranscriptError::TooShort {
                actual_length,
                required_length,
                ..
            } => {
                assert_eq!(actual_length, 14);
                assert_eq!(required_length, 250);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_too_few_meaningful_segments() {
        let long = "a".repeat(300);
        let err = validate(&result_with(&[&long, "hi", "yes"]), "vid", 250).unwrap_err();
        match err {
            TranscriptError::TooShort {
                meaningful_segments, ..
            } => assert_eq!(meaningful_segments, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_accepts_good_transcript() {
        let text = "this sentence is long enough to count ".repeat(3);
        let texts: Vec<&str> = (0..10).map(|_| text.as_str()).collect();
        let report = validate(&result_with(&texts), "vid", 250).unwrap();
        assert_eq!(report.meaningful_segments, 10);
        assert!(report.total_length >= 250);
        assert_eq!(report.total_length, report.full_text.chars().count());
    }

    #[test]
    fn test_classification_helpers() {
        assert!(is_disabled_error("Transcripts are disabled for this video"));
        assert!(!is_disabled_error("HTTP Error 404: Not Found"));
        assert!(is_not_found_error("There are no subtitles for the requested languages"));
        assert!(is_unavailable_error("ERROR: [youtube] x: Video unavailable"));
        assert!(!is_unavailable_error("Sign in to confirm you're not a bot"));
    }
}
