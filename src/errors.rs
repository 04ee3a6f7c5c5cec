// Error taxonomy surfaced by the extraction engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::rate_limit::RateLimitReason;

/// Machine-checkable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    TranscriptNotFound,
    TranscriptTooShort,
    TranscriptDisabled,
    RateLimited,
    ExtractionFailure,
}

impl ErrorKind {
    /// Kinds that may be shown to end users as-is
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ErrorKind::ExtractionFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::TranscriptNotFound => "TranscriptNotFound",
            ErrorKind::TranscriptTooShort => "TranscriptTooShort",
            ErrorKind::TranscriptDisabled => "TranscriptDisabled",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::ExtractionFailure => "ExtractionFailure",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum TranscriptError {
    #[error("No transcript available for {video_id} (tried: {})", .attempted.join(", "))]
    NotFound {
        video_id: String,
        attempted: Vec<String>,
        last_error: Option<String>,
        reason: Option<String>,
    },

    #[error(
        "Transcript for {video_id} is too short: {actual_length} chars and {meaningful_segments} meaningful segments (need {required_length} chars)"
    )]
    TooShort {
        video_id: String,
        actual_length: usize,
        required_length: usize,
        meaningful_segments: usize,
    },

    #[error("Captions are disabled for {video_id}: {message}")]
    Disabled {
        video_id: String,
        attempted: Vec<String>,
        message: String,
    },

    #[error("Rate limited for {video_id} ({reason}), retry in {}s", .wait_time.as_secs())]
    RateLimited {
        video_id: String,
        reason: RateLimitReason,
        wait_time: Duration,
    },

    #[error("Extraction failed for {video_id}: {message}")]
    ExtractionFailure {
        video_id: String,
        message: String,
        details: BTreeMap<String, String>,
    },
}

impl TranscriptError {
    /// Internal failure carrying raw diagnostic text
    pub fn failure(video_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtractionFailure {
            video_id: video_id.into(),
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach a diagnostic detail; no-op for kinds without a detail map
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let Self::ExtractionFailure { details, .. } = &mut self {
            details.insert(key.into(), value.to_string());
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::TranscriptNotFound,
            Self::TooShort { .. } => ErrorKind::TranscriptTooShort,
            Self::Disabled { .. } => ErrorKind::TranscriptDisabled,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::ExtractionFailure { .. } => ErrorKind::ExtractionFailure,
        }
    }

    pub fn video_id(&self) -> &str {
        match self {
            Self::NotFound { video_id, .. }
            | Self::TooShort { video_id, .. }
            | Self::Disabled { video_id, .. }
            | Self::RateLimited { video_id, .. }
            | Self::ExtractionFailure { video_id, .. } => video_id,
        }
    }

    pub fn is_user_facing(&self) -> bool {
        self.kind().is_user_facing()
    }

    /// Raw text used for phrase classification
    pub fn diagnostic_text(&self) -> String {
        match self {
            Self::ExtractionFailure { message, .. } => message.clone(),
            Self::Disabled { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Structured detail map for logs and API responses
    pub fn details(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("kind".to_string(), self.kind().to_string());
        map.insert("video_id".to_string(), self.video_id().to_string());

        match self {
            Self::NotFound {
                attempted,
                last_error,
                reason,
                ..
            } => {
                map.insert("attempted".to_string(), attempted.join(","));
                if let Some(last) = last_error {
                    map.insert("last_error".to_string(), last.clone());
                }
                if let Some(reason) = reason {
                    map.insert("reason".to_string(), reason.clone());
                }
            }
            Self::TooShort {
                actual_length,
                required_length,
                meaningful_segments,
                ..
            } => {
                map.insert("actual_length".to_string(), actual_length.to_string());
                map.insert("required_length".to_string(), required_length.to_string());
                map.insert("meaningful_segments".to_string(), meaningful_segments.to_string());
            }
            Self::Disabled { attempted, .. } => {
                map.insert("attempted".to_string(), attempted.join(","));
            }
            Self::RateLimited {
                reason, wait_time, ..
            } => {
                map.insert("reason".to_string(), reason.to_string());
                map.insert("wait_ms".to_string(), wait_time.as_millis().to_string());
            }
            Self::ExtractionFailure { details, .. } => {
                map.extend(details.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        map
    }

    /// Message suitable for end users; internal failures are masked
    pub fn user_message(&self) -> String {
        match self {
            Self::ExtractionFailure { .. } => {
                "Could not retrieve a transcript for this video right now. Please try again later.".to_string()
            }
            Self::RateLimited { wait_time, .. } => format!(
                "Too many transcript requests. Please retry in about {} seconds.",
                wait_time.as_secs().max(1)
            ),
            Self::Disabled { .. } => "The video owner has disabled captions for this video.".to_string(),
            Self::TooShort { .. } => {
                "The available transcript is too short to be useful.".to_string()
            }
            Self::NotFound { .. } => "No transcript is available for this video.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_user_facing() {
        let failure = TranscriptError::failure("abc", "socket closed").with_detail("exit_code", 1);
        assert_eq!(failure.kind(), ErrorKind::ExtractionFailure);
        assert!(!failure.is_user_facing());
        assert!(!failure.user_message().contains("socket"));
        assert_eq!(failure.details().get("exit_code").map(String::as_str), Some("1"));

        let not_found = TranscriptError::NotFound {
            video_id: "abc".to_string(),
            attempted: vec!["native_timedtext".to_string(), "player_api".to_string()],
            last_error: Some("HTTP Error 404".to_string()),
            reason: None,
        };
        assert!(not_found.is_user_facing());
        assert_eq!(not_found.to_string(), "No transcript available for abc (tried: native_timedtext, player_api)");
        assert_eq!(
            not_found.details().get("attempted").map(String::as_str),
            Some("native_timedtext,player_api")
        );
    }

    #[test]
    fn test_rate_limited_display() {
        let err = TranscriptError::RateLimited {
            video_id: "abc".to_string(),
            reason: RateLimitReason::BurstPrevention,
            wait_time: Duration::from_millis(42_500),
        };
        assert_eq!(err.to_string(), "Rate limited for abc (burst_prevention), retry in 42s");
        assert_eq!(err.details().get("wait_ms").map(String::as_str), Some("42500"));
        assert_eq!(err.video_id(), "abc");
    }

    #[test]
    fn test_detail_ignored_for_structured_kinds() {
        let err = TranscriptError::TooShort {
            video_id: "abc".to_string(),
            actual_length: 14,
            required_length: 250,
            meaningful_segments: 1,
        }
        .with_detail("ignored", "x");
        assert!(!err.details().contains_key("ignored"));
        assert_eq!(err.details().get("actual_length").map(String::as_str), Some("14"));
    }
}
