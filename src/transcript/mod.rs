use serde::{Deserialize, Serialize};
use std::fmt;

/// Round a time value in seconds to millisecond precision
pub fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// One timed caption unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Caption text with markup stripped
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

impl Segment {
    /// Build a segment, rejecting negative starts, non-positive durations and blank text.
    ///
    /// Times are rounded to milliseconds before the checks run, so a cue that
    /// collapses to zero length after rounding is rejected as well.
    pub fn new(text: impl AsRef<str>, start: f64, duration: f64) -> Option<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() || !start.is_finite() || !duration.is_finite() {
            return None;
        }

        let start = round_millis(start);
        let duration = round_millis(duration);
        if start < 0.0 || duration <= 0.0 {
            return None;
        }

        Some(Self {
            text: text.to_string(),
            start,
            duration,
        })
    }

    /// Build a segment from a start/end pair
    pub fn from_bounds(text: impl AsRef<str>, start: f64, end: f64) -> Option<Self> {
        if end <= start {
            return None;
        }
        Self::new(text, start, end - start)
    }

    /// End time in seconds, derived from start and duration
    pub fn end(&self) -> f64 {
        round_millis(self.start + self.duration)
    }
}

/// Identifies which acquisition method produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Direct calls to the timedtext caption endpoints
    NativeTimedtext,
    /// Player handshake that discovers caption track URLs
    PlayerApi,
    /// yt-dlp with the web client profile
    YtDlpWeb,
    /// yt-dlp with the android client profile
    YtDlpAndroid,
    /// yt-dlp with the ios client profile
    YtDlpIos,
    /// yt-dlp with the embedded player profile
    YtDlpEmbedded,
    /// Watch page scrape, last resort
    WatchPage,
}

impl StrategyKind {
    /// Default priority order of the built-in chain
    pub const DEFAULT_CHAIN: [StrategyKind; 7] = [
        StrategyKind::NativeTimedtext,
        StrategyKind::PlayerApi,
        StrategyKind::YtDlpWeb,
        StrategyKind::YtDlpAndroid,
        StrategyKind::YtDlpIos,
        StrategyKind::YtDlpEmbedded,
        StrategyKind::WatchPage,
    ];

    /// Method tag reported on results and in diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::NativeTimedtext => "native_timedtext",
            StrategyKind::PlayerApi => "player_api",
            StrategyKind::YtDlpWeb => "ytdlp_web",
            StrategyKind::YtDlpAndroid => "ytdlp_android",
            StrategyKind::YtDlpIos => "ytdlp_ios",
            StrategyKind::YtDlpEmbedded => "ytdlp_embedded",
            StrategyKind::WatchPage => "watch_page",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::DEFAULT_CHAIN
            .iter()
            .copied()
            .find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transcript produced by one successful strategy attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Segments ordered by start time
    pub segments: Vec<Segment>,

    /// Language tag of the captions
    pub language: String,

    /// Method tag of the strategy that produced the transcript
    pub method: String,

    /// Whether segment timings come from the source rather than being estimated
    pub has_real_timing: bool,
}

impl TranscriptResult {
    pub fn new(segments: Vec<Segment>, language: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            segments,
            language: language.into(),
            method: method.into(),
            has_real_timing: true,
        }
    }

    /// End of the last segment, zero when empty
    pub fn total_duration(&self) -> f64 {
        self.segments.last().map(Segment::end).unwrap_or(0.0)
    }

    /// All segment text joined with single spaces
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
