//! Central phrase table used to classify failure text coming back from the
//! platform, from yt-dlp stderr, and from transport errors.
//!
//! The phrases were collected from observed failures and will drift as the
//! remote side rewords its messages. Bump [`PHRASE_TABLE_VERSION`] whenever the
//! table changes so logs can be correlated with the rules that produced them.

use serde::{Deserialize, Serialize};

pub const PHRASE_TABLE_VERSION: u32 = 4;

/// What a piece of failure text tells us about the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// The owner turned captions off; no strategy can succeed
    CaptionsDisabled,
    /// Private, removed or terminated video
    VideoUnavailable,
    /// Sign-in / bot challenge
    BotDetection,
    /// Explicit throttling (429 and friends)
    RateLimited,
    /// 403 or other access refusal
    AccessDenied,
    /// yt-dlp could not impersonate a browser for this request
    Impersonation,
    /// Network or process timeout
    Timeout,
    /// No caption track for the requested languages
    NoCaptions,
}

impl Signal {
    /// Stable snake_case tag, as used in error details
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::CaptionsDisabled => "captions_disabled",
            Signal::VideoUnavailable => "video_unavailable",
            Signal::BotDetection => "bot_detection",
            Signal::RateLimited => "rate_limited",
            Signal::AccessDenied => "access_denied",
            Signal::Impersonation => "impersonation",
            Signal::Timeout => "timeout",
            Signal::NoCaptions => "no_captions",
        }
    }

    /// Signals that mean the remote side is actively pushing back on us
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Signal::BotDetection | Signal::RateLimited | Signal::AccessDenied
        )
    }

    /// Signals after which no other strategy can succeed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Signal::CaptionsDisabled | Signal::VideoUnavailable)
    }
}

/// Lower-cased phrase → signal, ordered from most to least specific
pub const PHRASE_TABLE: &[(&str, Signal)] = &[
    ("transcripts are disabled", Signal::CaptionsDisabled),
    ("subtitles are disabled", Signal::CaptionsDisabled),
    ("captions are disabled", Signal::CaptionsDisabled),
    ("captions have been disabled", Signal::CaptionsDisabled),
    ("disabled captions", Signal::CaptionsDisabled),
    ("private video", Signal::VideoUnavailable),
    ("video is private", Signal::VideoUnavailable),
    ("video unavailable", Signal::VideoUnavailable),
    ("video is unavailable", Signal::VideoUnavailable),
    ("video has been removed", Signal::VideoUnavailable),
    ("this video is no longer available", Signal::VideoUnavailable),
    ("account associated with this video has been terminated", Signal::VideoUnavailable),
    ("this video does not exist", Signal::VideoUnavailable),
    ("not a bot", Signal::BotDetection),
    ("not a robot", Signal::BotDetection),
    ("unusual traffic", Signal::BotDetection),
    ("automated queries", Signal::BotDetection),
    ("captcha", Signal::BotDetection),
    ("http error 429", Signal::RateLimited),
    ("status 429", Signal::RateLimited),
    ("too many requests", Signal::RateLimited),
    ("rate limit", Signal::RateLimited),
    ("rate-limit", Signal::RateLimited),
    ("http error 403", Signal::AccessDenied),
    ("status 403", Signal::AccessDenied),
    ("403 forbidden", Signal::AccessDenied),
    ("access denied", Signal::AccessDenied),
    ("sign in to confirm your age", Signal::AccessDenied),
    ("impersonat", Signal::Impersonation),
    ("timed out", Signal::Timeout),
    ("timeout", Signal::Timeout),
    ("there are no subtitles", Signal::NoCaptions),
    ("no subtitles", Signal::NoCaptions),
    ("no captions", Signal::NoCaptions),
    ("no caption tracks", Signal::NoCaptions),
    ("no transcript", Signal::NoCaptions),
    ("could not find", Signal::NoCaptions),
    ("not found", Signal::NoCaptions),
    ("http error 404", Signal::NoCaptions),
];

/// Normalise typographic apostrophes so `you’re` and `you're` match alike
fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// All signals present in the text, in table order, without duplicates
pub fn classify(text: &str) -> Vec<Signal> {
    let lower = normalize(text);
    let mut found = Vec::new();
    for (phrase, signal) in PHRASE_TABLE {
        if lower.contains(phrase) && !found.contains(signal) {
            found.push(*signal);
        }
    }
    found
}

/// Most specific signal present in the text
pub fn primary_signal(text: &str) -> Option<Signal> {
    let lower = normalize(text);
    PHRASE_TABLE
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, signal)| *signal)
}

pub fn has_signal(text: &str, signal: Signal) -> bool {
    let lower = normalize(text);
    PHRASE_TABLE
        .iter()
        .any(|(phrase, s)| *s == signal && lower.contains(phrase))
}

/// Phrases that matched, for diagnostics
pub fn matched_phrases(text: &str) -> Vec<&'static str> {
    let lower = normalize(text);
    PHRASE_TABLE
        .iter()
        .filter(|(phrase, _)| lower.contains(phrase))
        .map(|(phrase, _)| *phrase)
        .collect()
}
