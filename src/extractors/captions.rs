//! Caption track model shared by the player-API and watch-page strategies.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::parsers::SubtitleFormat;

const BASE: &str = "https://www.youtube.com";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub vss_id: Option<String>,
}

impl CaptionTrack {
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    /// Track URL asking for a specific wire format
    pub fn url_for(&self, format: SubtitleFormat) -> Option<String> {
        track_url(&self.base_url, format)
    }
}

/// Playability verdict from a player response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playability {
    pub status: String,
    pub reason: Option<String>,
}

impl Playability {
    pub fn is_ok(&self) -> bool {
        self.status == "OK"
    }

    /// Status and reason as one line, fed to phrase classification
    pub fn describe(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{}: {}", self.status, reason),
            None => self.status.clone(),
        }
    }
}

/// The parts of a player response the strategies care about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub playability: Playability,
    /// `None` when the response has no captions block at all
    pub tracks: Option<Vec<CaptionTrack>>,
}

/// Extract playability and caption tracks from a player response object
pub fn parse_player_response(value: &Value) -> PlayerInfo {
    let status = &value["playabilityStatus"];
    let playability = Playability {
        status: status["status"].as_str().unwrap_or("UNKNOWN").to_string(),
        reason: status["reason"]
            .as_str()
            .or_else(|| status["messages"][0].as_str())
            .map(str::to_string),
    };

    let tracks = value
        .get("captions")
        .map(|captions| &captions["playerCaptionsTracklistRenderer"]["captionTracks"])
        .map(|tracks| {
            serde_json::from_value::<Vec<CaptionTrack>>(tracks.clone()).unwrap_or_default()
        });

    PlayerInfo { playability, tracks }
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Best track for a single language: exact before primary-subtag match, manual before asr
pub fn select_for_language<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let exact = |t: &&CaptionTrack| t.language_code.eq_ignore_ascii_case(language);
    let loose = |t: &&CaptionTrack| {
        primary_subtag(&t.language_code).eq_ignore_ascii_case(primary_subtag(language))
    };

    tracks
        .iter()
        .filter(exact)
        .find(|t| !t.is_auto_generated())
        .or_else(|| tracks.iter().filter(exact).find(|t| t.is_auto_generated()))
        .or_else(|| tracks.iter().filter(loose).find(|t| !t.is_auto_generated()))
        .or_else(|| tracks.iter().find(loose))
}

/// First track matching the language list in order
pub fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    languages
        .iter()
        .find_map(|language| select_for_language(tracks, language))
}

/// Rewrite a track base URL to request `format`
pub fn track_url(base_url: &str, format: SubtitleFormat) -> Option<String> {
    let base = Url::parse(BASE).ok()?;
    let mut url = base.join(base_url).ok()?;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("fmt", format.as_str());

    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track(lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            base_url: format!("https://www.youtube.com/api/timedtext?v=x&lang={}", lang),
            language_code: lang.to_string(),
            kind: kind.map(str::to_string),
            vss_id: None,
        }
    }

    #[test]
    fn test_manual_preferred_over_asr() {
        let tracks = vec![track("en", Some("asr")), track("en", None)];
        let chosen = select_for_language(&tracks, "en").unwrap();
        assert!(!chosen.is_auto_generated());
    }

    #[test]
    fn test_exact_before_primary_subtag() {
        let tracks = vec![track("en-GB", None), track("en-US", None)];
        assert_eq!(select_for_language(&tracks, "en-US").unwrap().language_code, "en-US");
        assert_eq!(select_for_language(&tracks, "en").unwrap().language_code, "en-GB");
        assert!(select_for_language(&tracks, "de").is_none());
    }

    #[test]
    fn test_language_order_respected() {
        let tracks = vec![track("en", None), track("id", None)];
        let langs = vec!["id".to_string(), "en".to_string()];
        assert_eq!(select_track(&tracks, &langs).unwrap().language_code, "id");
    }

    #[test]
    fn test_track_url_replaces_format() {
        let url = track_url("/api/timedtext?v=abc&lang=en&fmt=srv3", SubtitleFormat::Json3).unwrap();
        assert!(url.starts_with("https://www.youtube.com/api/timedtext?"));
        assert!(url.contains("v=abc"));
        assert!(url.ends_with("fmt=json3"));
        assert!(!url.contains("srv3"));
    }

    #[test]
    fn test_parse_player_response() {
        let value = json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://www.youtube.com/api/timedtext?v=abc&lang=en", "languageCode": "en", "kind": "asr", "vssId": "a.en"}
            ]}}
        });
        let info = parse_player_response(&value);
        assert!(info.playability.is_ok());
        let tracks = info.tracks.unwrap();
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].is_auto_generated());

        let no_captions = parse_player_response(&json!({
            "playabilityStatus": {"status": "LOGIN_REQUIRED", "reason": "This video is private"}
        }));
        assert!(no_captions.tracks.is_none());
        assert_eq!(no_captions.playability.describe(), "LOGIN_REQUIRED: This video is private");
    }
}
