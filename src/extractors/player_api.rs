use async_trait::async_trait;
use serde_json::{json, Value};

use super::captions::{self, CaptionTrack};
use super::{AcquisitionStrategy, ExtractionContext};
use crate::errors::TranscriptError;
use crate::parsers::SubtitleFormat;
use crate::transcript::{StrategyKind, TranscriptResult};

const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player?prettyPrint=false";

const CLIENT_NAME: &str = "ANDROID";
const CLIENT_VERSION: &str = "19.09.37";
const ANDROID_SDK_VERSION: u32 = 30;

/// Emulates the Android client's player handshake to discover caption tracks
pub struct PlayerApiStrategy;

impl PlayerApiStrategy {
    pub fn new() -> Self {
        Self
    }

    fn request_body(video_id: &str) -> Value {
        json!({
            "context": {
                "client": {
                    "clientName": CLIENT_NAME,
                    "clientVersion": CLIENT_VERSION,
                    "androidSdkVersion": ANDROID_SDK_VERSION,
                    "hl": "en",
                    "gl": "US"
                }
            },
            "videoId": video_id,
            "contentCheckOk": true,
            "racyCheckOk": true
        })
    }

    async fn fetch_track(
        &self,
        video_id: &str,
        track: &CaptionTrack,
        ctx: &ExtractionContext,
        headers: &[(String, String)],
    ) -> Result<TranscriptResult, TranscriptError> {
        let mut last_failure = String::from("caption track returned no segments");

        for format in [SubtitleFormat::Json3, SubtitleFormat::Xml] {
            let Some(url) = track.url_for(format) else {
                last_failure = format!("invalid caption track URL: {}", track.base_url);
                break;
            };

            match ctx.http.get(&url, headers).await {
                Ok(response) if response.is_success() => match format.parse(&response.body) {
                    Ok(segments) if !segments.is_empty() => {
                        return Ok(TranscriptResult::new(
                            segments,
                            track.language_code.as_str(),
                            self.name(),
                        ));
                    }
                    Ok(_) => {}
                    Err(e) => last_failure = e.to_string(),
                },
                Ok(response) => last_failure = response.status_text(),
                Err(e) => last_failure = e.to_string(),
            }
        }

        Err(TranscriptError::failure(video_id, last_failure).with_detail("track", &track.language_code))
    }
}

impl Default for PlayerApiStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcquisitionStrategy for PlayerApiStrategy {
    fn name(&self) -> &str {
        StrategyKind::PlayerApi.as_str()
    }

    async fn attempt(
        &self,
        video_id: &str,
        languages: &[String],
        ctx: &ExtractionContext,
    ) -> Result<TranscriptResult, TranscriptError> {
        let mut headers = ctx.anti_detection.identity_headers();
        headers.push(("X-Youtube-Client-Name".to_string(), "3".to_string()));
        headers.push(("X-Youtube-Client-Version".to_string(), CLIENT_VERSION.to_string()));

        let response = ctx
            .http
            .post_json(PLAYER_URL, &headers, &Self::request_body(video_id))
            .await
            .map_err(|e| TranscriptError::failure(video_id, e.to_string()))?;

        if !response.is_success() {
            return Err(TranscriptError::failure(video_id, response.status_text())
                .with_detail("status", response.status));
        }

        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| TranscriptError::failure(video_id, format!("invalid player response: {}", e)))?;
        let info = captions::parse_player_response(&value);

        if !info.playability.is_ok() {
            return Err(TranscriptError::failure(video_id, info.playability.describe())
                .with_detail("playability", &info.playability.status));
        }

        // The android client omits the captions block for some playable videos
        let tracks = info.tracks.unwrap_or_default();
        if tracks.is_empty() {
            return Err(TranscriptError::failure(video_id, "No caption tracks in player response"));
        }

        let track = captions::select_track(&tracks, languages).unwrap_or(&tracks[0]);
        tracing::debug!(
            "player_api selected {} track{}",
            track.language_code,
            if track.is_auto_generated() { " (asr)" } else { "" }
        );

        self.fetch_track(video_id, track, ctx, &headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::test_support::{context, langs};
    use crate::http::{HttpResponse, MockHttpTransport};
    use crate::tool::MockExternalToolAdapter;

    fn player_response(tracks: &str) -> String {
        format!(
            r#"{{"playabilityStatus":{{"status":"OK"}},"captions":{{"playerCaptionsTracklistRenderer":{{"captionTracks":{}}}}}}}"#,
            tracks
        )
    }

    const SRV1: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
        <text start="0.5" dur="2.1">first caption line</text>
        <text start="2.6" dur="1.9">second &amp;amp; last</text>
    </transcript>"#;

    #[tokio::test]
    async fn test_falls_back_to_xml_track() {
        let mut http = MockHttpTransport::new();
        http.expect_post_json()
            .withf(|url, _, body| url.starts_with(PLAYER_URL) && body["videoId"] == "dQw4w9WgXcQ")
            .returning(|_, _, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: player_response(
                        r#"[{"baseUrl":"https://www.youtube.com/api/timedtext?v=dQw4w9WgXcQ&lang=en","languageCode":"en","kind":"asr"},
                            {"baseUrl":"https://www.youtube.com/api/timedtext?v=dQw4w9WgXcQ&lang=fr","languageCode":"fr"}]"#,
                    ),
                })
            });
        http.expect_get()
            .withf(|url, _| url.contains("lang=fr") && url.contains("fmt=json3"))
            .returning(|_, _| Ok(HttpResponse { status: 404, body: String::new() }));
        http.expect_get()
            .withf(|url, _| url.contains("lang=fr") && url.contains("fmt=srv1"))
            .returning(|_, _| Ok(HttpResponse { status: 200, body: SRV1.to_string() }));

        let ctx = context(http, MockExternalToolAdapter::new());
        let result = PlayerApiStrategy::new()
            .attempt("dQw4w9WgXcQ", &langs(&["fr", "en"]), &ctx)
            .await
            .unwrap();

        assert_eq!(result.language, "fr");
        assert_eq!(result.method, "player_api");
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].text, "first caption line");
    }

    #[tokio::test]
    async fn test_unplayable_reports_reason() {
        let mut http = MockHttpTransport::new();
        http.expect_post_json().returning(|_, _, _| {
            Ok(HttpResponse {
                status: 200,
                body: r#"{"playabilityStatus":{"status":"ERROR","reason":"Video unavailable"}}"#.to_string(),
            })
        });

        let ctx = context(http, MockExternalToolAdapter::new());
        let err = PlayerApiStrategy::new()
            .attempt("dQw4w9WgXcQ", &langs(&["en"]), &ctx)
            .await
            .unwrap_err();

        assert!(crate::validator::is_unavailable_error(&err.diagnostic_text()));
        assert_eq!(err.details().get("playability").map(String::as_str), Some("ERROR"));
    }
}
