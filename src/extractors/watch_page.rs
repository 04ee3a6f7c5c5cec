//! Last-resort strategy: read the player response embedded in the public watch page.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::captions::{self, CaptionTrack};
use super::{AcquisitionStrategy, ExtractionContext};
use crate::errors::TranscriptError;
use crate::parsers::SubtitleFormat;
use crate::signals::{self, Signal};
use crate::transcript::{StrategyKind, TranscriptResult};

const WATCH_URL: &str = "https://www.youtube.com/watch";

lazy_static! {
    static ref PLAYER_RESPONSE_START: Regex =
        Regex::new(r"ytInitialPlayerResponse\s*=\s*\{").unwrap();
}

/// Locate the JSON object assigned to `ytInitialPlayerResponse` in page HTML.
///
/// Braces are matched while skipping string literals, so a `};` inside a
/// description does not cut the object short.
pub fn extract_player_response(html: &str) -> Option<Value> {
    let found = PLAYER_RESPONSE_START.find(html)?;
    let start = found.end() - 1;
    let bytes = html.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return serde_json::from_str(&html[start..end]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

pub struct WatchPageStrategy;

impl WatchPageStrategy {
    pub fn new() -> Self {
        Self
    }

    async fn fetch_track(
        &self,
        track: &CaptionTrack,
        ctx: &ExtractionContext,
        headers: &[(String, String)],
    ) -> Result<Vec<crate::transcript::Segment>, String> {
        let url = track
            .url_for(SubtitleFormat::Xml)
            .ok_or_else(|| format!("invalid caption track URL: {}", track.base_url))?;
        let response = ctx.http.get(&url, headers).await.map_err(|e| e.to_string())?;
        if !response.is_success() {
            return Err(response.status_text());
        }
        SubtitleFormat::detect(&response.body)
            .unwrap_or(SubtitleFormat::Xml)
            .parse(&response.body)
            .map_err(|e| e.to_string())
    }
}

impl Default for WatchPageStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcquisitionStrategy for WatchPageStrategy {
    fn name(&self) -> &str {
        StrategyKind::WatchPage.as_str()
    }

    async fn attempt(
        &self,
        video_id: &str,
        languages: &[String],
        ctx: &ExtractionContext,
    ) -> Result<TranscriptResult, TranscriptError> {
        let headers = ctx.anti_detection.identity_headers();
        let url = format!("{}?v={}&hl=en", WATCH_URL, urlencoding::encode(video_id));

        let page = ctx
            .http
            .get(&url, &headers)
            .await
            .map_err(|e| TranscriptError::failure(video_id, e.to_string()))?;
        if !page.is_success() {
            return Err(TranscriptError::failure(video_id, page.status_text()));
        }

        let Some(player) = extract_player_response(&page.body) else {
            let message = if signals::has_signal(&page.body, Signal::BotDetection) {
                "Watch page served a captcha: unusual traffic from your network"
            } else {
                "Could not find ytInitialPlayerResponse in the watch page"
            };
            return Err(TranscriptError::failure(video_id, message));
        };

        let info = captions::parse_player_response(&player);
        if !info.playability.is_ok() {
            return Err(TranscriptError::failure(video_id, info.playability.describe())
                .with_detail("playability", &info.playability.status));
        }

        let tracks = match info.tracks {
            Some(tracks) if !tracks.is_empty() => tracks,
            _ => {
                return Err(TranscriptError::Disabled {
                    video_id: video_id.to_string(),
                    attempted: vec![self.name().to_string()],
                    message: "Transcripts are disabled for this video".to_string(),
                })
            }
        };

        let mut last_failure = String::from("No caption track matched the requested languages");
        let mut tried: Vec<&str> = Vec::new();
        for language in languages {
            let Some(track) = captions::select_for_language(&tracks, language) else {
                continue;
            };
            if tried.contains(&track.base_url.as_str()) {
                continue;
            }
            tried.push(track.base_url.as_str());

            match self.fetch_track(track, ctx, &headers).await {
                Ok(segments) if !segments.is_empty() => {
                    return Ok(TranscriptResult::new(segments, track.language_code.as_str(), self.name()));
                }
                Ok(_) => tracing::debug!("watch_page: {} track was empty", language),
                Err(e) => last_failure = e,
            }
        }

        let first = &tracks[0];
        if tried.contains(&first.base_url.as_str()) {
            return Err(TranscriptError::failure(video_id, last_failure));
        }

        tracing::debug!("watch_page: falling back to first track ({})", first.language_code);
        match self.fetch_track(first, ctx, &headers).await {
            Ok(segments) if !segments.is_empty() => {
                Ok(TranscriptResult::new(segments, first.language_code.as_str(), self.name()))
            }
            Ok(_) => Err(TranscriptError::failure(video_id, last_failure)),
            Err(e) => Err(TranscriptError::failure(video_id, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::extractors::test_support::{context, langs};
    use crate::http::{HttpResponse, MockHttpTransport};
    use crate::tool::MockExternalToolAdapter;

    fn page(player: &str) -> String {
        format!(
            "<html><script>var ytInitialPlayerResponse = {};var meta = {{}};</script></html>",
            player
        )
    }

    #[test]
    fn test_extract_handles_braces_in_strings() {
        let html = page(r#"{"videoDetails":{"shortDescription":"use }; carefully \" {"},"playabilityStatus":{"status":"OK"}}"#);
        let value = extract_player_response(&html).unwrap();
        assert_eq!(value["playabilityStatus"]["status"], "OK");
        assert!(extract_player_response("<html>nothing here</html>").is_none());
    }

    #[tokio::test]
    async fn test_playable_without_captions_is_disabled() {
        let mut http = MockHttpTransport::new();
        http.expect_get().times(1).returning(|_, _| {
            Ok(HttpResponse {
                status: 200,
                body: page(r#"{"playabilityStatus":{"status":"OK"},"videoDetails":{"videoId":"dQw4w9WgXcQ"}}"#),
            })
        });

        let ctx = context(http, MockExternalToolAdapter::new());
        let err = WatchPageStrategy::new()
            .attempt("dQw4w9WgXcQ", &langs(&["en"]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptDisabled);
    }

    #[tokio::test]
    async fn test_uses_first_track_when_no_language_matches() {
        let mut http = MockHttpTransport::new();
        http.expect_get()
            .withf(|url, _| url.contains("/watch?v="))
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: page(
                        r#"{"playabilityStatus":{"status":"OK"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"/api/timedtext?v=dQw4w9WgXcQ&lang=ja","languageCode":"ja"}]}}}"#,
                    ),
                })
            });
        http.expect_get()
            .withf(|url, _| url.contains("/api/timedtext") && url.contains("lang=ja"))
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: r#"<transcript><text start="0" dur="1.5">konnichiwa minna</text></transcript>"#.to_string(),
                })
            });

        let ctx = context(http, MockExternalToolAdapter::new());
        let result = WatchPageStrategy::new()
            .attempt("dQw4w9WgXcQ", &langs(&["en", "id"]), &ctx)
            .await
            .unwrap();
        assert_eq!(result.language, "ja");
        assert_eq!(result.method, "watch_page");
    }

    #[tokio::test]
    async fn test_captcha_page_is_bot_signal() {
        let mut http = MockHttpTransport::new();
        http.expect_get().returning(|_, _| {
            Ok(HttpResponse {
                status: 200,
                body: "<html>Our systems have detected unusual traffic from your computer network.</html>".to_string(),
            })
        });

        let ctx = context(http, MockExternalToolAdapter::new());
        let err = WatchPageStrategy::new()
            .attempt("dQw4w9WgXcQ", &langs(&["en"]), &ctx)
            .await
            .unwrap_err();
        assert!(ctx.anti_detection.classify_block_signal(&err.diagnostic_text()));
    }

    #[tokio::test]
    async fn test_failed_track_is_fetched_once() {
        let mut http = MockHttpTransport::new();
        http.expect_get()
            .withf(|url, _| url.contains("/watch?v="))
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 200,
                    body: page(
                        r#"{"playabilityStatus":{"status":"OK"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"/api/timedtext?v=dQw4w9WgXcQ&lang=en","languageCode":"en"}]}}}"#,
                    ),
                })
            });
        http.expect_get()
            .withf(|url, _| url.contains("/api/timedtext"))
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                })
            });

        let ctx = context(http, MockExternalToolAdapter::new());
        let err = WatchPageStrategy::new()
            .attempt("dQw4w9WgXcQ", &langs(&["en", "en-US", "en-GB"]), &ctx)
            .await
            .unwrap_err();
        assert!(err.diagnostic_text().contains("404"));
    }
}
