use async_trait::async_trait;

use super::{AcquisitionStrategy, ExtractionContext};
use crate::errors::TranscriptError;
use crate::parsers::SubtitleFormat;
use crate::transcript::{StrategyKind, TranscriptResult};

const TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";

/// Endpoint formats in the order they are tried
const FORMATS: [SubtitleFormat; 2] = [SubtitleFormat::Json3, SubtitleFormat::Xml];

/// Direct calls to the timedtext endpoint, per language and format
pub struct NativeTimedtextStrategy;

impl NativeTimedtextStrategy {
    pub fn new() -> Self {
        Self
    }

    fn endpoint(video_id: &str, language: &str, format: SubtitleFormat, auto_generated: bool) -> String {
        let mut url = format!(
            "{}?v={}&lang={}&fmt={}",
            TIMEDTEXT_URL,
            urlencoding::encode(video_id),
            urlencoding::encode(language),
            format.as_str()
        );
        if auto_generated {
            url.push_str("&kind=asr");
        }
        url
    }
}

impl Default for NativeTimedtextStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AcquisitionStrategy for NativeTimedtextStrategy {
    fn name(&self) -> &str {
        StrategyKind::NativeTimedtext.as_str()
    }

    async fn attempt(
        &self,
        video_id: &str,
        languages: &[String],
        ctx: &ExtractionContext,
    ) -> Result<TranscriptResult, TranscriptError> {
        let headers = ctx.anti_detection.identity_headers();
        let mut failures: Vec<String> = Vec::new();

        'endpoints: for language in languages {
            for auto_generated in [false, true] {
                for format in FORMATS {
                    let url = Self::endpoint(video_id, language, format, auto_generated);
                    tracing::debug!("timedtext {} {} (asr: {})", language, format, auto_generated);

                    let response = match ctx.http.get(&url, &headers).await {
                        Ok(response) => response,
                        Err(e) => {
                            failures.push(e.to_string());
                            continue;
                        }
                    };
                    if !response.is_success() {
                        let status = response.status_text();
                        let blocked = ctx.anti_detection.classify_block_signal(&status);
                        failures.push(status);
                        if blocked {
                            tracing::warn!("timedtext blocked for {}; skipping remaining endpoints", video_id);
                            break 'endpoints;
                        }
                        continue;
                    }
                    if response.body.trim().is_empty() {
                        continue;
                    }

                    match format.parse(&response.body) {
                        Ok(segments) if !segments.is_empty() => {
                            return Ok(TranscriptResult::new(segments, language.as_str(), self.name()));
                        }
                        Ok(_) => {}
                        Err(e) => failures.push(e.to_string()),
                    }
                }
            }
        }

        let message = if failures.is_empty() {
            format!("No captions found for languages: {}", languages.join(", "))
        } else {
            failures.last().cloned().unwrap_or_default()
        };

        Err(TranscriptError::failure(video_id, message).with_detail("endpoint_failures", failures.len()))
    }
}
