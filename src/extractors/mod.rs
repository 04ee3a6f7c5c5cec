use async_trait::async_trait;
use std::sync::Arc;

pub mod captions;
pub mod native;
pub mod player_api;
pub mod watch_page;
pub mod ytdlp;

use crate::anti_detection::AntiDetectionPolicy;
use crate::config::Config;
use crate::errors::TranscriptError;
use crate::http::{HttpTransport, ReqwestTransport};
use crate::rate_limit::RateLimiter;
use crate::tool::{CookieFile, ExternalToolAdapter, YtDlpAdapter};
use crate::transcript::{StrategyKind, TranscriptResult};
use crate::Result;

/// Per-call extraction options
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Languages to try first, in preference order
    pub languages: Vec<String>,

    /// Overrides the configured minimum transcript length
    pub min_length: Option<usize>,
}

/// Shared collaborators handed to every strategy.
///
/// The rate limiter and anti-detection policy are process-wide state; build
/// one context and share it between extractions.
pub struct ExtractionContext {
    pub config: Config,
    pub rate_limiter: Arc<RateLimiter>,
    pub anti_detection: Arc<AntiDetectionPolicy>,
    pub http: Arc<dyn HttpTransport>,
    pub tool: Arc<dyn ExternalToolAdapter>,
}

impl ExtractionContext {
    /// Build a context with the real HTTP transport and yt-dlp adapter
    pub fn new(config: Config) -> Result<Self> {
        let http = Arc::new(ReqwestTransport::new(config.http.timeout())?);
        let cookies = CookieFile::load_optional(config.tool.cookies_file.as_deref());
        let tool = Arc::new(YtDlpAdapter::new(config.tool.ytdlp_path.clone()).with_cookies(cookies));
        Ok(Self::with_parts(config, http, tool))
    }

    /// Build a context around caller-supplied transports
    pub fn with_parts(
        config: Config,
        http: Arc<dyn HttpTransport>,
        tool: Arc<dyn ExternalToolAdapter>,
    ) -> Self {
        Self {
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            anti_detection: Arc::new(AntiDetectionPolicy::new(&config.anti_detection)),
            config,
            http,
            tool,
        }
    }

    /// Requested languages followed by the configured defaults, without duplicates
    pub fn preferred_languages(&self, options: &ExtractOptions) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for lang in options.languages.iter().chain(self.config.extraction.languages.iter()) {
            let lang = lang.trim();
            if !lang.is_empty() && !languages.iter().any(|l| l.eq_ignore_ascii_case(lang)) {
                languages.push(lang.to_string());
            }
        }
        languages
    }
}

/// One independent way of acquiring captions for a video
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Method tag reported on results
    fn name(&self) -> &str;

    /// Try to produce a transcript for `video_id`
    async fn attempt(
        &self,
        video_id: &str,
        languages: &[String],
        ctx: &ExtractionContext,
    ) -> std::result::Result<TranscriptResult, TranscriptError>;
}

/// Built-in strategy for a method tag
pub fn strategy_for(kind: StrategyKind) -> Box<dyn AcquisitionStrategy> {
    match kind {
        StrategyKind::NativeTimedtext => Box::new(native::NativeTimedtextStrategy::new()),
        StrategyKind::PlayerApi => Box::new(player_api::PlayerApiStrategy::new()),
        StrategyKind::YtDlpWeb => Box::new(ytdlp::YtDlpStrategy::new(ytdlp::ClientProfile::Web)),
        StrategyKind::YtDlpAndroid => Box::new(ytdlp::YtDlpStrategy::new(ytdlp::ClientProfile::Android)),
        StrategyKind::YtDlpIos => Box::new(ytdlp::YtDlpStrategy::new(ytdlp::ClientProfile::Ios)),
        StrategyKind::YtDlpEmbedded => Box::new(ytdlp::YtDlpStrategy::new(ytdlp::ClientProfile::Embedded)),
        StrategyKind::WatchPage => Box::new(watch_page::WatchPageStrategy::new()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::http::MockHttpTransport;
    use crate::tool::MockExternalToolAdapter;

    pub fn context(http: MockHttpTransport, tool: MockExternalToolAdapter) -> ExtractionContext {
        let mut config = Config::default();
        config.rate_limit = RateLimitConfig::unthrottled();
        ExtractionContext::with_parts(config, Arc::new(http), Arc::new(tool))
    }

    pub fn langs(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }
}
