//! Runs the strategy chain for one video, first accepted result wins.

use std::sync::Arc;
use tokio::time::Instant;

use crate::errors::TranscriptError;
use crate::extractors::{self, AcquisitionStrategy, ExtractOptions, ExtractionContext};
use crate::rate_limit::{GateScope, RateLimitReason};
use crate::signals::Signal;
use crate::transcript::{StrategyKind, TranscriptResult};
use crate::utils;
use crate::validator;

const OVERALL_TIMEOUT_MESSAGE: &str = "overall timeout elapsed";

pub struct ExtractionOrchestrator {
    ctx: Arc<ExtractionContext>,
    strategies: Vec<Box<dyn AcquisitionStrategy>>,
}

impl ExtractionOrchestrator {
    /// Empty chain; add strategies with [`register`](Self::register)
    pub fn new(ctx: Arc<ExtractionContext>) -> Self {
        Self {
            ctx,
            strategies: Vec::new(),
        }
    }

    /// Chain built from the configured strategy tags
    pub fn with_default_chain(ctx: Arc<ExtractionContext>) -> Self {
        let mut orchestrator = Self::new(ctx);
        let kinds: Vec<StrategyKind> = orchestrator
            .ctx
            .config
            .extraction
            .strategies
            .iter()
            .filter_map(|tag| StrategyKind::from_tag(tag))
            .collect();
        for kind in kinds {
            orchestrator.register(extractors::strategy_for(kind));
        }
        orchestrator
    }

    /// Append a strategy at the lowest priority
    pub fn register(&mut self, strategy: Box<dyn AcquisitionStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn context(&self) -> &ExtractionContext {
        &self.ctx
    }

    /// Acquire a validated transcript for `video`, a bare id or a watch URL
    pub async fn extract(&self, video: &str, options: &ExtractOptions) -> Result<TranscriptResult, TranscriptError> {
        let video_id = utils::extract_video_id(video).ok_or_else(|| {
            TranscriptError::failure(video, "Not a valid video id or URL").with_detail("input", video)
        })?;
        let video_id = video_id.as_str();

        let languages = self.ctx.preferred_languages(options);
        let min_length = options
            .min_length
            .unwrap_or(self.ctx.config.extraction.min_transcript_length);
        let deadline = Instant::now() + self.ctx.config.extraction.overall_timeout();
        let max_gate_wait = self.ctx.config.extraction.max_gate_wait();

        let mut attempted: Vec<String> = Vec::new();
        let mut last_error: Option<String> = None;

        tracing::info!(
            "Extracting transcript for {} ({} strategies, languages: {})",
            video_id,
            self.strategies.len(),
            languages.join(",")
        );

        for (position, strategy) in self.strategies.iter().enumerate() {
            let name = strategy.name().to_string();
            // Per-video ceiling and penalties are judged once per extraction.
            let scope = if position == 0 {
                GateScope::Full
            } else {
                GateScope::Shared
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(video_id, attempted));
            }

            if let Err(decision) = self
                .ctx
                .rate_limiter
                .acquire(video_id, &name, scope, max_gate_wait.min(remaining))
                .await
            {
                tracing::warn!("Rate limited before {} for {}: {:?}", name, video_id, decision.reason);
                return Err(TranscriptError::RateLimited {
                    video_id: video_id.to_string(),
                    reason: decision.reason.unwrap_or(RateLimitReason::GlobalRateLimit),
                    wait_time: decision.wait_time,
                });
            }

            attempted.push(name.clone());
            tracing::info!("Trying {} for {}", name, video_id);

            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = match tokio::time::timeout(remaining, strategy.attempt(video_id, &languages, &self.ctx)).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(self.timed_out(video_id, attempted)),
            };

            match outcome {
                Ok(result) => match validator::validate(&result, video_id, min_length) {
                    Ok(report) => {
                        tracing::info!(
                            "{} succeeded for {}: {} segments, {} chars",
                            name,
                            video_id,
                            result.segments.len(),
                            report.total_length
                        );
                        return Ok(result);
                    }
                    Err(rejection) => {
                        tracing::warn!("{} result rejected: {}", name, rejection);
                        last_error = Some(rejection.to_string());
                    }
                },
                Err(err) => {
                    let text = err.diagnostic_text();
                    tracing::warn!("{} failed for {}: {}", name, video_id, text.lines().next().unwrap_or(""));

                    if self.ctx.anti_detection.classify_block_signal(&text) {
                        self.ctx.anti_detection.record_block();
                        self.ctx.rate_limiter.record_failure(video_id, &text);
                    }

                    if matches!(err, TranscriptError::Disabled { .. }) || validator::is_disabled_error(&text) {
                        return Err(TranscriptError::Disabled {
                            video_id: video_id.to_string(),
                            attempted,
                            message: text,
                        });
                    }

                    if validator::is_unavailable_error(&text) {
                        return Err(TranscriptError::NotFound {
                            video_id: video_id.to_string(),
                            attempted,
                            last_error: Some(text),
                            reason: Some(Signal::VideoUnavailable.as_str().to_string()),
                        });
                    }

                    last_error = Some(text);
                }
            }
        }

        tracing::warn!("All strategies exhausted for {}", video_id);
        Err(TranscriptError::NotFound {
            video_id: video_id.to_string(),
            attempted,
            last_error,
            reason: None,
        })
    }

    fn timed_out(&self, video_id: &str, attempted: Vec<String>) -> TranscriptError {
        tracing::warn!("Overall timeout elapsed for {}", video_id);
        TranscriptError::NotFound {
            video_id: video_id.to_string(),
            attempted,
            last_error: Some(OVERALL_TIMEOUT_MESSAGE.to_string()),
            reason: Some(Signal::Timeout.as_str().to_string()),
        }
    }
}
