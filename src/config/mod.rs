use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transcript::StrategyKind;

/// Environment variable naming the cookie file handed to yt-dlp
pub const COOKIES_FILE_ENV: &str = "HARVESTER_COOKIES_FILE";
/// Environment variable overriding the yt-dlp binary
pub const YTDLP_PATH_ENV: &str = "HARVESTER_YTDLP_PATH";
/// Environment variable overriding the scratch directory
pub const SCRATCH_DIR_ENV: &str = "HARVESTER_SCRATCH_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Strategy chain and acceptance thresholds
    pub extraction: ExtractionConfig,

    /// Request throttling
    pub rate_limit: RateLimitConfig,

    /// Countermeasure shaping
    pub anti_detection: AntiDetectionConfig,

    /// External downloader settings
    pub tool: ToolConfig,

    /// Direct HTTP settings
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Languages tried after any explicitly requested ones
    pub languages: Vec<String>,

    /// Minimum transcript length in characters
    pub min_transcript_length: usize,

    /// Upper bound for a whole extraction
    pub overall_timeout_secs: u64,

    /// Longest rate-limit wait the orchestrator sleeps through before giving up
    pub max_gate_wait_secs: u64,

    /// Strategy method tags in priority order
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between any two requests
    pub global_min_interval_ms: u64,

    /// Sliding window used for burst accounting
    pub burst_window_ms: u64,

    /// Requests allowed inside one burst window
    pub burst_max_requests: usize,

    /// Attempts allowed per video before it cools down
    pub max_attempts_per_video: u32,

    /// Time after the last attempt at which a video's counter resets
    pub reset_window_ms: u64,

    /// Extra delay imposed on a video after a bot-detection failure
    pub bot_penalty_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiDetectionConfig {
    /// How long the minimal argument profile stays active after a block
    pub cooldown_secs: u64,

    /// Minimum time between client identity rotations
    pub rotation_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// yt-dlp binary
    pub ytdlp_path: String,

    /// Timeout for subtitle-only invocations
    pub subtitle_timeout_secs: u64,

    /// Cap on captured stdout/stderr
    pub max_buffer_bytes: usize,

    /// Netscape-format cookie file
    pub cookies_file: Option<PathBuf>,

    /// Where per-attempt scratch directories are created
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string(), "en-US".to_string(), "en-GB".to_string()],
            min_transcript_length: 250,
            overall_timeout_secs: 600,
            max_gate_wait_secs: 120,
            strategies: StrategyKind::DEFAULT_CHAIN
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_min_interval_ms: 15_000,
            burst_window_ms: 60_000,
            burst_max_requests: 2,
            max_attempts_per_video: 10,
            reset_window_ms: 3_600_000,
            bot_penalty_ms: 300_000,
        }
    }
}

impl RateLimitConfig {
    /// No throttling at all; handy for local parsing and tests
    pub fn unthrottled() -> Self {
        Self {
            global_min_interval_ms: 0,
            burst_window_ms: 0,
            burst_max_requests: usize::MAX,
            max_attempts_per_video: u32::MAX,
            reset_window_ms: 3_600_000,
            bot_penalty_ms: 0,
        }
    }
}

impl Default for AntiDetectionConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 1800,
            rotation_interval_secs: 600,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            subtitle_timeout_secs: 30,
            max_buffer_bytes: 10 * 1024 * 1024,
            cookies_file: None,
            scratch_dir: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 20 }
    }
}

impl ExtractionConfig {
    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }

    pub fn max_gate_wait(&self) -> Duration {
        Duration::from_secs(self.max_gate_wait_secs)
    }
}

impl ToolConfig {
    pub fn subtitle_timeout(&self) -> Duration {
        Duration::from_secs(self.subtitle_timeout_secs)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from the first config file found, else defaults, then apply env overrides
    pub async fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to the user config location
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::user_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get configuration file path, preferring the working directory
    pub fn config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from("harvester.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::user_config_path().ok()
    }

    fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-harvester").join("config.yaml"))
    }

    /// Apply `HARVESTER_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = non_empty_env(COOKIES_FILE_ENV) {
            self.tool.cookies_file = Some(PathBuf::from(path));
        }
        if let Some(path) = non_empty_env(YTDLP_PATH_ENV) {
            self.tool.ytdlp_path = path;
        }
        if let Some(path) = non_empty_env(SCRATCH_DIR_ENV) {
            self.tool.scratch_dir = Some(PathBuf::from(path));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extraction.strategies.is_empty() {
            anyhow::bail!("At least one extraction strategy must be enabled");
        }

        for tag in &self.extraction.strategies {
            if StrategyKind::from_tag(tag).is_none() {
                anyhow::bail!("Unknown extraction strategy '{}'", tag);
            }
        }

        if self.extraction.overall_timeout_secs == 0 {
            anyhow::bail!("extraction.overall_timeout_secs must be greater than zero");
        }

        if self.rate_limit.burst_max_requests == 0 || self.rate_limit.max_attempts_per_video == 0 {
            anyhow::bail!("Rate limit ceilings must be greater than zero");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Languages: {}", self.extraction.languages.join(", "));
        println!("  Strategies: {}", self.extraction.strategies.join(" -> "));
        println!("  Min Transcript Length: {}", self.extraction.min_transcript_length);
        println!("  Overall Timeout: {}s", self.extraction.overall_timeout_secs);
        println!(
            "  Rate Limit: {}ms spacing, {} per {}ms burst, {} attempts/video",
            self.rate_limit.global_min_interval_ms,
            self.rate_limit.burst_max_requests,
            self.rate_limit.burst_window_ms,
            self.rate_limit.max_attempts_per_video
        );
        println!("  Cooldown: {}s", self.anti_detection.cooldown_secs);
        println!("  yt-dlp: {}", self.tool.ytdlp_path);
        if let Some(cookies) = &self.tool.cookies_file {
            println!("  Cookies: {}", cookies.display());
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
