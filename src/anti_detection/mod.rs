//! Client identity rotation and countermeasure shaping.
//!
//! After the platform pushes back (bot challenge, 429, 403) the policy enters a
//! cooldown during which requests go out with a minimal argument profile and
//! no identity overrides. Identities rotate on a fixed interval, never per call.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Mutex, MutexGuard};

use crate::config::AntiDetectionConfig;
use crate::signals;

/// One plausible desktop browser identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
}

pub const IDENTITY_POOL: &[ClientIdentity] = &[
    ClientIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.9",
    },
    ClientIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        accept_language: "en-US,en;q=0.8",
    },
    ClientIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
        accept_language: "en-US,en;q=0.5",
    },
    ClientIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
        accept_language: "en-GB,en;q=0.9",
    },
    ClientIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        accept_language: "en-US,en;q=0.9",
    },
];

/// Options that override the request identity; removed while cooling down
const IDENTITY_FLAGS: &[&str] = &["--user-agent", "--add-header", "--referer", "--impersonate"];

/// Snapshot of the shared countermeasure state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AntiDetectionState {
    pub last_block: Option<DateTime<Utc>>,
    pub rotation_index: usize,
    pub last_rotation: Option<DateTime<Utc>>,
}

pub struct AntiDetectionPolicy {
    cooldown: ChronoDuration,
    rotation_interval: ChronoDuration,
    state: Mutex<AntiDetectionState>,
}

impl AntiDetectionPolicy {
    pub fn new(config: &AntiDetectionConfig) -> Self {
        Self {
            cooldown: ChronoDuration::seconds(config.cooldown_secs as i64),
            rotation_interval: ChronoDuration::seconds(config.rotation_interval_secs as i64),
            state: Mutex::new(AntiDetectionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AntiDetectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> AntiDetectionState {
        self.lock().clone()
    }

    pub fn is_in_cooldown(&self) -> bool {
        self.is_in_cooldown_at(Utc::now())
    }

    pub fn is_in_cooldown_at(&self, now: DateTime<Utc>) -> bool {
        self.lock()
            .last_block
            .map_or(false, |blocked| now - blocked < self.cooldown)
    }

    /// Enter cooldown after the remote side blocked a request
    pub fn record_block(&self) {
        self.record_block_at(Utc::now());
    }

    pub fn record_block_at(&self, now: DateTime<Utc>) {
        self.lock().last_block = Some(now);
        tracing::warn!(
            "Adversarial block recorded; minimal request profile for {}s",
            self.cooldown.num_seconds()
        );
    }

    /// Whether failure text carries a block signal
    pub fn classify_block_signal(&self, error_text: &str) -> bool {
        signals::classify(error_text).iter().any(|signal| signal.is_block())
    }

    /// Active identity, rotating only once the rotation interval has elapsed
    pub fn current_identity(&self) -> ClientIdentity {
        self.current_identity_at(Utc::now())
    }

    pub fn current_identity_at(&self, now: DateTime<Utc>) -> ClientIdentity {
        let mut state = self.lock();
        match state.last_rotation {
            None => state.last_rotation = Some(now),
            Some(last) if now - last >= self.rotation_interval => {
                state.rotation_index = (state.rotation_index + 1) % IDENTITY_POOL.len();
                state.last_rotation = Some(now);
            }
            Some(_) => {}
        }
        IDENTITY_POOL[state.rotation_index % IDENTITY_POOL.len()]
    }

    /// Header overrides for direct HTTP requests; empty while cooling down
    pub fn identity_headers(&self) -> Vec<(String, String)> {
        self.identity_headers_at(Utc::now())
    }

    pub fn identity_headers_at(&self, now: DateTime<Utc>) -> Vec<(String, String)> {
        if self.is_in_cooldown_at(now) {
            return Vec::new();
        }
        let identity = self.current_identity_at(now);
        vec![
            ("User-Agent".to_string(), identity.user_agent.to_string()),
            ("Accept-Language".to_string(), identity.accept_language.to_string()),
        ]
    }

    /// Enrich (or, in cooldown, strip down) an external-tool argument list
    pub fn shape_arguments(&self, base_args: &[String], subject: &str) -> Vec<String> {
        self.shape_arguments_at(base_args, subject, Utc::now())
    }

    pub fn shape_arguments_at(&self, base_args: &[String], subject: &str, now: DateTime<Utc>) -> Vec<String> {
        if self.is_in_cooldown_at(now) {
            tracing::debug!("Cooldown active; minimal argument profile for {}", subject);
            let mut args = strip_identity_flags(base_args);
            args.extend(
                ["--socket-timeout", "15", "--retries", "1"]
                    .iter()
                    .map(|s| s.to_string()),
            );
            return args;
        }

        let identity = self.current_identity_at(now);
        let mut args = base_args.to_vec();
        args.extend([
            "--user-agent".to_string(),
            identity.user_agent.to_string(),
            "--add-header".to_string(),
            format!("Accept-Language:{}", identity.accept_language),
            "--referer".to_string(),
            "https://www.youtube.com/".to_string(),
            "--retries".to_string(),
            "3".to_string(),
            "--extractor-retries".to_string(),
            "3".to_string(),
            "--retry-sleep".to_string(),
            "exp=1:20".to_string(),
            "--sleep-requests".to_string(),
            "1".to_string(),
            "--sleep-subtitles".to_string(),
            "2".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--geo-bypass".to_string(),
        ]);
        args
    }
}

fn strip_identity_flags(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if IDENTITY_FLAGS.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if IDENTITY_FLAGS.iter().any(|flag| arg.starts_with(&format!("{}=", flag))) {
            continue;
        }
        out.push(arg.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn policy() -> AntiDetectionPolicy {
        AntiDetectionPolicy::new(&AntiDetectionConfig {
            cooldown_secs: 1800,
            rotation_interval_secs: 600,
        })
    }

    fn base() -> Vec<String> {
        ["--skip-download", "--user-agent", "custom/1.0", "--add-header=X-Test:1", "--write-subs"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_identity_rotates_only_after_interval() {
        let policy = policy();
        let first = policy.current_identity_at(t0());
        assert_eq!(policy.current_identity_at(t0() + ChronoDuration::seconds(599)), first);

        let second = policy.current_identity_at(t0() + ChronoDuration::seconds(600));
        assert_ne!(second, first);
        assert_eq!(policy.state().rotation_index, 1);
        assert_eq!(policy.current_identity_at(t0() + ChronoDuration::seconds(900)), second);
    }

    #[test]
    fn test_cooldown_window() {
        let policy = policy();
        assert!(!policy.is_in_cooldown_at(t0()));

        policy.record_block_at(t0());
        assert!(policy.is_in_cooldown_at(t0() + ChronoDuration::seconds(1799)));
        assert!(!policy.is_in_cooldown_at(t0() + ChronoDuration::seconds(1800)));
    }

    #[test]
    fn test_full_profile_outside_cooldown() {
        let policy = policy();
        let args = policy.shape_arguments_at(&base(), "vid", t0());
        assert!(args.starts_with(&base()));
        assert!(args.contains(&"--geo-bypass".to_string()));
        assert!(args.contains(&"--retry-sleep".to_string()));
        let ua_pos = args.iter().rposition(|a| a == "--user-agent").unwrap();
        assert_eq!(args[ua_pos + 1], IDENTITY_POOL[0].user_agent);
    }

    #[test]
    fn test_minimal_profile_in_cooldown() {
        let policy = policy();
        policy.record_block_at(t0());

        let args = policy.shape_arguments_at(&base(), "vid", t0() + ChronoDuration::seconds(5));
        assert!(!args.iter().any(|a| a.starts_with("--user-agent") || a.starts_with("--add-header")));
        assert!(!args.contains(&"custom/1.0".to_string()));
        assert!(args.contains(&"--skip-download".to_string()));
        assert!(args.contains(&"--write-subs".to_string()));
        assert!(!args.contains(&"--geo-bypass".to_string()));
        assert!(policy.identity_headers_at(t0() + ChronoDuration::seconds(5)).is_empty());
    }

    #[test]
    fn test_block_signal_classification() {
        let policy = policy();
        assert!(policy.classify_block_signal("Sign in to confirm you\u{2019}re not a bot"));
        assert!(policy.classify_block_signal("HTTP Error 429: Too Many Requests"));
        assert!(policy.classify_block_signal("ACCESS DENIED"));
        assert!(!policy.classify_block_signal("There are no subtitles for the requested languages"));
    }
}
