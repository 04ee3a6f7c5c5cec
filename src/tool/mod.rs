//! External downloader invocation.
//!
//! Strategies only see [`ExternalToolAdapter`]; the real implementation runs
//! yt-dlp as a child process with a hard timeout and a cap on captured output.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

pub mod cookies;

pub use cookies::CookieFile;

/// Per-invocation limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOptions {
    pub timeout: Duration,
    pub max_buffer_bytes: usize,
    pub use_cookies: bool,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_buffer_bytes: 10 * 1024 * 1024,
            use_cookies: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(thiserror::Error, Debug, Clone)]
pub enum ToolError {
    #[error("Failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with code {exit_code}: {}", .stderr.trim())]
    NonZeroExit {
        program: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("{program} output exceeded {limit} bytes")]
    BufferExceeded { program: String, limit: usize },
}

impl ToolError {
    /// Captured stderr, when the process got far enough to produce any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ToolError::NonZeroExit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Message plus stderr, the text phrase classification runs against
    pub fn diagnostic_text(&self) -> String {
        match self {
            ToolError::NonZeroExit { stdout, stderr, .. } if stderr.trim().is_empty() => {
                format!("{} {}", self, stdout.trim())
            }
            ToolError::NonZeroExit { stderr, .. } => format!("{}\n{}", self, stderr),
            other => other.to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExternalToolAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Run the tool with `argv` (program excluded)
    async fn execute(&self, argv: &[String], options: &ToolOptions) -> Result<ToolOutput, ToolError>;
}

/// yt-dlp child-process adapter
pub struct YtDlpAdapter {
    program: String,
    cookies: Option<CookieFile>,
}

impl YtDlpAdapter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cookies: None,
        }
    }

    pub fn with_cookies(mut self, cookies: Option<CookieFile>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn has_cookies(&self) -> bool {
        self.cookies.is_some()
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        let options = ToolOptions {
            timeout: Duration::from_secs(10),
            max_buffer_bytes: 64 * 1024,
            use_cookies: false,
        };
        self.execute(&["--version".to_string()], &options).await.is_ok()
    }

    fn full_args(&self, argv: &[String], options: &ToolOptions) -> Vec<String> {
        let mut args = Vec::with_capacity(argv.len() + 2);
        if options.use_cookies {
            if let Some(cookies) = &self.cookies {
                args.push("--cookies".to_string());
                args.push(cookies.path().to_string_lossy().into_owned());
            }
        }
        args.extend(argv.iter().cloned());
        args
    }
}

#[async_trait]
impl ExternalToolAdapter for YtDlpAdapter {
    fn name(&self) -> &str {
        &self.program
    }

    async fn execute(&self, argv: &[String], options: &ToolOptions) -> Result<ToolOutput, ToolError> {
        let args = self.full_args(argv, options);
        tracing::debug!("Running {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        let stdout_pipe = child.stdout.take().ok_or_else(|| ToolError::Spawn {
            program: self.program.clone(),
            message: "stdout not captured".to_string(),
        })?;
        let stderr_pipe = child.stderr.take().ok_or_else(|| ToolError::Spawn {
            program: self.program.clone(),
            message: "stderr not captured".to_string(),
        })?;

        let limit = options.max_buffer_bytes;
        let stdout_task = tokio::spawn(read_capped(stdout_pipe, limit));
        let stderr_task = tokio::spawn(read_capped(stderr_pipe, limit));

        let status = match tokio::time::timeout(options.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| ToolError::Spawn {
                program: self.program.clone(),
                message: format!("wait failed: {}", e),
            })?,
            Err(_) => {
                let _ = child.kill().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(ToolError::Timeout {
                    program: self.program.clone(),
                    timeout: options.timeout,
                });
            }
        };

        let (stdout, stdout_overflow) = stdout_task.await.unwrap_or_default();
        let (stderr, stderr_overflow) = stderr_task.await.unwrap_or_default();
        if stdout_overflow || stderr_overflow {
            return Err(ToolError::BufferExceeded {
                program: self.program.clone(),
                limit,
            });
        }

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        // Killed by a signal has no exit code
        let exit_code = status.code().unwrap_or(-1);

        if !status.success() {
            return Err(ToolError::NonZeroExit {
                program: self.program.clone(),
                exit_code,
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Read at most `limit` bytes, reporting whether the stream had more
async fn read_capped<R>(pipe: R, limit: usize) -> (Vec<u8>, bool)
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut limited = pipe.take(cap);
    if let Err(e) = limited.read_to_end(&mut buf).await {
        tracing::debug!("Output pipe closed early: {}", e);
    }
    let overflow = buf.len() > limit;
    buf.truncate(limit);
    (buf, overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_args_only_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        fs_err::write(&path, cookies::tests_support::sample_cookie_file()).unwrap();
        let adapter = YtDlpAdapter::new("yt-dlp").with_cookies(Some(CookieFile::load(&path).unwrap()));

        let argv = vec!["--skip-download".to_string()];
        let with = adapter.full_args(&argv, &ToolOptions::default());
        assert_eq!(with[0], "--cookies");
        assert_eq!(with.last().map(String::as_str), Some("--skip-download"));

        let options = ToolOptions {
            use_cookies: false,
            ..ToolOptions::default()
        };
        assert_eq!(adapter.full_args(&argv, &options), argv);
    }

    #[test]
    fn test_diagnostic_text_includes_stderr() {
        let err = ToolError::NonZeroExit {
            program: "yt-dlp".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "ERROR: [youtube] abc: Sign in to confirm you're not a bot".to_string(),
        };
        assert!(err.diagnostic_text().contains("not a bot"));
        assert!(err.stderr().is_some());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let adapter = YtDlpAdapter::new("definitely-not-a-real-binary-4c1d");
        let err = adapter
            .execute(&["--version".to_string()], &ToolOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert!(!adapter.check_availability().await);
    }

    #[tokio::test]
    async fn test_read_capped_flags_overflow() {
        let data: &[u8] = b"0123456789";
        let (buf, overflow) = read_capped(data, 4).await;
        assert_eq!(buf, b"0123");
        assert!(overflow);

        let (buf, overflow) = read_capped(data, 10).await;
        assert_eq!(buf.len(), 10);
        assert!(!overflow);
    }
}
