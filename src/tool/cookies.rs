use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Smallest plausible Netscape cookie export
pub const MIN_COOKIE_FILE_BYTES: u64 = 100;

const REQUIRED_DOMAIN: &str = "youtube.com";

/// A cookie file that passed basic sanity checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieFile {
    path: PathBuf,
}

impl CookieFile {
    /// Validate and wrap a cookie file path
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Cookie file does not exist: {}", path.display());
        }
        if !path.is_file() {
            anyhow::bail!("Cookie path is not a file: {}", path.display());
        }

        let metadata = fs_err::metadata(path)?;
        if metadata.len() < MIN_COOKIE_FILE_BYTES {
            anyhow::bail!(
                "Cookie file {} is too small ({} bytes)",
                path.display(),
                metadata.len()
            );
        }

        let content = fs_err::read_to_string(path).context("Failed to read cookie file")?;
        if !content.contains(REQUIRED_DOMAIN) {
            anyhow::bail!("Cookie file {} has no {} cookies", path.display(), REQUIRED_DOMAIN);
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Load if configured; an invalid file is logged and ignored
    pub fn load_optional(path: Option<&Path>) -> Option<Self> {
        let path = path?;
        match Self::load(path) {
            Ok(cookies) => {
                tracing::debug!("Using cookie file {}", path.display());
                Some(cookies)
            }
            Err(e) => {
                tracing::warn!("Ignoring cookie file: {:#}", e);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
