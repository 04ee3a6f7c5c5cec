//! yt-dlp subtitle download with selectable client emulation.
//!
//! yt-dlp regularly exits non-zero after writing the subtitle file (a later
//! format request gets throttled, or a warning is promoted to an error), so the
//! scratch directory is always probed before the attempt counts as failed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::{AcquisitionStrategy, ExtractionContext};
use crate::errors::TranscriptError;
use crate::parsers::SubtitleFormat;
use crate::tool::ToolOptions;
use crate::transcript::{StrategyKind, TranscriptResult};

/// Files smaller than this are treated as truncated
pub const MIN_SUBTITLE_FILE_BYTES: u64 = 32;

/// Probe order for written subtitle files
const PROBE_FORMATS: [SubtitleFormat; 3] = [SubtitleFormat::Json3, SubtitleFormat::Xml, SubtitleFormat::Vtt];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProfile {
    Web,
    Android,
    Ios,
    Embedded,
}

impl ClientProfile {
    /// Value for `--extractor-args youtube:player_client=`
    pub fn player_client(&self) -> &'static str {
        match self {
            ClientProfile::Web => "web",
            ClientProfile::Android => "android",
            ClientProfile::Ios => "ios",
            ClientProfile::Embedded => "web_embedded",
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            ClientProfile::Web => StrategyKind::YtDlpWeb,
            ClientProfile::Android => StrategyKind::YtDlpAndroid,
            ClientProfile::Ios => StrategyKind::YtDlpIos,
            ClientProfile::Embedded => StrategyKind::YtDlpEmbedded,
        }
    }

    /// Scratch file suffix
    fn suffix(&self) -> &'static str {
        match self {
            ClientProfile::Web => "web",
            ClientProfile::Android => "android",
            ClientProfile::Ios => "ios",
            ClientProfile::Embedded => "embedded",
        }
    }
}

/// A subtitle file found in the scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleFile {
    pub path: PathBuf,
    pub format: SubtitleFormat,
    pub language: String,
}

pub struct YtDlpStrategy {
    profile: ClientProfile,
}

impl YtDlpStrategy {
    pub fn new(profile: ClientProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> ClientProfile {
        self.profile
    }

    fn stem(&self, video_id: &str) -> String {
        format!("{}_{}", video_id, self.profile.suffix())
    }

    fn scratch_dir(ctx: &ExtractionContext) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("harvester-");
        match &ctx.config.tool.scratch_dir {
            Some(dir) => {
                fs_err::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }

    /// Base arguments before anti-detection shaping; the URL is appended afterwards
    pub fn base_args(&self, video_id: &str, languages: &[String], scratch: &Path) -> Vec<String> {
        let template = scratch.join(format!("{}.%(ext)s", self.stem(video_id)));
        vec![
            "--skip-download".to_string(),
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            languages.join(","),
            "--sub-format".to_string(),
            "json3/srv1/vtt/best".to_string(),
            "--no-playlist".to_string(),
            "--extractor-args".to_string(),
            format!("youtube:player_client={}", self.profile.player_client()),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
        ]
    }
}

/// Find the best subtitle file for `stem`: language preference first, then format
pub fn find_subtitle_file(dir: &Path, stem: &str, languages: &[String]) -> Option<SubtitleFile> {
    for language in languages {
        for format in PROBE_FORMATS {
            let path = dir.join(format!("{}.{}.{}", stem, language, format.as_str()));
            if is_complete(&path) {
                return Some(SubtitleFile {
                    path,
                    format,
                    language: language.clone(),
                });
            }
        }
    }

    // yt-dlp may have picked a variant tag we did not ask for (e.g. en-orig)
    let mut candidates: Vec<SubtitleFile> = fs_err::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_complete(path))
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            let rest = name.strip_prefix(stem)?.strip_prefix('.')?;
            let (language, ext) = rest.rsplit_once('.')?;
            let format = SubtitleFormat::from_extension(ext)?;
            Some(SubtitleFile {
                language: language.to_string(),
                format,
                path,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    candidates.into_iter().next()
}

fn is_complete(path: &Path) -> bool {
    fs_err::metadata(path)
        .map(|meta| meta.is_file() && meta.len() >= MIN_SUBTITLE_FILE_BYTES)
        .unwrap_or(false)
}

#[async_trait]
impl AcquisitionStrategy for YtDlpStrategy {
    fn name(&self) -> &str {
        self.profile.kind().as_str()
    }

    async fn attempt(
        &self,
        video_id: &str,
        languages: &[String],
        ctx: &ExtractionContext,
    ) -> Result<TranscriptResult, TranscriptError> {
        let scratch = Self::scratch_dir(ctx).map_err(|e| {
            TranscriptError::failure(video_id, format!("Failed to create scratch directory: {}", e))
        })?;

        let base = self.base_args(video_id, languages, scratch.path());
        let mut argv = ctx.anti_detection.shape_arguments(&base, video_id);
        argv.push(format!("https://www.youtube.com/watch?v={}", video_id));

        let options = ToolOptions {
            timeout: ctx.config.tool.subtitle_timeout(),
            max_buffer_bytes: ctx.config.tool.max_buffer_bytes,
            use_cookies: true,
        };

        let outcome = ctx.tool.execute(&argv, &options).await;
        let tool_failure = match &outcome {
            Ok(_) => None,
            Err(e) => Some(e.diagnostic_text()),
        };

        let stem = self.stem(video_id);
        if let Some(file) = find_subtitle_file(scratch.path(), &stem, languages) {
            if tool_failure.is_some() {
                tracing::info!(
                    "{} reported failure but wrote {}; using it",
                    ctx.tool.name(),
                    file.path.display()
                );
            }

            let raw = fs_err::read_to_string(&file.path)
                .map_err(|e| TranscriptError::failure(video_id, e.to_string()))?;
            let segments = file
                .format
                .parse(&raw)
                .map_err(|e| TranscriptError::failure(video_id, e.to_string()))?;
            let _ = fs_err::remove_file(&file.path);

            if segments.is_empty() {
                return Err(TranscriptError::failure(video_id, "Subtitle file contained no usable cues")
                    .with_detail("file", file.path.display()));
            }
            return Ok(TranscriptResult::new(segments, file.language, self.name()));
        }

        let message = tool_failure.unwrap_or_else(|| {
            format!("There are no subtitles for the requested languages ({})", languages.join(","))
        });
        Err(TranscriptError::failure(video_id, message).with_detail("profile", self.profile.player_client()))
    }
}
