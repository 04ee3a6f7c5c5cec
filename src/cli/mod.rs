use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::COOKIES_FILE_ENV;

#[derive(Parser)]
#[command(
    name = "harvester",
    about = "Transcript Harvester - Fetch YouTube transcripts through a chain of fallback strategies",
    version,
    long_about = "Fetches caption transcripts for YouTube videos. Strategies run in priority order (timedtext endpoint, player API, yt-dlp client profiles, watch page) under a shared rate limiter until one produces a transcript that passes validation."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the transcript of a video
    Fetch {
        /// Video id or URL (watch, youtu.be, shorts, embed, live)
        #[arg(value_name = "VIDEO")]
        video: String,

        /// Preferred languages, comma separated (tried before the configured defaults)
        #[arg(short, long, value_name = "LANGS", value_delimiter = ',')]
        languages: Vec<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Include timestamps in text output
        #[arg(long)]
        timestamps: bool,

        /// Minimum accepted transcript length in characters
        #[arg(long, value_name = "CHARS")]
        min_length: Option<usize>,

        /// Cookie file passed to yt-dlp
        #[arg(long, value_name = "FILE", env = COOKIES_FILE_ENV)]
        cookies: Option<PathBuf>,
    },

    /// Parse a local subtitle file (vtt, json3, srv1/xml)
    Parse {
        /// Subtitle file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Input format (detected from extension or content if not specified)
        #[arg(long, value_enum)]
        input_format: Option<InputFormat>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Include timestamps in text output
        #[arg(long)]
        timestamps: bool,
    },

    /// Show or initialise configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },

    /// List the strategy chain in priority order
    Strategies,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with timestamps
    Json,
    /// SRT subtitle format
    Srt,
    /// WebVTT format
    Vtt,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum InputFormat {
    Vtt,
    Json3,
    Xml,
}

impl From<InputFormat> for crate::parsers::SubtitleFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Vtt => Self::Vtt,
            InputFormat::Json3 => Self::Json3,
            InputFormat::Xml => Self::Xml,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_languages_split() {
        let cli = Cli::try_parse_from(["harvester", "fetch", "dQw4w9WgXcQ", "-l", "de,en-GB", "-f", "srt"]).unwrap();
        match cli.command {
            Commands::Fetch { languages, format, .. } => {
                assert_eq!(languages, vec!["de", "en-GB"]);
                assert_eq!(format.to_string(), "srt");
            }
            _ => panic!("expected fetch"),
        }
    }
}
