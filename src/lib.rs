//! Transcript Harvester - fetch YouTube caption transcripts through an ordered
//! chain of acquisition strategies.
//!
//! Every remote request passes a shared rate limiter and an anti-detection
//! policy; candidate transcripts are validated before they are accepted.

pub mod anti_detection;
pub mod cli;
pub mod config;
pub mod errors;
pub mod extractors;
pub mod http;
pub mod orchestrator;
pub mod output;
pub mod parsers;
pub mod rate_limit;
pub mod signals;
pub mod tool;
pub mod transcript;
pub mod utils;
pub mod validator;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use errors::{ErrorKind, TranscriptError};
pub use extractors::{AcquisitionStrategy, ExtractOptions, ExtractionContext};
pub use orchestrator::ExtractionOrchestrator;
pub use transcript::{Segment, StrategyKind, TranscriptResult};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
