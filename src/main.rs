use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use transcript_harvester::cli::{Cli, Commands, OutputFormat};
use transcript_harvester::config::Config;
use transcript_harvester::errors::{ErrorKind, TranscriptError};
use transcript_harvester::extractors::{ExtractOptions, ExtractionContext};
use transcript_harvester::orchestrator::ExtractionOrchestrator;
use transcript_harvester::parsers::SubtitleFormat;
use transcript_harvester::transcript::TranscriptResult;
use transcript_harvester::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Fetch {
            video,
            languages,
            output,
            format,
            timestamps,
            min_length,
            cookies,
        } => {
            let mut config = Config::load().await?;
            if cookies.is_some() {
                config.tool.cookies_file = cookies;
            }

            let missing_deps = utils::check_dependencies(&config.tool.ytdlp_path).await;
            if !missing_deps.is_empty() {
                eprintln!("⚠️  Dependency check warnings:");
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
            }

            let ctx = Arc::new(ExtractionContext::new(config)?);
            let orchestrator = ExtractionOrchestrator::with_default_chain(ctx);
            let options = ExtractOptions { languages, min_length };

            let progress = spinner(cli.quiet);
            progress.set_message(format!("Fetching transcript for {}...", video));
            let outcome = orchestrator.extract(&video, &options).await;

            match outcome {
                Ok(result) => {
                    progress.finish_with_message(format!(
                        "Transcript ready ({} segments via {})",
                        result.segments.len(),
                        result.method
                    ));
                    emit(&result, output.as_deref(), &format, timestamps).await?;
                }
                Err(err) => {
                    progress.finish_with_message("Transcript unavailable");
                    report_failure(&err, cli.verbose);
                    std::process::exit(exit_code(err.kind()));
                }
            }
        }
        Commands::Parse {
            file,
            input_format,
            format,
            timestamps,
        } => {
            let raw = fs_err::read_to_string(&file)?;
            let subtitle_format = input_format
                .map(SubtitleFormat::from)
                .or_else(|| {
                    file.extension()
                        .and_then(|ext| ext.to_str())
                        .and_then(SubtitleFormat::from_extension)
                })
                .or_else(|| SubtitleFormat::detect(&raw))
                .context("Could not determine subtitle format; pass --input-format")?;

            let segments = subtitle_format
                .parse(&raw)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            if segments.is_empty() {
                anyhow::bail!("No usable cues in {}", file.display());
            }

            tracing::info!("Parsed {} segments from {} ({})", segments.len(), file.display(), subtitle_format);
            let result = TranscriptResult::new(segments, "und", format!("local_{}", subtitle_format));
            output::print_to_console(&result, &format, timestamps)?;
        }
        Commands::Config { show, init } => {
            if init {
                let path = Config::default().save().await?;
                println!("Default configuration written to: {}", path.display());
            }
            if show || !init {
                let config = Config::load().await?;
                config.display();
                if let Some(path) = Config::config_path() {
                    println!("  Config file: {}", path.display());
                }
            }
        }
        Commands::Strategies => {
            let config = Config::load().await?;
            println!("Strategy chain (priority order):");
            for (i, tag) in config.extraction.strategies.iter().enumerate() {
                println!("  {}. {}", i + 1, tag);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose {
        "transcript_harvester=debug"
    } else {
        "transcript_harvester=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

async fn emit(
    result: &TranscriptResult,
    path: Option<&std::path::Path>,
    format: &OutputFormat,
    timestamps: bool,
) -> Result<()> {
    match path {
        Some(path) => {
            output::save_to_file(result, path, format, timestamps).await?;
            println!("Transcript saved to: {}", path.display());
        }
        None => output::print_to_console(result, format, timestamps)?,
    }
    Ok(())
}

fn report_failure(err: &TranscriptError, verbose: bool) {
    eprintln!("Error: {}", err.user_message());
    if verbose || err.is_user_facing() {
        eprintln!("  {}", err);
    }
    if verbose {
        for (key, value) in err.details() {
            eprintln!("  {}: {}", key, value);
        }
    }
}

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::ExtractionFailure => 1,
        ErrorKind::TranscriptNotFound => 2,
        ErrorKind::TranscriptTooShort => 3,
        ErrorKind::TranscriptDisabled => 4,
        ErrorKind::RateLimited => 5,
    }
}
