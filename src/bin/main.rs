use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_tagger::config::{self, TaggerSettings};
use async_tagger::sources::PatternTagSource;
use async_tagger::{AsyncTagger, TaggerError, TaggerResult, TextBuffer, TextRange};
use clap::{Parser, Subcommand};
use regex::Regex;
use serde::Serialize;

/// How long `scan` waits for background work before giving up.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Debounced background tagging over a text file
#[derive(Parser)]
#[command(name = "async-tagger")]
#[command(version)]
#[command(about = "Debounced, cancellable background tagging over a text file")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag the matches of a pattern in a file
    Scan {
        /// The file to scan
        file: PathBuf,

        /// Regular expression to highlight
        #[arg(long)]
        pattern: String,

        /// Debounce delay in milliseconds (default: from configuration)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Insert TEXT at byte OFFSET after the first request; repeatable.
        /// `\n` in TEXT is a line break.
        #[arg(long = "edit", value_name = "OFFSET:TEXT", value_parser = parse_edit)]
        edits: Vec<(usize, String)>,

        /// Configuration file (default: the user configuration)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print tags as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the default configuration as TOML
    Init,
}

#[derive(Serialize)]
struct TagOutput {
    start: usize,
    end: usize,
    line: usize,
    text: String,
    pattern: String,
}

fn parse_edit(value: &str) -> Result<(usize, String), String> {
    let (offset, text) = value
        .split_once(':')
        .ok_or_else(|| format!("expected OFFSET:TEXT, got '{}'", value))?;
    let offset = offset
        .parse::<usize>()
        .map_err(|e| format!("invalid offset '{}': {}", offset, e))?;
    Ok((offset, text.replace("\\n", "\n")))
}

fn load_settings(path: Option<&Path>) -> TaggerResult<TaggerSettings> {
    match path {
        Some(path) => config::load_settings(path),
        None => config::load_user_config(),
    }
}

async fn scan(
    file: &Path,
    pattern: &str,
    delay_ms: Option<u64>,
    edits: Vec<(usize, String)>,
    settings: &TaggerSettings,
    json: bool,
) -> TaggerResult<()> {
    let text = std::fs::read_to_string(file)?;
    let regex = Regex::new(pattern).map_err(|e| TaggerError::config(e.to_string()))?;

    let buffer = Arc::new(TextBuffer::new(text));
    let mut source = PatternTagSource::new(buffer.clone(), regex);
    if let Some(delay_ms) = delay_ms {
        source = source.with_delay(Duration::from_millis(delay_ms));
    }
    let mut engine = AsyncTagger::with_settings(source, settings)?;

    engine.request_tags(&TextRange::full(&buffer.current()));
    for (offset, text) in edits {
        let snapshot = buffer.insert(offset, &text)?;
        engine.process_pending();
        engine.request_tags(&TextRange::full(&snapshot));
    }

    tokio::time::timeout(SETTLE_TIMEOUT, engine.settle())
        .await
        .map_err(|_| TaggerError::internal("timed out waiting for background tagging"))?;

    let snapshot = buffer.current();
    let tags: Vec<TagOutput> = engine
        .request_tags(&TextRange::full(&snapshot))
        .into_iter()
        .map(|span| TagOutput {
            start: span.range.start(),
            end: span.range.end(),
            line: snapshot.line_number_at(span.range.start()),
            text: span.range.text().unwrap_or_default().to_string(),
            pattern: span.tag.pattern.to_string(),
        })
        .collect();
    log::debug!(target: "async_tagger::cli", "{:?}", engine.stats());

    if json {
        let rendered = serde_json::to_string_pretty(&tags)
            .map_err(|e| TaggerError::internal(e.to_string()))?;
        println!("{}", rendered);
    } else {
        for tag in &tags {
            println!("{}\t{}..{}\t{}", tag.line + 1, tag.start, tag.end, tag.text);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            file,
            pattern,
            delay_ms,
            edits,
            config,
            json,
        } => match load_settings(config.as_deref()) {
            Ok(settings) => scan(&file, &pattern, delay_ms, edits, &settings, json).await,
            Err(e) => Err(e),
        },
        Commands::Config {
            command: ConfigCommands::Init,
        } => toml::to_string_pretty(&config::defaults::default_settings())
            .map(|rendered| print!("{}", rendered))
            .map_err(|e| TaggerError::internal(e.to_string())),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
