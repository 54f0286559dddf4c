// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pagewerk command-line driver.
//
// Entry point. Initialises logging, builds the configuration from a JSON file
// and flags, and runs the enhancement service or one of the cache tools.

mod data_dir;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pagewerk_bridge::{PdfAssembler, PdftoppmRasterizer};
use pagewerk_cache::{ContentCache, Digest, digest_file};
use pagewerk_core::config::PipelineConfig;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::human_errors::humanize_error;
use pagewerk_core::types::{PagePolicy, StageName};
use pagewerk_orchestrator::{CancelToken, EnhanceOutcome, EnhancementService};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "pagewerk",
    version,
    about = "Clean up scanned PDFs for OCR",
    long_about = "Rasterizes every page of a scanned PDF, runs the configured enhancement \
                  stages (denoising, CLAHE, contrast, sharpening, binarization), and \
                  reassembles the pages into a new PDF. Results are cached by content."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Enhance a scanned PDF and write the cleaned-up document
    Enhance(EnhanceArgs),

    /// Print the default configuration as JSON
    Config,

    /// Print the SHA-256 content digest of a file
    Digest {
        file: PathBuf,
    },

    /// Inspect or evict cached results
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Storage root holding the cache index [default: $XDG_DATA_HOME/pagewerk]
        #[arg(long, global = true)]
        storage_root: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// List cache entries
    List,
    /// Remove an entry and its artifact
    Evict {
        /// Cache key as printed by `cache list`
        digest: String,
    },
}

#[derive(Debug, Args)]
struct EnhanceArgs {
    /// Scanned PDF to enhance
    input: PathBuf,

    /// Where to write the result [default: <INPUT>_enhanced.pdf]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Rasterization resolution
    #[arg(long)]
    dpi: Option<u32>,

    /// Scratch, artifact, and cache directory [default: $XDG_DATA_HOME/pagewerk]
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Fail the run if any page fails instead of leaving it out
    #[arg(long)]
    require_all_pages: bool,

    /// Pages processed concurrently [default: one per CPU core]
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Enable optional stages on top of the configuration (comma separated)
    #[arg(long, value_name = "STAGE", value_delimiter = ',', value_parser = parse_stage)]
    enable: Vec<StageName>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Enhance(args) => run_enhance(args).await,
        Commands::Config => print_default_config(),
        Commands::Digest { file } => print_digest(&file),
        Commands::Cache {
            action,
            storage_root,
        } => run_cache(action, storage_root),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

// -- Enhance ------------------------------------------------------------------

async fn run_enhance(args: EnhanceArgs) -> Result<()> {
    let config = build_config(&args)?;
    info!(
        input = %args.input.display(),
        dpi = config.resolution,
        storage_root = %config.storage_root.display(),
        "Pagewerk starting"
    );

    let rasterizer = PdftoppmRasterizer::locate()?;
    let assembler = PdfAssembler::new(config.resolution);
    let service = EnhancementService::new(config, rasterizer, assembler)?;

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling run");
                on_interrupt.cancel();
            }
            Err(err) => warn!(error = %err, "Ctrl-C handler unavailable"),
        }
    });

    let outcome = service.enhance(&args.input, &cancel).await?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    tokio::fs::copy(&outcome.artifact, &output).await?;

    print_summary(&outcome, &output);
    Ok(())
}

/// Start from the config file (or defaults) and apply flag overrides.
fn build_config(args: &EnhanceArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(dpi) = args.dpi {
        config.resolution = dpi;
    }
    match (&args.storage_root, &args.config) {
        (Some(root), _) => config.storage_root = root.clone(),
        // A config file decides its own storage root.
        (None, Some(_)) => {}
        (None, None) => config.storage_root = data_dir::data_dir()?,
    }
    if args.require_all_pages {
        config.page_policy = PagePolicy::RequireAll;
    }
    if let Some(jobs) = args.jobs {
        config.concurrency = Some(jobs);
    }
    for stage in &args.enable {
        config.stages.set_enabled(*stage, true);
    }

    config.validate()?;
    Ok(config)
}

fn parse_stage(value: &str) -> std::result::Result<StageName, String> {
    StageName::from_key(value).ok_or_else(|| {
        let known: Vec<_> = StageName::ORDER.iter().map(StageName::key).collect();
        format!("unknown stage `{value}` (expected one of: {})", known.join(", "))
    })
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_owned());
    input.with_file_name(format!("{stem}_enhanced.pdf"))
}

fn print_summary(outcome: &EnhanceOutcome, output: &Path) {
    match &outcome.report {
        None => println!(
            "{} (cached result {})",
            output.display(),
            outcome.cache_key.prefix(16)
        ),
        Some(report) => {
            println!(
                "{} ({} of {} pages enhanced)",
                output.display(),
                report.enhanced_pages.len(),
                report.page_count
            );
            for failure in &report.failed_pages {
                println!("  page {} left out: {}", failure.page, failure.cause);
            }
        }
    }
}

// -- Tools --------------------------------------------------------------------

fn print_default_config() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
    Ok(())
}

fn print_digest(file: &Path) -> Result<()> {
    let digest = digest_file(file)?;
    println!("{digest}  {}", file.display());
    Ok(())
}

fn run_cache(action: CacheAction, storage_root: Option<PathBuf>) -> Result<()> {
    let root = match storage_root {
        Some(root) => root,
        None => data_dir::data_dir()?,
    };
    let cache = ContentCache::open(&root)?;

    match action {
        CacheAction::List => {
            if cache.is_empty() {
                println!("cache at {} is empty", root.display());
            }
            for (key, entry) in cache.entries() {
                println!("{key}  {}  {}", entry.stored_at.to_rfc3339(), entry.artifact);
            }
        }
        CacheAction::Evict { digest } => {
            let key = Digest::parse(&digest)?;
            let artifact = cache
                .entries()
                .into_iter()
                .find(|(k, _)| k == &key)
                .map(|(_, entry)| cache.artifact_path(&entry.artifact));

            if !cache.evict(&key)? {
                println!("no entry for {key}");
                return Ok(());
            }
            if let Some(path) = artifact {
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => {
                        warn!(artifact = %path.display(), error = %err, "Artifact not removed")
                    }
                }
            }
            println!("evicted {key}");
        }
    }
    Ok(())
}

fn report_error(err: &PagewerkError) {
    let human = humanize_error(err);
    eprintln!("Error: {}", human.message);
    eprintln!("  {}", human.suggestion);
    if human.retriable {
        eprintln!("  Trying again may help.");
    }
    tracing::debug!(error = %err, "Technical detail");
}
