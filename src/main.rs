use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_cli::{AppConfig, ComparisonPipeline, FsResultStore};
use vigil_core_types::ExpectedChange;
use vigil_rate_limiter::RateLimiter;
use vigil_result_cache::ResultCache;
use vigil_vision::{HttpVisionConfig, HttpVisionModel, VisionClassifier};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two screenshots and classify the changes
    Compare(CompareArgs),

    /// Inspect or maintain the comparison result cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Args)]
struct CompareArgs {
    /// Baseline screenshot
    before: PathBuf,

    /// Current screenshot
    after: PathBuf,

    /// Pixel threshold override (1-3)
    #[arg(short, long)]
    threshold: Option<u8>,

    /// JSON file with an array of expected changes
    #[arg(long, value_name = "FILE")]
    expected: Option<PathBuf>,

    /// Force vision analysis on or off for this call
    #[arg(long, value_name = "BOOL")]
    vision: Option<bool>,

    /// Print the full result as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show hit rate and tier sizes
    Stats,

    /// Remove every cached entry
    Clear,

    /// Remove expired entries only
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = AppConfig::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Compare(args) => cmd_compare(args, config).await,
        Commands::Cache { command } => cmd_cache(command, &config),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

async fn cmd_compare(args: CompareArgs, mut config: AppConfig) -> Result<()> {
    if let Some(threshold) = args.threshold {
        config.comparison.pixel_threshold = threshold;
        config
            .comparison
            .validate()
            .context("invalid threshold override")?;
    }

    let expected = match &args.expected {
        Some(path) => load_expected_changes(path)?,
        None => Vec::new(),
    };

    let cache = Arc::new(ResultCache::new(
        config.storage.cache_dir(),
        config.storage.cache_ttl(),
    )?);
    let store = Arc::new(FsResultStore::new(config.storage.results_dir()));
    let vision = build_classifier(&config)?;

    let pipeline = ComparisonPipeline::new(config, cache, store, vision);
    let result = pipeline
        .compare(&args.before, &args.after, &expected, args.vision)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let status = if result.passed { "PASSED" } else { "FAILED" };
        println!(
            "{}: {} changed pixels ({:.2}%), {} intended, {} unintended",
            status,
            result.changed_pixels,
            result.changed_percentage,
            result.intended_changes.len(),
            result.unintended_changes.len(),
        );
        if let Some(reason) = &result.failure_reason {
            println!("Reason: {}", reason);
        }
        if let Some(path) = &result.report_path {
            println!("Report: {}", path.display());
        }
        if let Some(path) = &result.heatmap_path {
            println!("Heatmap: {}", path.display());
        }
    }

    if !result.passed {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_cache(command: CacheCommands, config: &AppConfig) -> Result<()> {
    let cache = ResultCache::new(config.storage.cache_dir(), config.storage.cache_ttl())?;

    match command {
        CacheCommands::Stats => {
            let stats = cache.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        CacheCommands::Clear => {
            let cleared = cache.clear();
            info!(
                disk_entries = cleared.disk_entries_cleared,
                freed_bytes = cleared.freed_bytes,
                "cache cleared"
            );
            println!("{}", serde_json::to_string_pretty(&cleared)?);
        }
        CacheCommands::Cleanup => {
            let swept = cache.cleanup_expired();
            info!(
                removed = swept.expired_entries_removed,
                freed_bytes = swept.freed_bytes,
                "expired entries removed"
            );
            println!("{}", serde_json::to_string_pretty(&swept)?);
        }
    }
    Ok(())
}

fn build_classifier(config: &AppConfig) -> Result<Option<Arc<VisionClassifier>>> {
    if !config.comparison.enable_vision_classification {
        return Ok(None);
    }
    let api_key = match &config.vision.api_key {
        Some(key) if !key.is_empty() => key.clone(),
        _ => {
            warn!("no vision API key configured, analysis will be pixel-only");
            return Ok(None);
        }
    };

    let model = HttpVisionModel::new(HttpVisionConfig {
        api_key,
        model: config.vision.model.clone(),
        api_base: config.vision.api_base.clone(),
        timeout: std::time::Duration::from_secs(config.vision.timeout_secs),
    })?;

    let classifier = VisionClassifier::new(Arc::new(model), RateLimiter::default());
    Ok(Some(Arc::new(classifier)))
}

fn load_expected_changes(path: &PathBuf) -> Result<Vec<ExpectedChange>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read expected changes from {}", path.display()))?;
    let expected: Vec<ExpectedChange> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse expected changes in {}", path.display()))?;
    Ok(expected)
}
