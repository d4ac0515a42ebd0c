//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use newsdesk_core::enrichment::{ChatCompletionsSummarizer, Summarizer};
use newsdesk_core::pipeline::{Orchestrator, SourceReport, SourceStatus, SyncProgress, SyncReport};
use newsdesk_shared::{
    AppConfig, ContentItem, SourceKind, SyncConfig, SyncStage, init_config, load_config,
    load_config_from, resolve_api_key, resolve_db_path,
};
use newsdesk_sources::SourceRegistry;
use newsdesk_storage::{ContentStore, DEFAULT_ITEM_LIMIT, Storage};
use serde::Serialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Newsdesk: world-news ingestion into a local store.
#[derive(Parser)]
#[command(
    name = "newsdesk",
    version,
    about = "Sync world-news headlines from several publishers into a local database.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Read configuration from this file instead of ~/.newsdesk/newsdesk.toml.
    #[arg(long, global = true, env = "NEWSDESK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Export file format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Pull new articles from every configured source.
    Sync {
        /// Skip summarization for this run.
        #[arg(long)]
        no_enrich: bool,

        /// Only sync these sources (repeatable): cnn, bbc, aljazeera, guardian, reuters.
        #[arg(long = "source")]
        sources: Vec<SourceKind>,
    },

    /// Write stored items to a CSV (default) or JSON file.
    Export {
        /// Category to export (defaults to all).
        #[arg(short, long)]
        category: Option<String>,

        /// Maximum number of items, newest first.
        #[arg(short, long, default_value_t = DEFAULT_ITEM_LIMIT)]
        limit: usize,

        /// Output directory.
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "csv")]
        format: ExportFormat,
    },

    /// List the categories present in the store.
    Categories,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "newsdesk=info",
        1 => "newsdesk=debug",
        _ => "newsdesk=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Sync { no_enrich, sources } => cmd_sync(config_path, no_enrich, &sources).await,
        Command::Export {
            category,
            limit,
            out,
            format,
        } => cmd_export(config_path, category.as_deref(), limit, &out, format).await,
        Command::Categories => cmd_categories(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_sync(config_path: Option<&Path>, no_enrich: bool, only: &[SourceKind]) -> Result<()> {
    let config = resolve_config(config_path)?;

    let mut sync_config = SyncConfig::from(&config);
    if no_enrich {
        sync_config.enrich = false;
    }

    let registry = SourceRegistry::from_config(&config, only)?;
    if registry.is_empty() {
        return Err(eyre!("no enabled sources match the selection"));
    }

    let db_path = resolve_db_path(&config)?;
    let storage = Storage::open(&db_path).await?;

    let mut orchestrator = Orchestrator::new(Arc::new(storage), sync_config.clone());
    if sync_config.enrich {
        match resolve_api_key(&config) {
            Ok(key) => {
                let summarizer: Arc<dyn Summarizer> =
                    Arc::new(ChatCompletionsSummarizer::new(&config.enrichment, key)?);
                orchestrator = orchestrator.with_summarizer(summarizer);
            }
            Err(e) => warn!(error = %e, "enrichment disabled for this run"),
        }
    }

    info!(
        sources = ?registry.names(),
        db = %db_path.display(),
        enrich = sync_config.enrich,
        "starting sync"
    );

    let reporter = CliProgress::new();
    let report = orchestrator.run(registry.sources(), &reporter).await;

    print_report(&report);

    let failed = report.failed_sources();
    if failed.is_empty() {
        Ok(())
    } else {
        let names: Vec<&str> = failed.iter().map(|s| s.source.as_str()).collect();
        Err(eyre!("{} source(s) failed: {}", failed.len(), names.join(", ")))
    }
}

fn print_report(report: &SyncReport) {
    println!();
    println!(
        "  {:<10} {:>10} {:>6} {:>7} {:>8} {:>8}  status",
        "source", "discovered", "new", "fetched", "enriched", "inserted"
    );
    for s in &report.sources {
        let status = match &s.status {
            SourceStatus::Completed if s.fetch_failures.is_empty() => "ok".to_string(),
            SourceStatus::Completed => format!("ok ({} fetch failures)", s.fetch_failures.len()),
            SourceStatus::Failed { stage, error } => format!("failed while {stage}: {error}"),
            SourceStatus::NotAttempted => "not attempted".to_string(),
        };
        println!(
            "  {:<10} {:>10} {:>6} {:>7} {:>8} {:>8}  {status}",
            s.source, s.discovered, s.deduped, s.fetched, s.enriched, s.inserted
        );
    }
    println!();
    println!(
        "  Inserted {} item(s) in {:.1}s",
        report.total_inserted(),
        report.elapsed_ms as f64 / 1000.0
    );
    println!();
}

async fn cmd_export(
    config_path: Option<&Path>,
    category: Option<&str>,
    limit: usize,
    out: &Path,
    format: ExportFormat,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let storage = Storage::open_readonly(&resolve_db_path(&config)?).await?;

    let items = storage.get_items(category.unwrap_or(""), limit).await?;

    std::fs::create_dir_all(out)?;
    let path = out.join(export_file_name(category, limit, format));
    let file = std::io::BufWriter::new(std::fs::File::create(&path)?);
    match format {
        ExportFormat::Csv => write_csv(&items, file)?,
        ExportFormat::Json => write_json(&items, file)?,
    }

    info!(count = items.len(), path = %path.display(), "exported items");
    println!("Exported {} item(s) to {}", items.len(), path.display());
    Ok(())
}

/// One CSV record. Key points are flattened to one point per line.
#[derive(Serialize)]
struct ExportRow<'a> {
    id: &'a str,
    source_name: &'a str,
    category: &'a str,
    headline: &'a str,
    body: &'a str,
    summary: &'a str,
    key_points: String,
    published_at: &'a str,
    image_link: &'a str,
    source_link: &'a str,
    meta_description: &'a str,
    meta_keywords: &'a str,
}

impl<'a> From<&'a ContentItem> for ExportRow<'a> {
    fn from(item: &'a ContentItem) -> Self {
        Self {
            id: &item.id,
            source_name: &item.source_name,
            category: &item.category,
            headline: &item.headline,
            body: &item.body,
            summary: &item.summary,
            key_points: item.key_points.join("\n"),
            published_at: &item.published_at,
            image_link: &item.image_link,
            source_link: &item.source_link,
            meta_description: &item.meta_description,
            meta_keywords: &item.meta_keywords,
        }
    }
}

fn write_csv<W: Write>(items: &[ContentItem], writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for item in items {
        csv.serialize(ExportRow::from(item))?;
    }
    csv.flush()?;
    Ok(())
}

fn write_json<W: Write>(items: &[ContentItem], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, items)?;
    writer.flush()?;
    Ok(())
}

/// `news-<category|all>-<limit>-<timestamp>.<ext>`, safe on every filesystem.
fn export_file_name(category: Option<&str>, limit: usize, format: ExportFormat) -> String {
    let category = match category.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => "all",
    };
    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ");
    format!("news-{category}-{limit}-{stamp}.{}", format.extension())
}

async fn cmd_categories(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let storage = Storage::open_readonly(&resolve_db_path(&config)?).await?;

    for category in storage.get_categories().await? {
        println!("{category}");
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl SyncProgress for CliProgress {
    fn stage(&self, source: &str, stage: SyncStage) {
        self.spinner.set_message(format!("{source}: {stage}"));
    }

    fn source_finished(&self, report: &SourceReport) {
        if let SourceStatus::Failed { stage, .. } = &report.status {
            self.spinner
                .println(format!("  ✗ {} failed while {stage}", report.source));
        } else if report.status == SourceStatus::Completed {
            self.spinner.println(format!(
                "  ✓ {}: {} new, {} inserted",
                report.source, report.deduped, report.inserted
            ));
        }
    }

    fn done(&self, _report: &SyncReport) {
        self.spinner.finish_and_clear();
    }
}
