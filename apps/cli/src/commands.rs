//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use ladle_adapters::Catalog;
use ladle_core::{ItemFailure, Pipeline, RunProgress, RunReport, WorkItem};
use ladle_fetcher::{Fetcher, WebSource};
use ladle_shared::{
    AppConfig, CONFIG_FILE_NAME, ContentKind, ReadSource, RunConfig, SourceReference,
    init_config, load_config,
};
use ladle_storage::ContentStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Ladle: recursive, config-driven content pipeline.
#[derive(Parser)]
#[command(
    name = "ladle",
    version,
    about = "Fetch, parse, and transform documents into structured records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./ladle.toml, then the user config dir).
    #[arg(long, global = true, env = "LADLE_CONFIG")]
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

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline from the configured (or given) entrypoints.
    Run {
        /// Entrypoint as URL=PAGE_TYPE. Replaces the configured entrypoints.
        #[arg(short, long = "entry", value_parser = parse_entry)]
        entries: Vec<SourceReference>,

        /// Write the full run report (JSON) to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Re-run only the references that failed in a previous report.
    Retry {
        /// Report written by `ladle run --report`.
        #[arg(long)]
        report: PathBuf,

        /// Write the new report here (defaults to overwriting `--report`).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print cached content for a reference without fetching.
    Inspect {
        /// Location of the cached document.
        #[arg(long)]
        url: String,

        /// Page type the document was fetched as.
        #[arg(long)]
        page_type: String,

        /// Show the parsed (structured) record instead of the raw body.
        #[arg(long)]
        structured: bool,
    },

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
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
}

/// Parse `URL=PAGE_TYPE`. The last `=` separates the page type, so URLs with
/// query strings still work.
fn parse_entry(raw: &str) -> std::result::Result<SourceReference, String> {
    let (url, page_type) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected URL=PAGE_TYPE, got '{raw}'"))?;
    let (url, page_type) = (url.trim(), page_type.trim());
    if url.is_empty() || page_type.is_empty() {
        return Err(format!("expected URL=PAGE_TYPE, got '{raw}'"));
    }
    Ok(SourceReference::new(url, page_type))
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ladle=info",
        1 => "ladle=debug",
        _ => "ladle=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
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
        Command::Run { entries, report } => cmd_run(config_path, entries, report.as_deref()).await,
        Command::Retry { report, out } => cmd_retry(config_path, &report, out.as_deref()).await,
        Command::Inspect {
            url,
            page_type,
            structured,
        } => cmd_inspect(config_path, &url, &page_type, structured),
        Command::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(config_path, force),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// The HTTP client honors `fetch_timeout_secs`; 0 leaves requests unbounded.
fn web_source(run: &RunConfig) -> ladle_shared::Result<WebSource> {
    match run.fetch_timeout_secs {
        0 => WebSource::without_timeout(),
        secs => WebSource::with_timeout(Duration::from_secs(secs)),
    }
}

/// Wire store, live source, and registries into a pipeline.
fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let (parsers, transformers) = Catalog::build(config)?;
    let store = Arc::new(ContentStore::from_config(&config.policy)?);

    let fetcher = Fetcher::new(store, Arc::new(web_source(&config.run)?))
        .with_delay(Duration::from_millis(config.run.delay_ms));

    Ok(Pipeline::from_config(config, fetcher, parsers, transformers)?)
}

async fn execute(config: &AppConfig, entrypoints: Vec<SourceReference>) -> Result<RunReport> {
    let pipeline = build_pipeline(config)?;

    info!(
        entrypoints = entrypoints.len(),
        read_order = ?pipeline.policy().read_order,
        "starting pipeline"
    );

    let reporter = CliProgress::new();
    let report = pipeline.run(entrypoints, &reporter).await?;
    Ok(report)
}

async fn cmd_run(
    config_path: Option<&Path>,
    entries: Vec<SourceReference>,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let entrypoints = if entries.is_empty() {
        config.entrypoint_refs()
    } else {
        entries
    };
    if entrypoints.is_empty() {
        return Err(eyre!(
            "no entrypoints: add [[entrypoints]] to {CONFIG_FILE_NAME} \
             or pass --entry URL=PAGE_TYPE"
        ));
    }

    let report = execute(&config, entrypoints).await?;
    print_summary(&report);

    if let Some(path) = report_path {
        report.save(path)?;
        println!("  Report: {}", path.display());
        println!();
    }
    Ok(())
}

async fn cmd_retry(
    config_path: Option<&Path>,
    report_path: &Path,
    out: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let previous = RunReport::load(report_path)?;

    let entrypoints = previous.failed_references();
    if entrypoints.is_empty() {
        println!("Nothing to retry: {} has no failures.", report_path.display());
        return Ok(());
    }

    info!(
        report = %report_path.display(),
        references = entrypoints.len(),
        "retrying failed references"
    );

    let report = execute(&config, entrypoints).await?;
    print_summary(&report);

    let out = out.unwrap_or(report_path);
    report.save(out)?;
    println!("  Report: {}", out.display());
    println!();
    Ok(())
}

fn cmd_inspect(
    config_path: Option<&Path>,
    url: &str,
    page_type: &str,
    structured: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let store = ContentStore::open_readonly(
        &config.policy.html_root_dir,
        &config.policy.json_root_dir,
    );
    let source = SourceReference::new(url, page_type);
    let kind = if structured {
        ContentKind::Structured
    } else {
        ContentKind::Raw
    };

    let path = store.path_for(&source, kind);
    let Some(stored) = store.read(&source, kind, &[ReadSource::File])? else {
        return Err(eyre!("nothing cached for {source} at {}", path.display()));
    };

    match stored {
        ladle_storage::StoredContent::Raw(raw) => println!("{}", raw.body),
        ladle_storage::StoredContent::Structured(content) => {
            println!("{}", serde_json::to_string_pretty(&content)?)
        }
    }

    let backups = store.list_backups(&source, kind)?;
    info!(path = %path.display(), backups = backups.len(), "inspected cache entry");
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path.unwrap_or(Path::new(CONFIG_FILE_NAME));
    if path.exists() && !force {
        return Err(eyre!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    let path = init_config(path)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_summary(report: &RunReport) {
    let stats = &report.stats;

    let mut by_schema: BTreeMap<&str, usize> = BTreeMap::new();
    for output in &report.outputs {
        *by_schema.entry(output.schema_type.as_str()).or_default() += 1;
    }

    println!();
    println!("  Run complete.");
    println!("  Outputs:   {}", report.outputs.len());
    for (schema_type, count) in &by_schema {
        println!("    {schema_type}: {count}");
    }
    println!(
        "  Fetched:   {} (store: {}, web: {})",
        stats.fetched, stats.from_store, stats.from_web
    );
    println!("  Skipped:   {} duplicate(s)", stats.duplicates_skipped);
    println!("  Failures:  {}", report.failures.len());
    for failure in &report.failures {
        println!("    [{}] {}: {}", failure.kind, failure.reference, failure.message);
    }
    if !report.store_errors.is_empty() {
        println!("  Cache write errors: {}", report.store_errors.len());
        for err in &report.store_errors {
            println!("    {err}");
        }
    }
    println!("  Time:      {:.1}s", stats.elapsed_ms as f64 / 1000.0);
    println!();
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
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl RunProgress for CliProgress {
    fn item_started(&self, item: &WorkItem, queued: usize) {
        self.spinner.set_message(format!("[{queued} queued] {item}"));
    }

    fn item_failed(&self, failure: &ItemFailure) {
        self.spinner
            .println(format!("  ✗ [{}] {}", failure.kind, failure.reference));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn zero_fetch_timeout_builds_an_unbounded_client() {
        let run = RunConfig {
            fetch_timeout_secs: 0,
            ..Default::default()
        };
        assert!(web_source(&run).is_ok());
    }

    #[test]
    fn entry_flag_splits_on_last_equals() {
        let r = parse_entry("https://example.com/list?page=2=list").unwrap();
        assert_eq!(r.location, "https://example.com/list?page=2");
        assert_eq!(r.page_type, "list");

        assert!(parse_entry("https://example.com/list").is_err());
        assert!(parse_entry("=list").is_err());
        assert!(parse_entry("https://example.com/=").is_err());
    }

    #[test]
    fn run_accepts_repeated_entries() {
        let cli = Cli::try_parse_from([
            "ladle",
            "run",
            "--entry",
            "https://example.com/a=list",
            "-e",
            "./pages/b.html=detail",
            "--report",
            "out.json",
        ])
        .unwrap();

        match cli.command {
            Command::Run { entries, report } => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[1].page_type, "detail");
                assert_eq!(report.as_deref(), Some(Path::new("out.json")));
            }
            _ => panic!("expected run command"),
        }
    }
}
