//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;
use url::Url;

use sitegraph_core::pipeline::{
    self, IngestOutcome, IngestSummary, Pipeline, ProgressReporter, SentenceOutcome,
};
use sitegraph_crawler::{CrawlResult, Crawler, FetchedResource};
use sitegraph_shared::{
    AppConfig, CrawlConfig, Resource, ResourceType, SiteGraphError, TaggerConfig, init_config,
    load_config,
};
use sitegraph_storage::Storage;
use sitegraph_tagger::TaggerRegistry;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sitegraph: crawl websites into a versioned store and a knowledge graph.
#[derive(Parser)]
#[command(
    name = "sitegraph",
    version,
    about = "Crawl websites, keep every content change, and build a lemma-level knowledge graph.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file (overrides `[storage] database_path`).
    #[arg(long, env = "SITEGRAPH_DATABASE", global = true)]
    pub database: Option<PathBuf>,

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
    /// Crawl a website and ingest every fetched resource.
    Crawl {
        /// Start URL. Only links on the same host are followed.
        url: String,

        /// Maximum link depth (0 = unlimited).
        #[arg(long)]
        depth: Option<u32>,

        /// Maximum number of fetched resources (0 = unlimited).
        #[arg(long)]
        max_pages: Option<usize>,

        /// Do not fetch linked images and PDFs.
        #[arg(long)]
        no_binaries: bool,

        /// Tag every page in this language instead of its `<html lang>`.
        #[arg(long)]
        lang: Option<String>,
    },

    /// Ingest a local file as if it had been fetched from `--url`.
    Ingest {
        /// HTML page, image, or PDF.
        file: PathBuf,

        /// Origin URL to record for the file.
        #[arg(long)]
        url: String,

        /// Tag the page in this language instead of its `<html lang>`.
        #[arg(long)]
        lang: Option<String>,
    },

    /// Tag one sentence and print the extracted graph fragment as JSON.
    Extract {
        /// Language code of the sentence.
        #[arg(long)]
        lang: String,

        /// The sentence.
        text: String,
    },

    /// Print the latest stored capture of a URL as JSON.
    Latest {
        url: String,
    },

    /// List every stored capture of a URL, newest first.
    History {
        url: String,
    },

    /// Show graph counts, or dump the whole graph.
    Graph {
        /// Print all nodes and relationships as JSON.
        #[arg(long)]
        json: bool,
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
        0 => "sitegraph=info",
        1 => "sitegraph=debug",
        _ => "sitegraph=trace",
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
    let database = cli.database.as_deref();
    match cli.command {
        Command::Crawl {
            url,
            depth,
            max_pages,
            no_binaries,
            lang,
        } => cmd_crawl(database, &url, depth, max_pages, no_binaries, lang).await,
        Command::Ingest { file, url, lang } => cmd_ingest(database, &file, &url, lang).await,
        Command::Extract { lang, text } => cmd_extract(&lang, &text).await,
        Command::Latest { url } => cmd_latest(database, &url).await,
        Command::History { url } => cmd_history(database, &url).await,
        Command::Graph { json } => cmd_graph(database, json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve the database file from the `--database` flag or the config.
fn database_path(flag: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config.storage.resolved_database_path()?),
    }
}

async fn open_pipeline(
    database: Option<&Path>,
    config: &AppConfig,
    lang: Option<String>,
) -> Result<Pipeline> {
    let db_path = database_path(database, config)?;
    let storage = Storage::open(&db_path).await?;
    let taggers = TaggerRegistry::from_config(&TaggerConfig::from(config))?;
    info!(db = %db_path.display(), languages = ?taggers.languages(), "pipeline ready");
    Ok(Pipeline::new(storage, taggers).with_language(lang))
}

async fn open_readonly(database: Option<&Path>) -> Result<Storage> {
    let config = load_config()?;
    let db_path = database_path(database, &config)?;
    Ok(Storage::open_readonly(&db_path).await?)
}

// ---------------------------------------------------------------------------
// Ingest commands
// ---------------------------------------------------------------------------

async fn cmd_crawl(
    database: Option<&Path>,
    url: &str,
    depth: Option<u32>,
    max_pages: Option<usize>,
    no_binaries: bool,
    lang: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    let start_url = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    let mut crawl_config = CrawlConfig::from(&config);
    if let Some(depth) = depth {
        crawl_config.depth = depth;
    }
    if let Some(max_pages) = max_pages {
        crawl_config.max_pages = max_pages;
    }
    if no_binaries {
        crawl_config.fetch_binaries = false;
    }

    info!(
        url,
        depth = crawl_config.depth,
        max_pages = crawl_config.max_pages,
        fetch_binaries = crawl_config.fetch_binaries,
        "crawling website"
    );

    let pipeline = open_pipeline(database, &config, lang).await?;
    let crawler = Crawler::new(crawl_config)?;
    let reporter = CliProgress::new();

    let (crawl, summary) = pipeline.crawl(&crawler, &start_url, &reporter).await?;

    print_crawl(&crawl);
    print_summary(&summary);
    Ok(())
}

async fn cmd_ingest(
    database: Option<&Path>,
    file: &Path,
    url: &str,
    lang: Option<String>,
) -> Result<()> {
    let config = load_config()?;
    Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;

    let body = std::fs::read(file).map_err(|e| SiteGraphError::io(file, e))?;
    let fetched = FetchedResource::new(url, url, resource_type_for(file), body);

    let pipeline = open_pipeline(database, &config, lang).await?;
    let reporter = CliProgress::new();
    let summary = pipeline.ingest_all([fetched], &reporter).await;

    print_summary(&summary);
    if let Some((url, error)) = summary.errors.first() {
        return Err(eyre!("failed to ingest {url}: {error}"));
    }
    Ok(())
}

/// Resource type of a local file, by extension.
fn resource_type_for(file: &Path) -> ResourceType {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => ResourceType::Document,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" | "ico" => ResourceType::Image,
        _ => ResourceType::Html,
    }
}

async fn cmd_extract(lang: &str, text: &str) -> Result<()> {
    let config = load_config()?;
    let taggers = TaggerRegistry::from_config(&TaggerConfig::from(&config))?;

    match pipeline::extract_sentence(&taggers, text, lang).await? {
        SentenceOutcome::Extracted(fragment) => {
            println!("{}", serde_json::to_string_pretty(&fragment)?);
        }
        SentenceOutcome::NoRelationships => {
            println!("No relationships: fewer than two distinct nouns.");
        }
        SentenceOutcome::UnsupportedLanguage => {
            return Err(eyre!(
                "no tagger for language '{lang}' (supported: {})",
                taggers.languages().join(", ")
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspection commands
// ---------------------------------------------------------------------------

/// JSON view of a stored resource; the raw body is reported by size only.
#[derive(Serialize)]
struct ResourceView<'a> {
    id: String,
    root_url: &'a str,
    origin_url: &'a str,
    captured_at: String,
    #[serde(rename = "type")]
    resource_type: ResourceType,
    outbound_links: &'a [String],
    title: Option<&'a str>,
    meta_description: Option<&'a str>,
    meta_keywords: Option<&'a str>,
    normalized_text: Option<&'a str>,
    fingerprint: &'a str,
    language_code: Option<&'a str>,
    raw_bytes: usize,
}

impl<'a> From<&'a Resource> for ResourceView<'a> {
    fn from(r: &'a Resource) -> Self {
        Self {
            id: r.id.to_string(),
            root_url: &r.root_url,
            origin_url: &r.origin_url,
            captured_at: r.captured_at.to_rfc3339(),
            resource_type: r.resource_type,
            outbound_links: &r.outbound_links,
            title: r.title.as_deref(),
            meta_description: r.meta_description.as_deref(),
            meta_keywords: r.meta_keywords.as_deref(),
            normalized_text: r.normalized_text.as_deref(),
            fingerprint: &r.fingerprint,
            language_code: r.language_code.as_deref(),
            raw_bytes: r.raw.len(),
        }
    }
}

async fn cmd_latest(database: Option<&Path>, url: &str) -> Result<()> {
    let storage = open_readonly(database).await?;
    let resource = storage
        .find_latest(url)
        .await?
        .ok_or_else(|| eyre!("no stored capture for '{url}'"))?;

    println!("{}", serde_json::to_string_pretty(&ResourceView::from(&resource))?);
    Ok(())
}

async fn cmd_history(database: Option<&Path>, url: &str) -> Result<()> {
    let storage = open_readonly(database).await?;
    let captures = storage.find_all(url).await?;
    if captures.is_empty() {
        return Err(eyre!("no stored capture for '{url}'"));
    }

    println!();
    println!("  {url}: {} capture(s)", captures.len());
    for r in &captures {
        println!(
            "  {}  {:<8}  {}  {}",
            r.captured_at.format("%Y-%m-%d %H:%M:%S"),
            r.resource_type,
            &r.fingerprint[..r.fingerprint.len().min(12)],
            r.id
        );
    }
    println!();
    Ok(())
}

#[derive(Serialize)]
struct GraphDump {
    nodes: Vec<sitegraph_shared::GraphNode>,
    relationships: Vec<sitegraph_shared::GraphRelationship>,
}

async fn cmd_graph(database: Option<&Path>, json: bool) -> Result<()> {
    let storage = open_readonly(database).await?;

    if json {
        let dump = GraphDump {
            nodes: storage.list_nodes().await?,
            relationships: storage.list_relationships().await?,
        };
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    let stats = storage.graph_stats().await?;
    println!();
    println!("  Resources:     {}", storage.resource_count().await?);
    println!("  Nodes:         {}", stats.nodes);
    println!("  Relationships: {}", stats.relationships);
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_crawl(crawl: &CrawlResult) {
    println!();
    println!("  Crawl finished");
    println!("  Fetched:   {}", crawl.resources_fetched);
    println!("  Skipped:   {}", crawl.resources_skipped);
    println!("  Errors:    {}", crawl.errors.len());
    for (url, error) in &crawl.errors {
        println!("    {url}: {error}");
    }
}

fn print_summary(summary: &IngestSummary) {
    println!();
    println!("  New:        {}", summary.resources_new);
    println!("  Changed:    {}", summary.resources_changed);
    println!("  Unchanged:  {}", summary.resources_unchanged);
    println!("  Empty:      {}", summary.resources_empty);
    println!("  Failed:     {}", summary.resources_failed);
    println!("  Untagged:   {}", summary.resources_untagged);
    println!(
        "  Sentences:  {} tagged, {} skipped",
        summary.sentences_tagged, summary.sentences_skipped
    );
    println!(
        "  Graph:      {} nodes, {} new / {} existing relationships, {} failed",
        summary.graph.nodes_upserted,
        summary.graph.relationships_created,
        summary.graph.relationships_matched,
        summary.graph.relationships_failed
    );
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
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
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn resource_done(
        &self,
        url: &str,
        outcome: sitegraph_shared::Result<&IngestOutcome>,
        processed: usize,
    ) {
        let status = match outcome {
            Ok(IngestOutcome::Stored(_)) => "stored",
            Ok(IngestOutcome::Unchanged) => "unchanged",
            Ok(IngestOutcome::Empty) => "empty",
            Err(_) => "failed",
        };
        self.spinner
            .set_message(format!("[{processed}] {status} {url}"));
    }

    fn done(&self, _summary: &IngestSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
