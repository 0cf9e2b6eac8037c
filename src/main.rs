mod audit;
mod config;
mod error;
mod extract;
mod fix;
mod matcher;
mod pipeline;
mod report;
mod scan;
mod spec;
mod suggest;
mod verify;
mod watch;

use clap::Parser;
use colored::Colorize;
use config::Config;
use error::Result;
use pipeline::Pipeline;
use spec::SpecLoader;
use std::error::Error as _;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docverify - Detects drift between API documentation and an OpenAPI specification
#[derive(Parser, Debug)]
#[command(name = "docverify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = ".docverify.toml")]
    pub config: PathBuf,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Base URL of the service used for live checks
    #[arg(long, env = "FUSIONAUTH_URL")]
    pub url: Option<String>,

    /// API key; live checks are skipped without one
    #[arg(long, env = "FUSIONAUTH_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Print every verified endpoint
    #[arg(short, long)]
    pub verbose: bool,

    /// Rewrite deprecated or mistyped references in place after reporting
    #[arg(long)]
    pub fix_docs: bool,

    /// Keep running and re-verify documents as they change
    #[arg(long)]
    pub watch: bool,

    /// Also report deprecated operations that are undocumented
    #[arg(long)]
    pub include_deprecated: bool,

    /// Live request timeout in milliseconds [default: 10000]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Endpoints verified concurrently per batch [default: 5]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Retry budget for live checks (recorded, not yet used)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Where to write the JSON report
    #[arg(long)]
    pub report_path: Option<PathBuf>,

    /// Local specification cache
    #[arg(long)]
    pub spec_path: Option<PathBuf>,

    /// Remote specification fetched when the cache is unusable
    #[arg(long)]
    pub spec_url: Option<String>,

    /// Documentation root (can be repeated)
    #[arg(short, long)]
    pub docs: Vec<PathBuf>,

    /// File glob to scan (can be repeated)
    #[arg(short, long)]
    pub pattern: Vec<String>,

    /// Glob to exclude (can be repeated)
    #[arg(short, long)]
    pub exclude: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_tracing(verbose);

    let code = match run(cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            if verbose {
                let mut source = e.source();
                while let Some(cause) = source {
                    eprintln!("  {} {}", "caused by:".dimmed(), cause);
                    source = cause.source();
                }
                eprintln!("{e:#?}");
            }
            1
        }
    };

    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "docverify=debug" } else { "docverify=warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .try_init();
}

/// `Ok(true)` when every documented endpoint verified cleanly.
#[tokio::main(flavor = "current_thread")]
async fn run(cli: Cli) -> Result<bool> {
    let config = Config::resolve(&cli)?;
    tracing::debug!(roots = ?config.doc_roots, live = config.live_checks_enabled(), "resolved configuration");
    if config.retries > 0 {
        tracing::debug!(retries = config.retries, "retries are recorded but live checks are single-shot");
    }

    let spec = SpecLoader::from_config(&config).load().await?;
    tracing::info!(version = spec.version(), operations = spec.operation_count(), "specification ready");

    let pipeline = Pipeline::new(&config, &spec)?;
    let outcome = pipeline.run().await?;
    if let Some(fixes) = &outcome.fixes {
        tracing::info!(
            files = fixes.files_changed,
            replacements = fixes.replacements,
            failures = fixes.failures.len(),
            "auto-fix finished"
        );
    }

    if config.watch {
        watch::watch(&pipeline, config.quiet).await?;
    }

    Ok(!outcome.report.has_failures())
}
