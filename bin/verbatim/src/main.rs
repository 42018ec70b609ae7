//! Verbatim CLI
//!
//! `verbatim scan` walks a music tree into an index, `verbatim cat` dumps
//! an index with its links.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verbatim_common::{Config, Error};
use verbatim_index::{Database, Indexer, LoftyExtractor, MetricsReport, WalkStats, WorkerPool};

#[derive(Parser, Debug)]
#[command(name = "verbatim")]
#[command(about = "Concurrent audio metadata indexer")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index every file under a directory
    Scan(ScanArgs),
    /// Print every record in an index
    Cat(CatArgs),
}

#[derive(ClapArgs, Debug)]
struct ScanArgs {
    /// Index database file
    db: PathBuf,

    /// Directory to scan
    dir: PathBuf,

    /// Worker threads
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Configuration file (TOML)
    #[arg(long, env = "VERBATIM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ClapArgs, Debug)]
struct CatArgs {
    /// Index database file
    db: PathBuf,

    /// Print the record count after the listing
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version go to stdout and are not failures
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
            let _ = e.print();
            return code;
        }
    };

    let result = match args.command {
        Commands::Scan(scan_args) => scan(scan_args),
        Commands::Cat(cat_args) => cat(&cat_args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Merge the config file with CLI flags (CLI takes precedence)
fn resolve_config(args: &ScanArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(concurrency) = args.concurrency {
        config.index.concurrency = concurrency;
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    if args.verbose {
        config.logging.level = "debug".to_string();
    }

    config.validate()?;
    Ok(config)
}

fn scan(args: ScanArgs) -> Result<()> {
    let started = Instant::now();
    let config = resolve_config(&args)?;
    init_logging(&config.logging.level);
    debug!("Resolved config: {:?}", config);
    if !args.dir.is_dir() {
        let msg = format!("{} is not a directory", args.dir.display());
        return Err(Error::invalid_argument(msg).into());
    }

    let indexer = Indexer::from_config(&config.index, Arc::new(LoftyExtractor))
        .context("Failed to start worker pool")?;
    indexer
        .open_for_update(&args.db)
        .with_context(|| format!("Failed to open index {}", args.db.display()))?;

    info!(
        "Scanning {} with {} workers",
        args.dir.display(),
        config.index.concurrency
    );
    let stats = indexer.scan(&args.dir);
    let report = indexer.report();

    let stdout = std::io::stdout();
    print_report(&mut stdout.lock(), &args.dir, &report, &stats, started)?;
    Ok(())
}

fn print_report(
    out: &mut dyn Write,
    dir: &Path,
    report: &MetricsReport,
    stats: &WalkStats,
    started: Instant,
) -> std::io::Result<()> {
    writeln!(out, "Scanned {}", dir.display())?;
    writeln!(out, "  {}", report.total)?;
    for (i, counters) in report.per_worker.iter().enumerate() {
        writeln!(out, "  worker {:>3}: {}", i + 1, counters)?;
    }
    writeln!(out, "  spread: {:.2}%", report.spread)?;
    writeln!(
        out,
        "  walk: {:?} ({} entries, {} skipped)",
        stats.elapsed, stats.dispatched, stats.skipped
    )?;
    writeln!(out, "  elapsed: {:?}", started.elapsed())?;
    Ok(())
}

fn cat(args: &CatArgs) -> Result<()> {
    init_logging(if args.verbose { "debug" } else { "warn" });

    // Listing runs on the caller's thread; no workers needed
    let pool = Arc::new(WorkerPool::new(0)?);
    let db = Database::new(pool, Arc::new(LoftyExtractor));
    db.open(&args.db)
        .with_context(|| format!("Failed to open index {}", args.db.display()))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let total = db.list_entries(&mut out)?;
    if args.verbose {
        writeln!(out, "Total #entries: {total}")?;
    }
    Ok(())
}
