use anyhow::Context;
use chrono::Local;
use clap::Parser;
use property_scanner::{Config, PropertyScanner, SortPreference};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, info_span};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "logs";

/// Scan rental sites for new listings and send a summary of what's new
#[derive(Parser, Debug)]
#[command(name = "property-scanner", version)]
struct Args {
    /// Path to the JSON config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Also write logs to logs/scraper_<timestamp>.log
    #[arg(long)]
    log: bool,
}

/// Installs the global subscriber. With `to_file` the output goes to a fresh
/// file under `logs/`; the returned guard must live until the process exits.
fn init_logging(to_file: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !to_file {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
        return Ok(None);
    }

    std::fs::create_dir_all(LOG_DIR).context("creating logs directory")?;
    let file_name = format!("scraper_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
    let (writer, guard) = tracing_appender::non_blocking(rolling::never(LOG_DIR, &file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_ansi(false)
        .with_writer(writer)
        .init();
    info!("Logging to {LOG_DIR}/{file_name}");
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log)?;

    let options: Vec<&str> = SortPreference::ALL.iter().map(|s| s.as_str()).collect();
    info!("Available sort options: {}", options.join(", "));

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    };
    info!("Using sort type: {}", config.sort_type);

    let start = Instant::now();
    let span = info_span!("scan", config = %args.config.display());
    let mut scanner = PropertyScanner::new(config, span)?;
    scanner.run_scraper().await;

    info!("Scan finished in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
