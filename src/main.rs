use anyhow::Result;
use blofin_scanner::comfy_table;
use blofin_scanner::filter_utils::InstrumentFilter;
use blofin_scanner::find_tickers::InstrumentCache;
use blofin_scanner::logger::init_logger;
use blofin_scanner::storage_utils::{AppConfig, AsyncStorageManager, CONFIG_NAME};
use blofin_scanner::{BlofinClient, ScanResult, Scanner};
use clap::Parser;
use std::future::pending;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const PROGRESS_WIDTH: usize = 30;

/// Multi-timeframe scanner for Blofin perpetual swaps.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of instruments to scan (overrides config)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    limit: Option<u16>,

    /// Instruments scanned in parallel (overrides config)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: Option<u16>,

    /// Rescan every N seconds until Ctrl-C
    #[arg(short, long)]
    interval: Option<u64>,

    /// Log filter, e.g. "debug" or "blofin_scanner=trace" (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    /// Directory holding config.json (defaults to ./storage next to the binary)
    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(limit) = self.limit {
            config.scan.limit = limit as usize;
        }
        if let Some(concurrency) = self.concurrency {
            config.scan.concurrency = concurrency as usize;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn progress_bar(done: usize, total: usize) -> String {
    let filled = PROGRESS_WIDTH * done.min(total) / total.max(1);
    format!(
        "[{}{}] {}/{}",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        done,
        total
    )
}

fn print_progress(done: usize, total: usize) {
    eprint!("\r{}", progress_bar(done, total));
    if done == total {
        eprintln!();
    }
}

/// A scan stopped early leaves the progress line without its newline.
fn progress_left_open(result: &ScanResult) -> bool {
    !result.is_empty() && result.len() < result.requested
}

/// Resolves once Ctrl-C was pressed.
async fn stop_requested(mut stop: watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let storage = match &args.storage_dir {
        Some(dir) => AsyncStorageManager::at(dir).await?,
        None => AsyncStorageManager::new_relative("storage").await?,
    };
    let mut config = AppConfig::load_or_init(&storage).await?;
    args.apply(&mut config);

    init_logger(&config.logging.level, &config.logging.format)?;
    info!(path = %storage.path_for(CONFIG_NAME).display(), "config loaded");

    let client = BlofinClient::new(&config.api.base_url, config.request_timeout())?;
    let scanner = Scanner::new(
        Arc::new(client),
        InstrumentFilter::perpetuals_quoted_in(&config.scan.quote_currency),
        InstrumentCache::new(config.scan.catalog_max_age()),
        config.scan.scan_options(),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = stop_tx.send(true);
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    loop {
        println!("\nFetching data for up to {} instruments...", config.scan.limit);
        let result = scanner
            .scan_until(config.scan.limit, print_progress, stop_requested(stop_rx.clone()))
            .await;
        if progress_left_open(&result) {
            eprintln!();
        }
        println!("{}", comfy_table::render(&result));

        let Some(interval) = args.interval else {
            break;
        };
        if *stop_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
            _ = stop_requested(stop_rx.clone()) => break,
        }
    }

    Ok(())
}
