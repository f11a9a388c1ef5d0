//! Splitbot - Main entry point

use anyhow::Result;
use chrono::Datelike;
use clap::Parser;
use splitbot::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "splitbot", version, about = "Split-entry, full-exit equity trading bot")]
struct Cli {
    /// Ticker symbol to trade
    #[arg(long)]
    symbol: Option<String>,

    /// Number of buy splits backing the session reservoir
    #[arg(long)]
    splits: Option<u32>,

    /// Operating environment: paper or live
    #[arg(long)]
    mode: Option<String>,

    /// Path to a config file (TOML, YAML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(symbol) = cli.symbol {
        config.symbol = symbol;
    }
    if let Some(splits) = cli.splits {
        config.split_count = splits;
    }
    if let Some(mode) = cli.mode {
        config.environment = mode.parse()?;
    }
    config.validate()?;

    let log_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(log_level))
        .with_target(false)
        .init();

    info!("Starting splitbot v{}", VERSION);
    info!("  Symbol: {}", config.symbol);
    info!("  Splits: {}", config.split_count);
    info!("  Environment: {:?}", config.environment);

    let credentials = Credentials::from_key_file(&config.key_file)?;
    info!("  Account: {}", credentials.account_no);

    let gateway = RestBrokerClient::new(config.environment, credentials);

    let this_year = chrono::Utc::now().year();
    let market = MarketClock::nyse(this_year, this_year + config.calendar.horizon_years)?;

    let mut settings = ControllerSettings::new(&config.symbol, config.split_count);
    settings.tick_interval = Duration::from_secs(config.trading.tick_interval_secs);
    settings.error_pause = Duration::from_secs(config.trading.error_pause_secs);
    settings.preopen_lead = Duration::from_secs(config.trading.preopen_lead_secs);
    settings.tranche_quantity = config.trading.tranche_quantity;

    let mut controller = TradingController::new(gateway, SystemClock, market, settings);

    tokio::select! {
        result = controller.run() => match result {
            Ok(RunOutcome::CapitalExhausted) => {
                warn!("Controller halted on capital exhaustion");
            }
            Err(e) => {
                error!("Fatal error: {}", e);
                return Err(e.into());
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}

fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}
