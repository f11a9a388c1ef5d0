//! Configuration management
//! Supports TOML, YAML, JSON config files and the brokerage key file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ticker symbol to trade
    pub symbol: String,
    /// Number of buy splits backing the session reservoir
    pub split_count: u32,
    /// Operating environment
    pub environment: Environment,
    /// Path to the 3-line brokerage key file
    pub key_file: PathBuf,
    /// Trading loop parameters
    pub trading: TradingConfig,
    /// Calendar parameters
    pub calendar: CalendarConfig,
    /// Logging level
    pub log_level: Option<String>,
}

/// Operating environment: the paper environment targets the brokerage
/// sandbox host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Paper,
    Live,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paper" | "test" => Ok(Self::Paper),
            "live" | "real" => Ok(Self::Live),
            other => anyhow::bail!("unknown environment '{}' (expected paper or live)", other),
        }
    }
}

/// Trading loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Decision cadence in seconds while the session is open (default: 3)
    pub tick_interval_secs: u64,
    /// Pause in seconds after a transient gateway error (default: 5)
    pub error_pause_secs: u64,
    /// Pre-open wakeup lead in seconds (default: 600)
    pub preopen_lead_secs: u64,
    /// Shares per tranche order (default: 1.0)
    pub tranche_quantity: f64,
}

/// Calendar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Years of sessions generated past the current one (default: 2)
    pub horizon_years: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "SOXL".to_string(),
            split_count: 40,
            environment: Environment::Paper,
            key_file: PathBuf::from("keys/paper.key"),
            trading: TradingConfig {
                tick_interval_secs: 3,
                error_pause_secs: 5,
                preopen_lead_secs: 600,
                tranche_quantity: 1.0,
            },
            calendar: CalendarConfig { horizon_years: 2 },
            log_level: Some("info".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;

        let config = if path.extension().map(|e| e == "toml").unwrap_or(false) {
            toml::from_str(&content)?
        } else if path.extension().map(|e| e == "yaml" || e == "yml").unwrap_or(false) {
            serde_yaml::from_str(&content)?
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            // Try to auto-detect format
            if content.trim().starts_with('{') {
                serde_json::from_str(&content)?
            } else if content.contains("---") {
                serde_yaml::from_str(&content)?
            } else {
                toml::from_str(&content)?
            }
        };

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load from default locations
    pub fn load() -> anyhow::Result<Self> {
        let locations = vec![
            "splitbot.toml",
            "splitbot.yaml",
            "splitbot.yml",
            "config.toml",
            "config.yaml",
        ];

        for location in &locations {
            if std::path::Path::new(location).exists() {
                return Self::from_file(location);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let config_file = config_dir.join("splitbot/config.toml");
            if config_file.exists() {
                return Self::from_file(config_file);
            }
        }

        anyhow::bail!("No configuration file found. Expected one of: {:?}", locations)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.symbol.is_empty() {
            anyhow::bail!("Symbol is required");
        }
        if self.split_count == 0 {
            anyhow::bail!("Split count must be positive");
        }
        if self.trading.tranche_quantity <= 0.0 {
            anyhow::bail!("Tranche quantity must be positive");
        }
        if self.trading.tick_interval_secs == 0 {
            anyhow::bail!("Tick interval must be at least one second");
        }
        if self.calendar.horizon_years < 0 {
            anyhow::bail!("Calendar horizon cannot be negative");
        }
        Ok(())
    }
}

/// Brokerage credentials loaded from the key file.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub account_no: String,
}

// Manual Debug so a log line can never leak the secret.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"******")
            .field("api_secret", &"******")
            .field("account_no", &self.account_no)
            .finish()
    }
}

impl Credentials {
    /// Key files hold three lines: api key, api secret, account number.
    pub fn from_key_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read key file {}: {}", path.display(), e))?;

        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        let api_key = lines.next();
        let api_secret = lines.next();
        let account_no = lines.next();

        match (api_key, api_secret, account_no) {
            (Some(key), Some(secret), Some(account)) => Ok(Self {
                api_key: key.to_string(),
                api_secret: secret.to_string(),
                account_no: account.to_string(),
            }),
            _ => anyhow::bail!(
                "Key file {} must hold three lines: api key, api secret, account number",
                path.display()
            ),
        }
    }
}
