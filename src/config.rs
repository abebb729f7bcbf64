use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::ml::HistoryThresholds;
use crate::models::ForecastPeriod;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_SHORT_HISTORY_DAYS: usize = 7;
const DEFAULT_MEDIUM_HISTORY_DAYS: usize = 30;
const DEFAULT_LONG_HISTORY_DAYS: usize = 90;
const DEFAULT_INSUFFICIENT_DATA_CONFIDENCE: u8 = 20;
const DEFAULT_BULK_CONCURRENCY: usize = 8;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PERSIST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// How bulk generation counts products that have no consumption history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientDataPolicy {
    /// Record the item as failed with an `insufficient_data` reason.
    #[default]
    Fail,
    /// Persist the degraded zero forecast and count it as succeeded.
    Degrade,
}

/// Lookback windows, in days, used when fetching consumption history.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LookbackConfig {
    #[validate(range(min = 1, max = 3650))]
    #[serde(default = "default_month_lookback")]
    pub month: u32,
    #[validate(range(min = 1, max = 3650))]
    #[serde(default = "default_quarter_lookback")]
    pub quarter: u32,
    #[validate(range(min = 1, max = 3650))]
    #[serde(default = "default_year_lookback")]
    pub year: u32,
}

impl Default for LookbackConfig {
    fn default() -> Self {
        Self {
            month: default_month_lookback(),
            quarter: default_quarter_lookback(),
            year: default_year_lookback(),
        }
    }
}

impl LookbackConfig {
    pub fn days_for(&self, period: ForecastPeriod) -> u32 {
        match period {
            ForecastPeriod::Month => self.month,
            ForecastPeriod::Quarter => self.quarter,
            ForecastPeriod::Year => self.year,
        }
    }
}

/// Forecasting engine configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_history_thresholds"))]
pub struct ForecastConfig {
    /// Below this many days of history a plain moving average is used
    #[serde(default = "default_short_history_days")]
    pub short_history_days: usize,

    /// Below this many days a weighted moving average is used
    #[serde(default = "default_medium_history_days")]
    pub medium_history_days: usize,

    /// Below this many days an exponential moving average is used; above, regression
    #[serde(default = "default_long_history_days")]
    pub long_history_days: usize,

    /// Confidence reported for a product without any history
    #[validate(range(max = 100))]
    #[serde(default = "default_insufficient_data_confidence")]
    pub insufficient_data_confidence: u8,

    /// Maximum forecasts in flight during bulk generation
    #[validate(range(min = 1, max = 64))]
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,

    /// Timeout for history, stock and catalog lookups
    #[validate(range(min = 1))]
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Timeout for storing a forecast
    #[validate(range(min = 1))]
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,

    #[serde(default)]
    pub insufficient_data_policy: InsufficientDataPolicy,

    #[serde(default)]
    pub lookback_days: LookbackConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            short_history_days: DEFAULT_SHORT_HISTORY_DAYS,
            medium_history_days: DEFAULT_MEDIUM_HISTORY_DAYS,
            long_history_days: DEFAULT_LONG_HISTORY_DAYS,
            insufficient_data_confidence: DEFAULT_INSUFFICIENT_DATA_CONFIDENCE,
            bulk_concurrency: DEFAULT_BULK_CONCURRENCY,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            persist_timeout_ms: DEFAULT_PERSIST_TIMEOUT_MS,
            insufficient_data_policy: InsufficientDataPolicy::default(),
            lookback_days: LookbackConfig::default(),
        }
    }
}

impl ForecastConfig {
    pub fn thresholds(&self) -> HistoryThresholds {
        HistoryThresholds {
            short: self.short_history_days,
            medium: self.medium_history_days,
            long: self.long_history_days,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_millis(self.persist_timeout_ms)
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Application environment
    pub environment: String,

    /// Logging level
    #[validate(custom = "validate_log_level")]
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// JSON dataset backing the in-memory collaborators
    #[serde(default)]
    pub data_file: Option<String>,

    /// Capacity of the engine event channel
    #[validate(range(min = 1, max = 1_000_000))]
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Forecasting engine settings
    #[serde(default)]
    pub forecast: ForecastConfig,
}

impl AppConfig {
    pub fn new(environment: String) -> Self {
        Self {
            environment,
            log_level: default_log_level(),
            log_json: false,
            data_file: None,
            event_channel_capacity: default_event_channel_capacity(),
            forecast: ForecastConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Runs field validation on the whole tree, nested sections included.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        self.validate()?;
        self.forecast.validate()?;
        self.forecast.lookback_days.validate()
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_short_history_days() -> usize {
    DEFAULT_SHORT_HISTORY_DAYS
}

fn default_medium_history_days() -> usize {
    DEFAULT_MEDIUM_HISTORY_DAYS
}

fn default_long_history_days() -> usize {
    DEFAULT_LONG_HISTORY_DAYS
}

fn default_insufficient_data_confidence() -> u8 {
    DEFAULT_INSUFFICIENT_DATA_CONFIDENCE
}

fn default_bulk_concurrency() -> usize {
    DEFAULT_BULK_CONCURRENCY
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

fn default_persist_timeout_ms() -> u64 {
    DEFAULT_PERSIST_TIMEOUT_MS
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_month_lookback() -> u32 {
    90
}

fn default_quarter_lookback() -> u32 {
    180
}

fn default_year_lookback() -> u32 {
    365
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_history_thresholds(config: &ForecastConfig) -> Result<(), ValidationError> {
    config.thresholds().check().map_err(|message| {
        let mut err = ValidationError::new("history_thresholds");
        err.message = Some(message.into());
        err
    })
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("pharmastock_forecast={},pharmastock_cli={}", level, level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit configuration directory.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&config_dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&config_dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate_all().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
