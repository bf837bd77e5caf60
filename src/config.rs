//! Application configuration loaded from a JSON file and the environment.
//!
//! The file (path from `TICKERCAST_CONFIG`, default `config.json`) holds
//! everything except secrets. Provider credentials **must** come from
//! environment variables:
//! - `SCHWAB_API_KEY` and `SCHWAB_API_SECRET` (both required)
//! - `SCHWAB_ACCESS_TOKEN` and/or `SCHWAB_REFRESH_TOKEN` (at least one)
//!
//! Provider and subscription source are string tags in the file, resolved
//! once here into [`ProviderKind`] and [`SourceKind`]; an unrecognized tag
//! fails the load.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;
use zeroize::Zeroizing;

use crate::bucketer::CatchUp;
use crate::logging::LoggingConfig;
use crate::models::Subscription;
use crate::publisher::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::{Result, TickercastError};

/// Config file used when `TICKERCAST_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "config.json";

const DEFAULT_SCHWAB_BASE_URL: &str = "https://api.schwabapi.com";
const DEFAULT_SCHWAB_TOKEN_URL: &str = "https://api.schwabapi.com/v1/oauth/token";
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";

/// Market data providers this binary can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Schwab,
}

impl FromStr for ProviderKind {
    type Err = TickercastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schwab" => Ok(ProviderKind::Schwab),
            _ => Err(TickercastError::UnknownProvider(s.to_string())),
        }
    }
}

/// Where the subscription list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Alert records in a JSON file, re-read every cycle.
    Alerts,
    /// The fixed `subscriptions` list in the config file.
    Static,
}

impl FromStr for SourceKind {
    type Err = TickercastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alerts" => Ok(SourceKind::Alerts),
            "static" => Ok(SourceKind::Static),
            _ => Err(TickercastError::UnknownSubscriptionSource(s.to_string())),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub poll_interval: Duration,
    pub catch_up: CatchUp,
    pub provider: ProviderKind,
    pub subscription_source: SourceKind,
    pub schwab: SchwabConfig,
    pub alerts: AlertsConfig,
    pub subscriptions: Vec<Subscription>,
    pub bus: BusConfig,
    pub logging: LoggingConfig,
}

/// Schwab-specific configuration values.
#[derive(Debug)]
pub struct SchwabConfig {
    pub base_url: String,
    pub token_url: String,
    pub timeout: Duration,
    /// `None` unless Schwab is the selected provider.
    pub credentials: Option<SchwabCredentials>,
}

/// Secrets for the Schwab API, read from the environment.
pub struct SchwabCredentials {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
    pub access_token: Option<Zeroizing<String>>,
    pub refresh_token: Option<Zeroizing<String>>,
}

impl fmt::Debug for SchwabCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchwabCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Alerts file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertsConfig {
    pub path: String,
}

/// Pub/sub bus connection and retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub redis_url: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

/// On-disk shape of the configuration file.
#[derive(Deserialize)]
struct FileConfig {
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default)]
    catch_up: CatchUp,
    provider: String,
    subscription_source: String,
    #[serde(default)]
    schwab: SchwabSection,
    #[serde(default)]
    alerts: AlertsSection,
    #[serde(default)]
    subscriptions: Vec<Subscription>,
    #[serde(default)]
    bus: BusSection,
    #[serde(default)]
    logging: LoggingConfig,
}

fn default_poll_interval_ms() -> u64 {
    3000
}

#[derive(Deserialize)]
#[serde(default)]
struct SchwabSection {
    base_url: String,
    token_url: String,
    timeout_ms: u64,
}

impl Default for SchwabSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SCHWAB_BASE_URL.to_string(),
            token_url: DEFAULT_SCHWAB_TOKEN_URL.to_string(),
            timeout_ms: 5000,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct AlertsSection {
    path: String,
}

impl Default for AlertsSection {
    fn default() -> Self {
        Self {
            path: "alerts.json".to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct BusSection {
    redis_url: String,
    max_attempts: u32,
    retry_delay_ms: u64,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: u64::try_from(DEFAULT_RETRY_DELAY.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a JSON file plus the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::Config`] if the file cannot be read, and
    /// any error from [`AppConfig::from_json`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TickercastError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&contents, non_empty_var)
    }

    /// Parses configuration JSON, looking secrets up through `env`.
    ///
    /// # Errors
    ///
    /// - [`TickercastError::Json`] if the JSON is malformed or a required
    ///   field is absent.
    /// - [`TickercastError::UnknownProvider`] /
    ///   [`TickercastError::UnknownSubscriptionSource`] for unrecognized tags.
    /// - [`TickercastError::UnknownFrequency`] / [`TickercastError::UnknownPeriod`]
    ///   for an invalid static subscription.
    /// - [`TickercastError::Config`] for invalid values or missing credentials.
    pub fn from_json(json: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file: FileConfig = serde_json::from_str(json)?;

        let provider: ProviderKind = file.provider.parse()?;
        let subscription_source: SourceKind = file.subscription_source.parse()?;

        if file.poll_interval_ms == 0 {
            return Err(TickercastError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if file.bus.max_attempts == 0 {
            return Err(TickercastError::Config(
                "bus.max_attempts must be at least 1".to_string(),
            ));
        }

        for subscription in &file.subscriptions {
            subscription.parsed_frequency()?;
            subscription.parsed_period()?;
        }
        if subscription_source == SourceKind::Static && file.subscriptions.is_empty() {
            warn!("Static subscription source configured with no subscriptions");
        }

        let credentials = match provider {
            ProviderKind::Schwab => Some(schwab_credentials(&env)?),
        };

        Ok(AppConfig {
            poll_interval: Duration::from_millis(file.poll_interval_ms),
            catch_up: file.catch_up,
            provider,
            subscription_source,
            schwab: SchwabConfig {
                base_url: file.schwab.base_url,
                token_url: file.schwab.token_url,
                timeout: Duration::from_millis(file.schwab.timeout_ms),
                credentials,
            },
            alerts: AlertsConfig {
                path: file.alerts.path,
            },
            subscriptions: file.subscriptions,
            bus: BusConfig {
                redis_url: file.bus.redis_url,
                max_attempts: file.bus.max_attempts,
                retry_delay: Duration::from_millis(file.bus.retry_delay_ms),
            },
            logging: file.logging,
        })
    }
}

/// Loads the application configuration from the file named by
/// `TICKERCAST_CONFIG` (default `config.json`).
///
/// # Errors
///
/// Any error from [`AppConfig::load`].
pub fn fetch_config() -> Result<AppConfig> {
    let path = non_empty_var("TICKERCAST_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    AppConfig::load(Path::new(&path))
}

/// Reads Schwab secrets; key and secret must come as a pair and at least
/// one token must be present.
fn schwab_credentials(env: &impl Fn(&str) -> Option<String>) -> Result<SchwabCredentials> {
    let api_key = env("SCHWAB_API_KEY");
    let api_secret = env("SCHWAB_API_SECRET");

    let (api_key, api_secret) = match (api_key, api_secret) {
        (Some(key), Some(secret)) => (key, secret),
        (Some(_), None) => {
            return Err(TickercastError::Config(
                "SCHWAB_API_KEY is set but SCHWAB_API_SECRET is missing".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(TickercastError::Config(
                "SCHWAB_API_SECRET is set but SCHWAB_API_KEY is missing".to_string(),
            ));
        }
        (None, None) => {
            return Err(TickercastError::Config(
                "SCHWAB_API_KEY and SCHWAB_API_SECRET must be set".to_string(),
            ));
        }
    };

    let access_token = env("SCHWAB_ACCESS_TOKEN").map(Zeroizing::new);
    let refresh_token = env("SCHWAB_REFRESH_TOKEN").map(Zeroizing::new);
    if access_token.is_none() && refresh_token.is_none() {
        return Err(TickercastError::Config(
            "one of SCHWAB_ACCESS_TOKEN or SCHWAB_REFRESH_TOKEN must be set".to_string(),
        ));
    }

    Ok(SchwabCredentials {
        api_key,
        api_secret: Zeroizing::new(api_secret),
        access_token,
        refresh_token,
    })
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
