//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BACKOFFICE_API_URL` - Base URL of the back-office REST backend
//!
//! ## Optional
//! - `BACKOFFICE_API_TOKEN` - Bearer token for the backend (checked for placeholders/entropy)
//! - `BACKOFFICE_SESSION_ID` - Session identifier forwarded as `X-Session-ID`
//! - `BACKOFFICE_HTTP_TIMEOUT_SECS` - Request timeout (default: 30)
//! - `CACHE_MAX_ENTRIES` - Response cache capacity (default: 100)
//! - `CACHE_DEFAULT_TTL_SECS` - TTL when none is given (default: 300)
//! - `CACHE_ORDER_LIST_TTL_SECS` - TTL for order list pages (default: 120)
//! - `CACHE_ORDER_DETAIL_TTL_SECS` - TTL for order details and histories (default: 300)
//! - `CACHE_SWEEP_PROBABILITY` - Chance a read sweeps expired entries (default: 0.1)
//! - `DRAFT_MAX_OPEN` - Maximum concurrent draft orders (default: 10)
//! - `DRAFT_SHIPPING_FEE` - Flat delivery fee (default: 30000)
//! - `DRAFT_CODE_PREFIX` - Prefix of generated order codes (default: HD)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - 0.0 to 1.0 (default: 1.0)
//!
//! Cache TTLs above 30 days are rejected.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use backoffice_core::Money;
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CODE_PREFIX: &str = "HD";
/// Upper bound for any cache TTL (30 days).
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Backend API configuration
    pub backend: BackendConfig,
    /// Response cache configuration
    pub cache: CacheConfig,
    /// Draft order configuration
    pub drafts: DraftConfig,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Backend REST API configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL all routes are resolved against
    pub base_url: Url,
    /// Bearer token, if the backend requires one
    pub api_token: Option<SecretString>,
    /// Session identifier forwarded for auditing
    pub session_id: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("session_id", &self.session_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Response cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries (0 disables caching)
    pub max_entries: usize,
    /// TTL used when a caller does not give one
    pub default_ttl: Duration,
    /// TTL for cached order list pages
    pub order_list_ttl: Duration,
    /// TTL for cached order details
    pub order_detail_ttl: Duration,
    /// Probability that a read also sweeps expired entries (0.0 to 1.0)
    pub sweep_probability: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            default_ttl: Duration::from_secs(300),    // 5 minutes
            order_list_ttl: Duration::from_secs(120), // 2 minutes
            order_detail_ttl: Duration::from_secs(300),
            sweep_probability: 0.1,
        }
    }
}

/// Draft order configuration.
#[derive(Debug, Clone)]
pub struct DraftConfig {
    /// Maximum number of concurrently open drafts
    pub max_open: usize,
    /// Flat fee charged on delivery orders
    pub shipping_fee: Money,
    /// Prefix of generated order codes
    pub code_prefix: String,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            max_open: 10,
            shipping_fee: Money::from(30_000),
            code_prefix: DEFAULT_CODE_PREFIX.to_string(),
        }
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(&|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// See [`AdminConfig::from_env`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_source(&|key| vars.get(key).cloned())
    }

    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = BackendConfig::from_source(source)?;
        let cache = CacheConfig::from_source(source)?;
        let drafts = DraftConfig::from_source(source)?;
        let log_format = match source("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let sentry_dsn = source("SENTRY_DSN");
        let sentry_environment = source("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = source("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = source("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            backend,
            cache,
            drafts,
            log_format,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }
}

impl BackendConfig {
    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = get_required(source, "BACKOFFICE_API_URL")?;
        let base_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("BACKOFFICE_API_URL".to_string(), e.to_string())
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "BACKOFFICE_API_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        let api_token = match source("BACKOFFICE_API_TOKEN") {
            Some(token) => {
                validate_secret_strength(&token, "BACKOFFICE_API_TOKEN")?;
                Some(SecretString::from(token))
            }
            None => None,
        };

        let timeout_secs: u64 = parse_or_default(source, "BACKOFFICE_HTTP_TIMEOUT_SECS", 30)?;

        Ok(Self {
            base_url,
            api_token,
            session_id: source("BACKOFFICE_SESSION_ID"),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl CacheConfig {
    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let sweep_probability: f64 = parse_or_default(
            source,
            "CACHE_SWEEP_PROBABILITY",
            defaults.sweep_probability,
        )?;
        if !(0.0..=1.0).contains(&sweep_probability) {
            return Err(ConfigError::InvalidEnvVar(
                "CACHE_SWEEP_PROBABILITY".to_string(),
                format!("must be between 0.0 and 1.0 (got {sweep_probability})"),
            ));
        }

        Ok(Self {
            max_entries: parse_or_default(source, "CACHE_MAX_ENTRIES", defaults.max_entries)?,
            default_ttl: parse_ttl_or_default(source, "CACHE_DEFAULT_TTL_SECS", defaults.default_ttl)?,
            order_list_ttl: parse_ttl_or_default(
                source,
                "CACHE_ORDER_LIST_TTL_SECS",
                defaults.order_list_ttl,
            )?,
            order_detail_ttl: parse_ttl_or_default(
                source,
                "CACHE_ORDER_DETAIL_TTL_SECS",
                defaults.order_detail_ttl,
            )?,
            sweep_probability,
        })
    }
}

impl DraftConfig {
    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let shipping_fee: Decimal =
            parse_or_default(source, "DRAFT_SHIPPING_FEE", defaults.shipping_fee.amount())?;
        if shipping_fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "DRAFT_SHIPPING_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Self {
            max_open: parse_or_default(source, "DRAFT_MAX_OPEN", defaults.max_open)?,
            shipping_fee: Money::new(shipping_fee),
            code_prefix: source("DRAFT_CODE_PREFIX").unwrap_or(defaults.code_prefix),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Get a required variable.
fn get_required(source: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    source(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse a variable, falling back to a default when unset.
fn parse_or_default<T>(
    source: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    source(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a cache TTL in whole seconds, falling back to a default when unset.
fn parse_ttl_or_default(
    source: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs = parse_or_default(source, key, default.as_secs())?;
    if secs > MAX_CACHE_TTL_SECS {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be at most {MAX_CACHE_TTL_SECS} seconds (got {secs})"),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}
