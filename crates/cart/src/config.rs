//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_BASE_URL` - Base URL of the cart backend (e.g., <https://api.example.com/v1/>)
//! - `CART_API_TOKEN` - Bearer token for the cart backend (high entropy)
//!
//! ## Optional
//! - `CART_STATE_PATH` - Where the cart is persisted (default: .basket/cart.json)
//! - `CART_HTTP_TIMEOUT_SECS` - Backend request timeout (default: 10)
//! - `CART_CATALOG_CACHE_TTL_SECS` - Product cache TTL (default: 300)
//! - `CART_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "put-your",
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
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Cart application configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Cart backend connection settings
    pub backend: BackendConfig,
    /// File the cart collections are persisted to
    pub state_path: PathBuf,
    /// How long catalog products stay cached
    pub catalog_cache_ttl: Duration,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Cart backend configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL, always ending in `/`
    pub base_url: Url,
    /// Bearer token sent with every request
    pub api_token: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`CartConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let backend = BackendConfig {
            base_url: parse_base_url("CART_API_BASE_URL", &env.required("CART_API_BASE_URL")?)?,
            api_token: get_validated_secret(&env, "CART_API_TOKEN")?,
            timeout: Duration::from_secs(env.parsed_or("CART_HTTP_TIMEOUT_SECS", 10)?),
        };

        Ok(Self {
            backend,
            state_path: PathBuf::from(env.or_default("CART_STATE_PATH", ".basket/cart.json")),
            catalog_cache_ttl: Duration::from_secs(
                env.parsed_or("CART_CATALOG_CACHE_TTL_SECS", 300)?,
            ),
            log_format: env.parsed_or("CART_LOG_FORMAT", LogFormat::Pretty)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }

    /// Path of the file holding the CLI's session flag.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.state_path.with_extension("session.json")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        (self.0)(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Parse a base URL and make sure relative joins land below its path.
fn parse_base_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
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

/// Load and validate a secret.
fn get_validated_secret<F: Fn(&str) -> Option<String>>(
    env: &Env<'_, F>,
    key: &str,
) -> Result<SecretString, ConfigError> {
    let value = env.required(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Expose the token for an outgoing request header.
pub(crate) fn bearer(token: &SecretString) -> &str {
    token.expose_secret()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOKEN: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CartConfig::from_lookup(lookup(&[
            ("CART_API_BASE_URL", "https://api.shop.test/v1"),
            ("CART_API_TOKEN", TOKEN),
        ]))
        .unwrap();

        assert_eq!(config.backend.base_url.as_str(), "https://api.shop.test/v1/");
        assert_eq!(config.backend.timeout, Duration::from_secs(10));
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.state_path, PathBuf::from(".basket/cart.json"));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = CartConfig::from_lookup(lookup(&[
            ("CART_API_BASE_URL", "http://127.0.0.1:8080/"),
            ("CART_API_TOKEN", TOKEN),
            ("CART_STATE_PATH", "/tmp/cart.json"),
            ("CART_HTTP_TIMEOUT_SECS", "3"),
            ("CART_CATALOG_CACHE_TTL_SECS", "60"),
            ("CART_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.backend.timeout, Duration::from_secs(3));
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.session_path(),
            PathBuf::from("/tmp/cart.session.json")
        );
    }

    #[test]
    fn test_missing_base_url() {
        let err = CartConfig::from_lookup(lookup(&[("CART_API_TOKEN", TOKEN)])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "CART_API_BASE_URL"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = CartConfig::from_lookup(lookup(&[
            ("CART_API_BASE_URL", "https://api.shop.test/"),
            ("CART_API_TOKEN", TOKEN),
            ("CART_HTTP_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "CART_HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_placeholder_token_rejected() {
        let err = CartConfig::from_lookup(lookup(&[
            ("CART_API_BASE_URL", "https://api.shop.test/"),
            ("CART_API_TOKEN", "your-api-token-here"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy(TOKEN) > 3.3);
    }

    #[test]
    fn test_low_entropy_token_rejected() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_backend_debug_redacts_token() {
        let config = BackendConfig {
            base_url: Url::parse("https://api.shop.test/").unwrap(),
            api_token: SecretString::from("super_private_token_value"),
            timeout: Duration::from_secs(1),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("api.shop.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_private_token_value"));
    }
}
