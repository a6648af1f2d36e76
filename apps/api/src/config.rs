use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub import_poll_interval: Duration,
    pub ai_timeout: Duration,
    pub retry: RetryPolicy,
    pub suggestion_table_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = RetryPolicy::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            import_poll_interval: Duration::from_secs(parse_env("IMPORT_POLL_INTERVAL_SECS", 5u64)?),
            ai_timeout: Duration::from_secs(parse_env("AI_TIMEOUT_SECS", 60u64)?),
            retry: RetryPolicy {
                max_attempts: parse_env("RETRY_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
                delay: Duration::from_millis(parse_env(
                    "RETRY_DELAY_MS",
                    defaults.delay.as_millis() as u64,
                )?),
                backoff_multiplier: parse_env(
                    "RETRY_BACKOFF_MULTIPLIER",
                    defaults.backoff_multiplier,
                )?,
            },
            suggestion_table_path: optional_env("SUGGESTION_TABLE_PATH"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Defaults with no AI keys and no real database.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/recipedeck_test".to_string(),
            gemini_api_key: None,
            anthropic_api_key: None,
            port: 0,
            rust_log: "debug".to_string(),
            import_poll_interval: Duration::from_secs(5),
            ai_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            suggestion_table_path: None,
        }
    }
}
