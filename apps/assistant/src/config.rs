use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a numeric one is malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub categories_api_url: String,
    pub candidates_api_url: String,
    pub jobs_api_url: String,
    pub port: u16,
    pub rust_log: String,
    pub timeouts: AgentTimeouts,
    /// Pause between streamed text fragments.
    pub stream_word_delay: Duration,
    pub remote_timeout: Duration,
    pub session_idle_ttl: Duration,
}

/// Deadlines applied to every model-assisted step. On expiry the step takes
/// its deterministic fallback.
#[derive(Debug, Clone, Copy)]
pub struct AgentTimeouts {
    pub intent: Duration,
    pub extraction: Duration,
    pub compose: Duration,
    pub title: Duration,
}

impl Default for AgentTimeouts {
    fn default() -> Self {
        Self {
            intent: Duration::from_millis(6_000),
            extraction: Duration::from_millis(8_000),
            compose: Duration::from_millis(8_000),
            title: Duration::from_millis(5_000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = AgentTimeouts::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            categories_api_url: require_env("CATEGORIES_API_URL")?,
            candidates_api_url: require_env("CANDIDATES_API_URL")?,
            jobs_api_url: require_env("JOBS_API_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            timeouts: AgentTimeouts {
                intent: millis_env("INTENT_TIMEOUT_MS", defaults.intent)?,
                extraction: millis_env("EXTRACTION_TIMEOUT_MS", defaults.extraction)?,
                compose: millis_env("COMPOSE_TIMEOUT_MS", defaults.compose)?,
                title: millis_env("TITLE_TIMEOUT_MS", defaults.title)?,
            },
            stream_word_delay: millis_env("STREAM_WORD_DELAY_MS", Duration::from_millis(30))?,
            remote_timeout: secs_env("REMOTE_TIMEOUT_SECS", Duration::from_secs(15))?,
            session_idle_ttl: secs_env("SESSION_IDLE_TTL_SECS", Duration::from_secs(3_600))?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn millis_env(key: &str, default: Duration) -> Result<Duration> {
    optional_u64(key)
        .map(|value| value.map(Duration::from_millis).unwrap_or(default))
}

fn secs_env(key: &str, default: Duration) -> Result<Duration> {
    optional_u64(key).map(|value| value.map(Duration::from_secs).unwrap_or(default))
}

fn optional_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
impl Config {
    /// Config for router tests: no real endpoints, no pacing between fragments.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/assistant_test".to_string(),
            anthropic_api_key: "test-key".to_string(),
            categories_api_url: "http://localhost/categories".to_string(),
            candidates_api_url: "http://localhost/candidates".to_string(),
            jobs_api_url: "http://localhost/jobs".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            timeouts: AgentTimeouts::default(),
            stream_word_delay: Duration::ZERO,
            remote_timeout: Duration::from_secs(1),
            session_idle_ttl: Duration::from_secs(60),
        }
    }
}
