use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Where finished interview summaries are persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryBackend {
    Postgres { database_url: String },
    Redis { redis_url: String },
    /// Process-local; lost on restart.
    Memory,
}

/// Fixed shape of every interview session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterviewSettings {
    pub question_count: u32,
    pub question_time: Duration,
    pub total_time: Duration,
    /// Period of the timer tick. One tick counts as one second of budget.
    pub tick_period: Duration,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            question_count: 10,
            question_time: Duration::from_secs(120),
            total_time: Duration::from_secs(1200),
            tick_period: Duration::from_secs(1),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub history_backend: HistoryBackend,
    pub interview: InterviewSettings,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let history_backend = match optional_env("HISTORY_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => HistoryBackend::Postgres {
                database_url: require_env("DATABASE_URL")?,
            },
            "redis" => HistoryBackend::Redis {
                redis_url: require_env("REDIS_URL")?,
            },
            "memory" => HistoryBackend::Memory,
            other => bail!("HISTORY_BACKEND must be postgres, redis or memory (got '{other}')"),
        };

        let defaults = InterviewSettings::default();
        let question_count = parse_env("QUESTION_COUNT", defaults.question_count)?;
        if question_count == 0 {
            bail!("QUESTION_COUNT must be at least 1");
        }
        let tick_millis: u64 = parse_env("TICK_MILLIS", defaults.tick_period.as_millis() as u64)?;
        if tick_millis == 0 {
            bail!("TICK_MILLIS must be at least 1");
        }

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            history_backend,
            interview: InterviewSettings {
                question_count,
                question_time: Duration::from_secs(parse_env(
                    "QUESTION_TIME_SECS",
                    defaults.question_time.as_secs(),
                )?),
                total_time: Duration::from_secs(parse_env(
                    "TOTAL_TIME_SECS",
                    defaults.total_time.as_secs(),
                )?),
                tick_period: Duration::from_millis(tick_millis),
            },
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
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
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number (got '{raw}')")),
        None => Ok(default),
    }
}
