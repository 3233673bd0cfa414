use anyhow::{Context, Result};

use crate::book::urls::{OAI_PMH_URL_BASE, RSS_URL_BASE};

/// Application configuration loaded from environment variables.
/// Startup aborts if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub tts_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Redis list the next-stage tasks are pushed onto.
    pub task_queue_key: String,
    /// Cached bibliographic records older than this many days are refetched.
    pub book_cache_max_age_days: i64,
    /// Write migrated documents back on read.
    pub auto_migrate: bool,
    pub feed_base_url: String,
    pub oai_pmh_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            tts_api_key: require_env("TTS_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            task_queue_key: optional_env("TASK_QUEUE_KEY", "shelfcast:tasks"),
            book_cache_max_age_days: optional_env("BOOK_CACHE_MAX_AGE_DAYS", "7")
                .parse::<i64>()
                .context("BOOK_CACHE_MAX_AGE_DAYS must be a whole number of days")?,
            auto_migrate: parse_flag(&optional_env("AUTO_MIGRATE", "true"))
                .context("AUTO_MIGRATE must be true or false")?,
            feed_base_url: optional_env("FEED_BASE_URL", RSS_URL_BASE),
            oai_pmh_base_url: optional_env("OAI_PMH_BASE_URL", OAI_PMH_URL_BASE),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("unrecognised flag value '{other}'"),
    }
}
