use std::time::Duration;

use anyhow::{ensure, Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a numeric one does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent: sessions live in process memory.
    pub database_url: Option<String>,
    /// Absent: run snapshots are not archived.
    pub s3: Option<S3Config>,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub app_name: String,
    pub default_user_id: String,
    pub stage_timeout: Duration,
    pub stage_max_attempts: u32,
    pub stage_retry_backoff: Duration,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = match optional_env("S3_BUCKET") {
            Some(bucket) => Some(S3Config {
                bucket,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            s3,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            app_name: optional_env("APP_NAME").unwrap_or_else(|| "RecruiterApp".to_string()),
            default_user_id: optional_env("DEFAULT_USER_ID")
                .unwrap_or_else(|| "hr_user_001".to_string()),
            stage_timeout: Duration::from_secs(non_zero(
                "STAGE_TIMEOUT_SECS",
                parse_env("STAGE_TIMEOUT_SECS", 60)?,
            )?),
            stage_max_attempts: non_zero("STAGE_MAX_ATTEMPTS", parse_env("STAGE_MAX_ATTEMPTS", 1)?)?,
            stage_retry_backoff: Duration::from_millis(parse_env("STAGE_RETRY_BACKOFF_MS", 500)?),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }

    /// Defaults with no database and no archive.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: None,
            s3: None,
            anthropic_api_key: "test-key".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            app_name: "RecruiterApp".to_string(),
            default_user_id: "hr_user_001".to_string(),
            stage_timeout: Duration::from_secs(60),
            stage_max_attempts: 1,
            stage_retry_backoff: Duration::from_millis(500),
            max_upload_bytes: 10 * 1024 * 1024,
        }
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
    parse_value(key, optional_env(key), default)
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

fn non_zero<T: Default + PartialEq>(key: &str, value: T) -> Result<T> {
    ensure!(value != T::default(), "{key} must be greater than zero");
    Ok(value)
}
