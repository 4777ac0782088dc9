use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub media_dir: PathBuf,
    pub media_retention_hours: i64,
    pub db_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unset keys take their defaults;
    /// set keys that fail to parse are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("BLUENOTE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BLUENOTE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: text("BLUENOTE_HOST", "0.0.0.0"),
            port: parse_var(&lookup, "BLUENOTE_PORT", 8080)?,
            db_path: text("BLUENOTE_DB_PATH", "bluenote.db").into(),
            jwt_secret,
            jwt_expire_hours: parse_var(&lookup, "BLUENOTE_JWT_EXPIRE_HOURS", 168)?,
            media_dir: text("BLUENOTE_MEDIA_DIR", "./uploads").into(),
            media_retention_hours: parse_var(&lookup, "BLUENOTE_MEDIA_RETENTION_HOURS", 24)?,
            db_timeout: Duration::from_millis(parse_var(&lookup, "BLUENOTE_DB_TIMEOUT_MS", 5000)?),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key}='{raw}' is invalid")),
        None => Ok(default),
    }
}
