use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use hearth_db::DEFAULT_READER_POOL_SIZE;

/// Runtime settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub db_readers: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("HEARTH_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_var(&lookup, "HEARTH_PORT", 3000)?;
        let db_readers = parse_var(&lookup, "HEARTH_DB_READERS", DEFAULT_READER_POOL_SIZE)?;
        let timeout_secs: u64 = parse_var(&lookup, "HEARTH_REQUEST_TIMEOUT_SECS", 30)?;

        let db_path = match (lookup("HEARTH_DB_PATH"), lookup("DATABASE_URL")) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(url)) => sqlite_path(&url)?,
            (None, None) => PathBuf::from("hearth.db"),
        };

        Ok(Self {
            host,
            port,
            db_path,
            db_readers,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Accepts `sqlite://path`, `sqlite:path` or a bare path.
fn sqlite_path(url: &str) -> Result<PathBuf> {
    if let Some(path) = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")) {
        return Ok(PathBuf::from(path));
    }
    if url.contains("://") {
        bail!("DATABASE_URL must point at a SQLite database, got {:?}", url);
    }
    Ok(PathBuf::from(url))
}
