use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where vote records live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Content-addressed JSON objects under `bucket_dir`.
    Bucket,
    /// In-process vote contract.
    Chain,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" => Ok(SourceKind::Bucket),
            "chain" => Ok(SourceKind::Chain),
            other => Err(format!("expected bucket or chain, got {other:?}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub source: SourceKind,
    pub bucket_dir: PathBuf,
    pub state_path: PathBuf,
    pub fetch_timeout: Duration,
    pub request_timeout: Duration,
    pub daily_vote_limit: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("REELVOTE_PORT", "8080")?,
            source: try_load("REELVOTE_SOURCE", "bucket")?,
            bucket_dir: try_load("REELVOTE_BUCKET_DIR", "bucket")?,
            state_path: try_load("REELVOTE_STATE_PATH", "state/reelvote.json")?,
            fetch_timeout: Duration::from_millis(try_load("REELVOTE_FETCH_TIMEOUT_MS", "5000")?),
            request_timeout: Duration::from_millis(try_load("REELVOTE_REQUEST_TIMEOUT_MS", "10000")?),
            daily_vote_limit: try_load("REELVOTE_DAILY_VOTE_LIMIT", "20")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            source: SourceKind::Bucket,
            bucket_dir: PathBuf::from("bucket"),
            state_path: PathBuf::from("state/reelvote.json"),
            fetch_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            daily_vote_limit: 20,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    value.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }
    })
}
