use airlift_auth::AuthError;
use airtable_api::AirtableApiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Remote request failed: {0}")]
    RemoteRequestFailed(#[from] AirtableApiError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Snapshot files exist but cannot be parsed. Recovered by a forced
    /// rebuild; surfaces only when the rebuild itself cannot produce a
    /// readable snapshot.
    #[error("Cache corrupt: {0}")]
    CacheCorrupt(String),

    /// Cold start raced a concurrent rebuilder: the lock is held and there
    /// is no snapshot to serve yet.
    #[error("No snapshot yet, a rebuild is already in progress")]
    RebuildInProgress,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<config::ConfigError> for CacheError {
    fn from(err: config::ConfigError) -> Self {
        CacheError::Configuration(err.to_string())
    }
}
