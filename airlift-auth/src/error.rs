use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Credential storage error: {0}")]
    CredentialStorage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token endpoint error: {0}")]
    TokenEndpoint(String),

    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Authorization denied: {0}")]
    Denied(String),

    #[error("Timed out waiting for browser authorization")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<config::ConfigError> for AuthError {
    fn from(err: config::ConfigError) -> Self {
        AuthError::Configuration(err.to_string())
    }
}
