use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct OAuthSettings {
    pub client_id: String,

    /// Optional: only set for confidential integrations. Public clients rely
    /// on PKCE alone.
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_airtable_url")]
    pub airtable_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scope")]
    pub scope: String,

    /// Where credential.json lives. Defaults to the platform cache directory.
    #[serde(default)]
    pub credential_dir: Option<PathBuf>,
}

fn default_airtable_url() -> String {
    "https://www.airtable.com".to_string()
}

fn default_port() -> u16 {
    9093
}

fn default_redirect_uri() -> String {
    "http://localhost:9093/callback".to_string()
}

fn default_scope() -> String {
    "data.records:read data.records:write schema.bases:read".to_string()
}

impl OAuthSettings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("AIRLIFT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("AIRLIFT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth2/v1/authorize", self.airtable_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/v1/token", self.airtable_url)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("client_id is required".to_string());
        }
        if !self.redirect_uri.starts_with("http") {
            return Err("redirect_uri must be a valid HTTP(S) URL".to_string());
        }
        Ok(())
    }

    /// The path component the callback route serves, taken from the
    /// registered redirect URI.
    pub fn callback_path(&self) -> String {
        url::Url::parse(&self.redirect_uri)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/callback".to_string())
    }
}
