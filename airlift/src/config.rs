use crate::error::CacheError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// The Airtable base the launcher reads from.
    pub base_id: String,

    /// Snapshot root. Defaults to the platform cache directory.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_cache_expires_in_minutes")]
    pub cache_expires_in_minutes: u64,
}

fn default_cache_expires_in_minutes() -> u64 {
    60
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("AIRLIFT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("AIRLIFT").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// How old the record snapshot may grow before a read triggers a
    /// background rebuild.
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.cache_expires_in_minutes * 60)
    }

    pub fn resolve_cache_dir(&self) -> Result<PathBuf, CacheError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|d| d.join("airlift").join("data"))
                .ok_or_else(|| {
                    CacheError::Configuration("No cache directory on this platform".to_string())
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_window_converts_minutes() {
        let settings = Settings {
            base_id: "app1".to_string(),
            cache_dir: None,
            cache_expires_in_minutes: 90,
        };
        assert_eq!(settings.freshness_window(), Duration::from_secs(5400));
    }
}
