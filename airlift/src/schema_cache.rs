use crate::error::CacheError;
use crate::source::RemoteSource;
use airtable_api::endpoints::meta::TableSchema;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Table metadata changes rarely, so it gets a long fixed lifetime.
const SCHEMA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Caches the base's table metadata as one JSON file keyed by table name.
#[derive(Clone)]
pub struct SchemaCache {
    path: PathBuf,
}

impl SchemaCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            path: cache_dir.join("metadata.json"),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns the table map, fetching from the remote metadata endpoint when
    /// the file is missing, older than 24 hours, or `force` is set. A
    /// stale-but-present file beats a failing fetch, unless forced.
    pub async fn get_tables<S: RemoteSource>(
        &self,
        source: &S,
        force: bool,
    ) -> Result<BTreeMap<String, TableSchema>, CacheError> {
        if !force && self.is_fresh() {
            if let Some(tables) = self.read_file() {
                return Ok(tables);
            }
        }

        match source.table_schemas().await {
            Ok(tables) => {
                self.write_file(&tables)?;
                Ok(tables)
            }
            Err(e) if !force => match self.read_file() {
                Some(tables) => {
                    tracing::warn!(error = %e, "Schema fetch failed, using stale metadata");
                    Ok(tables)
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    fn is_fresh(&self) -> bool {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| mtime.elapsed().ok())
            .is_some_and(|age| age <= SCHEMA_TTL)
    }

    fn read_file(&self) -> Option<BTreeMap<String, TableSchema>> {
        let data = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&data) {
            Ok(tables) => Some(tables),
            Err(e) => {
                tracing::warn!(error = %e, "Metadata file unparseable, refetching");
                None
            }
        }
    }

    fn write_file(&self, tables: &BTreeMap<String, TableSchema>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(tables)?)?;
        Ok(())
    }
}
