use crate::error::CacheError;
use crate::schema_cache::SchemaCache;
use crate::source::RemoteSource;
use filetime::FileTime;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// A rebuild holding the lock longer than this is presumed dead and its lock
/// is stolen.
const LOCK_LEASE: Duration = Duration::from_secs(10 * 60);

const TABLES_DIR: &str = "tables";
const LOCK_FILE: &str = "rebuild.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    Completed,
    /// Another rebuilder held the lock; its snapshot will serve.
    Skipped,
}

/// Advisory lock serializing rebuilds of one cache directory. Held for the
/// duration of a rebuild, released on drop.
struct RebuildLock {
    path: PathBuf,
}

impl RebuildLock {
    fn acquire(root: &Path) -> Result<Option<Self>, CacheError> {
        let path = root.join(LOCK_FILE);
        match Self::try_create(&path) {
            Ok(lock) => Ok(Some(lock)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if Self::is_stale(&path) {
                    tracing::warn!(path = %path.display(), "Stealing stale rebuild lock");
                    fs::remove_file(&path)?;
                    match Self::try_create(&path) {
                        Ok(lock) => Ok(Some(lock)),
                        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
                        Err(e) => Err(e.into()),
                    }
                } else {
                    Ok(None)
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn try_create(path: &Path) -> std::io::Result<RebuildLock> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        write!(file, "{}", chrono::Utc::now().timestamp())?;
        Ok(RebuildLock {
            path: path.to_path_buf(),
        })
    }

    fn is_stale(path: &Path) -> bool {
        let stamp = fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok());
        match stamp {
            Some(stamp) => chrono::Utc::now().timestamp() - stamp > LOCK_LEASE.as_secs() as i64,
            // Unreadable stamp: treat as stale rather than wedging forever.
            None => true,
        }
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Per-table record snapshots on disk. The `tables/` directory mtime is the
/// freshness clock, stamped only after a complete rebuild has been swapped
/// into place.
#[derive(Clone)]
pub struct RecordCache {
    root: PathBuf,
    schema: SchemaCache,
}

impl RecordCache {
    pub fn new(root: PathBuf) -> Result<Self, CacheError> {
        fs::create_dir_all(&root)?;
        let schema = SchemaCache::new(root.clone());
        Ok(Self { root, schema })
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    fn tables_dir(&self) -> PathBuf {
        self.root.join(TABLES_DIR)
    }

    pub fn is_initialized(&self) -> bool {
        self.tables_dir().exists() && self.schema.exists()
    }

    pub fn snapshot_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let dir = self.tables_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Age of the snapshot, from the tables directory mtime. `None` before
    /// the first rebuild.
    pub fn age(&self) -> Option<Duration> {
        fs::metadata(self.tables_dir())
            .and_then(|m| m.modified())
            .ok()
            .map(|mtime| mtime.elapsed().unwrap_or_default())
    }

    /// Parses every snapshot file into `{table name → flattened records}`.
    /// Unparseable files surface as [`CacheError::CacheCorrupt`].
    pub fn read_all(&self) -> Result<BTreeMap<String, Vec<Map<String, Value>>>, CacheError> {
        let mut tables = BTreeMap::new();
        for path in self.snapshot_files()? {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            // A snapshot file that cannot be read or parsed means the
            // snapshot as a whole is unusable; the caller recovers by
            // rebuilding.
            let data = fs::read_to_string(&path)
                .map_err(|e| CacheError::CacheCorrupt(format!("{}: {}", path.display(), e)))?;
            let records: Vec<Map<String, Value>> = serde_json::from_str(&data).map_err(|e| {
                CacheError::CacheCorrupt(format!("{}: {}", path.display(), e))
            })?;
            tables.insert(name, records);
        }
        Ok(tables)
    }

    /// Full rebuild: refetch schemas, page every table to exhaustion, write
    /// the snapshots into a staging directory, and atomically swap it into
    /// place. Concurrent rebuilders are excluded by the advisory lock; the
    /// loser skips.
    pub async fn rebuild_all<S: RemoteSource>(
        &self,
        source: &S,
    ) -> Result<RebuildOutcome, CacheError> {
        let Some(_lock) = RebuildLock::acquire(&self.root)? else {
            tracing::info!("Rebuild already in progress, skipping");
            return Ok(RebuildOutcome::Skipped);
        };

        let schemas = self.schema.get_tables(source, true).await?;

        let staging = self.root.join(format!("tables-{}", Uuid::new_v4()));
        fs::create_dir_all(&staging)?;

        match self.fill_staging(source, &staging, schemas.keys()).await {
            Ok(()) => {
                self.swap_into_place(&staging)?;
                filetime::set_file_mtime(self.tables_dir(), FileTime::now())?;
                tracing::info!(tables = schemas.len(), "Snapshot rebuilt");
                Ok(RebuildOutcome::Completed)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                Err(e)
            }
        }
    }

    async fn fill_staging<'a, S: RemoteSource>(
        &self,
        source: &S,
        staging: &Path,
        tables: impl Iterator<Item = &'a String>,
    ) -> Result<(), CacheError> {
        for table in tables {
            let records = source.all_records(table).await?;
            let flattened: Vec<Map<String, Value>> =
                records.iter().map(|r| r.flattened()).collect();
            let path = staging.join(format!("{}.json", table));
            fs::write(&path, serde_json::to_string_pretty(&flattened)?)?;
        }
        Ok(())
    }

    fn swap_into_place(&self, staging: &Path) -> Result<(), CacheError> {
        let tables = self.tables_dir();
        if tables.exists() {
            let retired = self.root.join(format!("tables-old-{}", Uuid::new_v4()));
            fs::rename(&tables, &retired)?;
            fs::rename(staging, &tables)?;
            let _ = fs::remove_dir_all(&retired);
        } else {
            fs::rename(staging, &tables)?;
        }
        Ok(())
    }
}
