use crate::error::CacheError;
use crate::scheduler::RefreshScheduler;
use crate::snapshot::{RebuildOutcome, RecordCache};
use crate::source::RemoteSource;
use airtable_api::endpoints::records::{NewRecord, Record, RecordPatch};
use airtable_api::endpoints::RecordId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What a read returns: every table's flattened records, straight off disk.
pub type Snapshot = BTreeMap<String, Vec<Map<String, Value>>>;

/// The launcher-facing facade. Reads are bounded local-disk operations that
/// never wait on the network; staleness only schedules a background rebuild.
/// Mutations go to the remote base and then rebuild synchronously, so the
/// next read sees them.
pub struct Store<S> {
    source: Arc<S>,
    cache: RecordCache,
    scheduler: RefreshScheduler,
    freshness_window: Duration,
}

impl<S> Store<S>
where
    S: RemoteSource + Send + Sync + 'static,
{
    pub fn new(source: Arc<S>, cache: RecordCache, freshness_window: Duration) -> Self {
        Self {
            source,
            cache,
            scheduler: RefreshScheduler::new(),
            freshness_window,
        }
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn source(&self) -> &S {
        self.source.as_ref()
    }

    /// Ticks after every finished background rebuild.
    pub fn refresh_completions(&self) -> watch::Receiver<u64> {
        self.scheduler.subscribe()
    }

    pub async fn read(&self, force: bool) -> Result<Snapshot, CacheError> {
        // Cold start: nothing on disk yet, so this one read pays for a full
        // synchronous rebuild. If a concurrent rebuilder holds the lock the
        // rebuild is skipped, and with nothing on disk there is no snapshot
        // to fall back on; reporting an empty base here would be a lie.
        if !self.cache.is_initialized() {
            self.cache.rebuild_all(self.source.as_ref()).await?;
            if !self.cache.is_initialized() {
                return Err(CacheError::RebuildInProgress);
            }
        }

        // A rebuild of a base with no tables leaves zero snapshot files.
        // One more attempt covers the case where tables appeared since.
        if self.cache.snapshot_files()?.is_empty() {
            self.cache.rebuild_all(self.source.as_ref()).await?;
        }

        let is_stale = force
            || self
                .cache
                .age()
                .is_none_or(|age| age > self.freshness_window);
        if is_stale {
            self.scheduler
                .trigger(self.cache.clone(), self.source.clone());
        }

        match self.cache.read_all() {
            Ok(snapshot) => Ok(snapshot),
            Err(CacheError::CacheCorrupt(detail)) => {
                tracing::warn!(%detail, "Snapshot corrupt, forcing a rebuild");
                self.cache.rebuild_all(self.source.as_ref()).await?;
                self.cache.read_all()
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create(
        &self,
        table: &str,
        records: Vec<NewRecord>,
    ) -> Result<Vec<Record>, CacheError> {
        let created = self.source.create_records(table, records).await?;
        self.rebuild_after_write().await?;
        Ok(created)
    }

    pub async fn update(
        &self,
        table: &str,
        patches: Vec<RecordPatch>,
    ) -> Result<Vec<Record>, CacheError> {
        let updated = self.source.update_records(table, patches).await?;
        self.rebuild_after_write().await?;
        Ok(updated)
    }

    pub async fn delete(
        &self,
        table: &str,
        record_ids: Vec<RecordId>,
    ) -> Result<Vec<RecordId>, CacheError> {
        let deleted = self.source.delete_records(table, record_ids).await?;
        self.rebuild_after_write().await?;
        Ok(deleted)
    }

    async fn rebuild_after_write(&self) -> Result<(), CacheError> {
        match self.cache.rebuild_all(self.source.as_ref()).await? {
            RebuildOutcome::Completed => Ok(()),
            RebuildOutcome::Skipped => {
                // A concurrent rebuilder holds the lock; its snapshot may
                // predate this write, in which case staleness catches up.
                tracing::warn!("Post-write rebuild skipped, snapshot may lag the write");
                Ok(())
            }
        }
    }
}
