//! Test support: an in-memory [`RemoteSource`] with call counters, failure
//! injection, and a gate for holding a rebuild in flight.

use crate::error::CacheError;
use crate::source::RemoteSource;
use airtable_api::endpoints::meta::TableSchema;
use airtable_api::endpoints::records::{NewRecord, Record, RecordPatch};
use airtable_api::endpoints::RecordId;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

pub struct MemorySource {
    tables: Mutex<BTreeMap<String, Vec<Record>>>,
    next_id: AtomicUsize,
    pub schema_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_remote: AtomicBool,
    held: AtomicBool,
    gate: Semaphore,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            next_id: AtomicUsize::new(1),
            schema_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            fail_remote: AtomicBool::new(false),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// Seeds a table. Each record is `(id, fields)` where fields is a JSON
    /// object.
    pub fn add_table(&self, name: &str, records: Vec<(&str, Value)>) {
        let records = records
            .into_iter()
            .map(|(id, fields)| Record {
                id: id.into(),
                created_time: Some(Utc::now()),
                fields: fields.as_object().cloned().unwrap_or_default(),
            })
            .collect();
        self.lock_tables().insert(name.to_string(), records);
    }

    pub fn records(&self, table: &str) -> Vec<Record> {
        self.lock_tables().get(table).cloned().unwrap_or_default()
    }

    /// Makes every remote call park until [`Self::release_remote`].
    pub fn hold_remote(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_remote(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<Record>>> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn checkpoint(&self) -> Result<(), CacheError> {
        if self.held.load(Ordering::SeqCst) {
            let permit = self.gate.acquire().await;
            drop(permit);
        }
        if self.fail_remote.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("simulated remote failure").into());
        }
        Ok(())
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteSource for MemorySource {
    async fn table_schemas(&self) -> Result<BTreeMap<String, TableSchema>, CacheError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await?;
        let tables = self.lock_tables();
        Ok(tables
            .keys()
            .enumerate()
            .map(|(i, name)| {
                let schema = TableSchema {
                    id: format!("tbl{}", i + 1).into(),
                    name: name.clone(),
                    primary_field_id: None,
                    fields: Vec::new(),
                };
                (name.clone(), schema)
            })
            .collect())
    }

    async fn all_records(&self, table: &str) -> Result<Vec<Record>, CacheError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await?;
        Ok(self.records(table))
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<NewRecord>,
    ) -> Result<Vec<Record>, CacheError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await?;
        let mut tables = self.lock_tables();
        let rows = tables.entry(table.to_string()).or_default();
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let row = Record {
                id: format!("rec{}", id).into(),
                created_time: Some(Utc::now()),
                fields: record.fields,
            };
            rows.push(row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn update_records(
        &self,
        table: &str,
        patches: Vec<RecordPatch>,
    ) -> Result<Vec<Record>, CacheError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await?;
        let mut tables = self.lock_tables();
        let rows = tables.entry(table.to_string()).or_default();
        let mut updated = Vec::with_capacity(patches.len());
        for patch in patches {
            let row = rows
                .iter_mut()
                .find(|r| r.id == patch.id)
                .ok_or_else(|| std::io::Error::other(format!("no such record {}", patch.id)))?;
            for (key, value) in patch.fields {
                row.fields.insert(key, value);
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete_records(
        &self,
        table: &str,
        record_ids: Vec<RecordId>,
    ) -> Result<Vec<RecordId>, CacheError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.checkpoint().await?;
        let mut tables = self.lock_tables();
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|r| !record_ids.contains(&r.id));
        }
        Ok(record_ids)
    }
}
