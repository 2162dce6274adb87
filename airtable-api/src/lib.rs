pub mod endpoints;
mod error;
pub mod formula;
mod macros;
pub mod repositories;

pub use crate::error::AirtableApiError;
use endpoints::records::{
    CreateRecords, DeleteRecords, DeletedRecord, ListRecords, NewRecord, Record, RecordPatch,
    UpdateRecords,
};
use endpoints::{BaseId, RecordId, TableId};
use repositories::*;
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

const BASE_URL: &str = "https://api.airtable.com/v0";

/// The provider rejects any write request carrying more than this many records.
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

pub struct Client {
    inner: ApiClient,
}

impl Client {
    pub fn new(access_token: &str) -> Self {
        Self {
            inner: ApiClient::new(BASE_URL).bearer_auth(access_token),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, AirtableApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }

    /// Follows the `offset` cursor until the provider stops returning one.
    pub async fn list_all(&self, request: ListRecords) -> Result<Vec<Record>, AirtableApiError> {
        let mut request = request;
        let mut records = Vec::new();
        loop {
            let response = self.send(request.clone()).await?;
            records.extend(response.records);
            match response.offset {
                Some(offset) => request = request.offset(offset),
                None => break,
            }
        }
        Ok(records)
    }

    /// Creates records in sequential batches of at most
    /// [`MAX_RECORDS_PER_REQUEST`], concatenating results in request order.
    pub async fn create_all(
        &self,
        base_id: BaseId,
        table: TableId,
        records: Vec<NewRecord>,
    ) -> Result<Vec<Record>, AirtableApiError> {
        let mut created = Vec::with_capacity(records.len());
        for request in CreateRecords::batched(base_id, table, records) {
            created.extend(self.send(request).await?.records);
        }
        Ok(created)
    }

    pub async fn update_all(
        &self,
        base_id: BaseId,
        table: TableId,
        records: Vec<RecordPatch>,
    ) -> Result<Vec<Record>, AirtableApiError> {
        let mut updated = Vec::with_capacity(records.len());
        for request in UpdateRecords::batched(base_id, table, records) {
            updated.extend(self.send(request).await?.records);
        }
        Ok(updated)
    }

    pub async fn delete_all(
        &self,
        base_id: BaseId,
        table: TableId,
        record_ids: Vec<RecordId>,
    ) -> Result<Vec<DeletedRecord>, AirtableApiError> {
        let mut deleted = Vec::with_capacity(record_ids.len());
        for request in DeleteRecords::batched(base_id, table, record_ids) {
            deleted.extend(self.send(request).await?.records);
        }
        Ok(deleted)
    }
}

pub struct Request;

impl Request {
    pub fn records(base_id: BaseId, table: TableId) -> RecordRepository {
        RecordRepository::new(base_id, table)
    }

    pub fn meta() -> MetaRepository {
        MetaRepository::new()
    }
}
