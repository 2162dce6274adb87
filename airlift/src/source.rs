use crate::error::CacheError;
use airtable_api::endpoints::meta::TableSchema;
use airtable_api::endpoints::records::{NewRecord, Record, RecordPatch};
use airtable_api::endpoints::{BaseId, RecordId};
use airtable_api::{Client, Request};
use std::collections::BTreeMap;
use std::future::Future;

/// Everything the cache engine needs from the remote base. Tests substitute
/// an in-memory implementation.
pub trait RemoteSource {
    fn table_schemas(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<String, TableSchema>, CacheError>> + Send;

    fn all_records(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Vec<Record>, CacheError>> + Send;

    fn create_records(
        &self,
        table: &str,
        records: Vec<NewRecord>,
    ) -> impl Future<Output = Result<Vec<Record>, CacheError>> + Send;

    fn update_records(
        &self,
        table: &str,
        patches: Vec<RecordPatch>,
    ) -> impl Future<Output = Result<Vec<Record>, CacheError>> + Send;

    fn delete_records(
        &self,
        table: &str,
        record_ids: Vec<RecordId>,
    ) -> impl Future<Output = Result<Vec<RecordId>, CacheError>> + Send;
}

/// The live source: one Airtable base behind a bearer token.
pub struct AirtableSource {
    client: Client,
    base_id: BaseId,
}

impl AirtableSource {
    pub fn new(access_token: &str, base_id: BaseId) -> Self {
        Self {
            client: Client::new(access_token),
            base_id,
        }
    }

    /// Walks the credential lifecycle first, then connects.
    pub async fn connect(base_id: BaseId) -> Result<Self, CacheError> {
        let credential = airlift_auth::get_token().await?;
        Ok(Self::new(&credential.access_token, base_id))
    }
}

impl RemoteSource for AirtableSource {
    async fn table_schemas(&self) -> Result<BTreeMap<String, TableSchema>, CacheError> {
        let response = self.client.send(Request::meta().tables(self.base_id.clone())).await?;
        Ok(response
            .tables
            .into_iter()
            .map(|table| (table.name.clone(), table))
            .collect())
    }

    async fn all_records(&self, table: &str) -> Result<Vec<Record>, CacheError> {
        let request = Request::records(self.base_id.clone(), table.into()).list();
        Ok(self.client.list_all(request).await?)
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<NewRecord>,
    ) -> Result<Vec<Record>, CacheError> {
        Ok(self
            .client
            .create_all(self.base_id.clone(), table.into(), records)
            .await?)
    }

    async fn update_records(
        &self,
        table: &str,
        patches: Vec<RecordPatch>,
    ) -> Result<Vec<Record>, CacheError> {
        Ok(self
            .client
            .update_all(self.base_id.clone(), table.into(), patches)
            .await?)
    }

    async fn delete_records(
        &self,
        table: &str,
        record_ids: Vec<RecordId>,
    ) -> Result<Vec<RecordId>, CacheError> {
        let deleted = self
            .client
            .delete_all(self.base_id.clone(), table.into(), record_ids)
            .await?;
        Ok(deleted.into_iter().map(|d| d.id).collect())
    }
}
