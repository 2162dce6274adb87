use super::{BaseId, RecordId, SortField, TableId};
use crate::MAX_RECORDS_PER_REQUEST;
use crate::macros::setter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use tower_api_client::{Method, Request, RequestData};
use url::form_urlencoded;

// Common

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    #[serde(rename = "createdTime", skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Snapshot form: the field map with the record id folded in, so one flat
    /// object carries everything a local reader needs.
    pub fn flattened(&self) -> Map<String, Value> {
        let mut flat = self.fields.clone();
        flat.insert("id".to_string(), Value::String(self.id.to_string()));
        flat
    }
}

/// Payload for record creation: a bare field map, no id yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub fields: Map<String, Value>,
}

impl NewRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Payload for a partial update of one existing record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPatch {
    pub id: RecordId,
    pub fields: Map<String, Value>,
}

impl RecordPatch {
    pub fn new(id: impl Into<RecordId>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

// Requests

#[derive(Debug, Clone)]
pub struct ListRecords {
    base_id: BaseId,
    table: TableId,
    filter_by_formula: Option<String>,
    fields: Vec<String>,
    view: Option<String>,
    sort: Vec<SortField>,
    page_size: Option<u16>,
    offset: Option<String>,
}

impl ListRecords {
    pub fn new(base_id: BaseId, table: TableId) -> Self {
        Self {
            base_id,
            table,
            filter_by_formula: None,
            fields: Vec::new(),
            view: None,
            sort: Vec::new(),
            page_size: None,
            offset: None,
        }
    }

    setter!(opt filter_by_formula: String);
    setter!(fields: Vec<String>);
    setter!(opt view: String);
    setter!(sort: Vec<SortField>);
    setter!(opt page_size: u16);
    setter!(opt offset: String);
}

impl Request for ListRecords {
    type Data = ();
    type Response = RecordsResponse;

    // The provider's list parameters use bracketed keys (`fields[]`,
    // `sort[0][field]`), so the query string is assembled by hand.
    fn endpoint(&self) -> Cow<'_, str> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(formula) = &self.filter_by_formula {
            query.append_pair("filterByFormula", formula);
        }
        for field in &self.fields {
            query.append_pair("fields[]", field);
        }
        if let Some(view) = &self.view {
            query.append_pair("view", view);
        }
        for (i, sort) in self.sort.iter().enumerate() {
            query.append_pair(&format!("sort[{i}][field]"), &sort.field);
            query.append_pair(&format!("sort[{i}][direction]"), sort.direction.as_str());
        }
        if let Some(page_size) = self.page_size {
            query.append_pair("pageSize", &page_size.to_string());
        }
        if let Some(offset) = &self.offset {
            query.append_pair("offset", offset);
        }
        let query = query.finish();
        if query.is_empty() {
            format!("/{}/{}", self.base_id, self.table).into()
        } else {
            format!("/{}/{}?{}", self.base_id, self.table, query).into()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetRecord {
    base_id: BaseId,
    table: TableId,
    record_id: RecordId,
}

impl GetRecord {
    pub fn new(base_id: BaseId, table: TableId, record_id: RecordId) -> Self {
        Self {
            base_id,
            table,
            record_id,
        }
    }
}

impl Request for GetRecord {
    type Data = ();
    type Response = Record;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/{}/{}/{}", self.base_id, self.table, self.record_id).into()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRecords {
    #[serde(skip)]
    base_id: BaseId,
    #[serde(skip)]
    table: TableId,
    records: Vec<NewRecord>,
    typecast: bool,
}

impl CreateRecords {
    /// A single create request. Callers with more than
    /// [`MAX_RECORDS_PER_REQUEST`] records must go through [`Self::batched`].
    pub fn new(base_id: BaseId, table: TableId, records: Vec<NewRecord>) -> Self {
        debug_assert!(records.len() <= MAX_RECORDS_PER_REQUEST);
        Self {
            base_id,
            table,
            records,
            typecast: true,
        }
    }

    /// Splits `records` into provider-sized requests, preserving input order.
    pub fn batched(base_id: BaseId, table: TableId, records: Vec<NewRecord>) -> Vec<Self> {
        records
            .chunks(MAX_RECORDS_PER_REQUEST)
            .map(|chunk| Self::new(base_id.clone(), table.clone(), chunk.to_vec()))
            .collect()
    }

    pub fn records(&self) -> &[NewRecord] {
        &self.records
    }
}

impl Request for CreateRecords {
    type Data = Self;
    type Response = RecordsResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/{}/{}", self.base_id, self.table).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateRecords {
    #[serde(skip)]
    base_id: BaseId,
    #[serde(skip)]
    table: TableId,
    records: Vec<RecordPatch>,
    typecast: bool,
}

impl UpdateRecords {
    pub fn new(base_id: BaseId, table: TableId, records: Vec<RecordPatch>) -> Self {
        debug_assert!(records.len() <= MAX_RECORDS_PER_REQUEST);
        Self {
            base_id,
            table,
            records,
            typecast: true,
        }
    }

    pub fn batched(base_id: BaseId, table: TableId, records: Vec<RecordPatch>) -> Vec<Self> {
        records
            .chunks(MAX_RECORDS_PER_REQUEST)
            .map(|chunk| Self::new(base_id.clone(), table.clone(), chunk.to_vec()))
            .collect()
    }

    pub fn records(&self) -> &[RecordPatch] {
        &self.records
    }
}

impl Request for UpdateRecords {
    type Data = Self;
    type Response = RecordsResponse;
    const METHOD: Method = Method::PATCH;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/{}/{}", self.base_id, self.table).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteRecords {
    base_id: BaseId,
    table: TableId,
    record_ids: Vec<RecordId>,
}

impl DeleteRecords {
    pub fn new(base_id: BaseId, table: TableId, record_ids: Vec<RecordId>) -> Self {
        debug_assert!(record_ids.len() <= MAX_RECORDS_PER_REQUEST);
        Self {
            base_id,
            table,
            record_ids,
        }
    }

    pub fn batched(base_id: BaseId, table: TableId, record_ids: Vec<RecordId>) -> Vec<Self> {
        record_ids
            .chunks(MAX_RECORDS_PER_REQUEST)
            .map(|chunk| Self::new(base_id.clone(), table.clone(), chunk.to_vec()))
            .collect()
    }

    pub fn record_ids(&self) -> &[RecordId] {
        &self.record_ids
    }
}

impl Request for DeleteRecords {
    type Data = ();
    type Response = DeletedRecordsResponse;
    const METHOD: Method = Method::DELETE;

    // Ids travel as repeated `records[]` query parameters.
    fn endpoint(&self) -> Cow<'_, str> {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for id in &self.record_ids {
            query.append_pair("records[]", id.as_str());
        }
        format!("/{}/{}?{}", self.base_id, self.table, query.finish()).into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedRecordsResponse {
    pub records: Vec<DeletedRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: RecordId,
    pub deleted: bool,
}
