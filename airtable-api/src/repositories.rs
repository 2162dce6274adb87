//! Request builders grouped by resource, so call sites read as
//! `Request::records(base, table).find(&filter)`.

use crate::endpoints::meta::{GetBaseSchema, ListBases};
use crate::endpoints::records::{
    CreateRecords, DeleteRecords, GetRecord, ListRecords, NewRecord, RecordPatch, UpdateRecords,
};
use crate::endpoints::{BaseId, RecordId, SortField, TableId};
use crate::formula::Filter;

pub struct RecordRepository {
    base_id: BaseId,
    table: TableId,
}

impl RecordRepository {
    pub fn new(base_id: BaseId, table: TableId) -> Self {
        Self { base_id, table }
    }

    /// An unfiltered listing, for snapshot rebuilds.
    pub fn list(&self) -> ListRecords {
        ListRecords::new(self.base_id.clone(), self.table.clone())
    }

    /// A filtered listing with the launcher's default ordering, newest first.
    pub fn find(&self, filter: &Filter) -> ListRecords {
        self.list()
            .filter_by_formula(filter.render())
            .sort(vec![SortField::created_desc()])
    }

    pub fn get(&self, record_id: RecordId) -> GetRecord {
        GetRecord::new(self.base_id.clone(), self.table.clone(), record_id)
    }

    pub fn create(&self, records: Vec<NewRecord>) -> CreateRecords {
        CreateRecords::new(self.base_id.clone(), self.table.clone(), records)
    }

    pub fn update(&self, records: Vec<RecordPatch>) -> UpdateRecords {
        UpdateRecords::new(self.base_id.clone(), self.table.clone(), records)
    }

    pub fn delete(&self, record_ids: Vec<RecordId>) -> DeleteRecords {
        DeleteRecords::new(self.base_id.clone(), self.table.clone(), record_ids)
    }
}

#[derive(Default)]
pub struct MetaRepository;

impl MetaRepository {
    pub fn new() -> Self {
        Self
    }

    pub fn bases(&self) -> ListBases {
        ListBases
    }

    pub fn tables(&self, base_id: BaseId) -> GetBaseSchema {
        GetBaseSchema::new(base_id)
    }
}
