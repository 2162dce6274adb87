use super::{BaseId, TableId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::Request;

/// Lists the bases the token can reach. Useful for first-run setup when the
/// caller does not yet know its base id.
#[derive(Debug, Clone)]
pub struct ListBases;

impl Request for ListBases {
    type Data = ();
    type Response = BasesResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/meta/bases".into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasesResponse {
    pub bases: Vec<Base>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Base {
    pub id: BaseId,
    pub name: String,
    #[serde(rename = "permissionLevel")]
    pub permission_level: String,
}

/// Fetches the table schema of one base.
#[derive(Debug, Clone)]
pub struct GetBaseSchema {
    base_id: BaseId,
}

impl GetBaseSchema {
    pub fn new(base_id: BaseId) -> Self {
        Self { base_id }
    }
}

impl Request for GetBaseSchema {
    type Data = ();
    type Response = BaseSchemaResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/meta/bases/{}/tables", self.base_id).into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseSchemaResponse {
    pub tables: Vec<TableSchema>,
}

impl BaseSchemaResponse {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub id: TableId,
    pub name: String,
    #[serde(rename = "primaryFieldId", skip_serializing_if = "Option::is_none")]
    pub primary_field_id: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl TableSchema {
    /// The select choices of a field, in schema order. Empty when the field
    /// does not exist or carries no choices.
    pub fn choice_names(&self, field_name: &str) -> Vec<String> {
        self.fields
            .iter()
            .find(|f| f.name == field_name)
            .and_then(|f| f.options.as_ref())
            .and_then(|o| o.choices.as_ref())
            .map(|choices| choices.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub name: String,
}
