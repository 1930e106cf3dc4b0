use serde::{Deserialize, Serialize};

/// A single source column, in the source's own type vocabulary (e.g.
/// `VARCHAR2`, `NUMBER`). `base_type` is intentionally a string, not an
/// enum: the set of source base types is open-ended across source kinds,
/// and the schema converter (C2) is what gives it meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub base_type: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
    pub nullable: bool,
    pub pk: bool,
}

/// Describes a source table, as produced by `SourceConnector::get_table_schema`
/// and consumed by the schema converter and target connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTableSchema {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
}

impl SourceTableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}
