use std::collections::BTreeMap;

use async_trait::async_trait;
use replicator_types::{ChangeEvent, EndpointKind, Position, Result, RowData, SourceTableSchema, TableSpec};

/// One page of rows read during the initial-load snapshot phase.
#[derive(Debug, Clone, Default)]
pub struct SnapshotChunk {
    pub rows: Vec<RowData>,
    pub is_last: bool,
}

/// A connector that can read a table's structure, an initial snapshot and a
/// tail of ongoing changes from one source database.
///
/// Implementations own their connection state; the executor calls `connect`
/// once before any other method and `disconnect` once when the task ends or
/// is stopped, mirroring the `connect`/`disconnect` pair every source
/// implementation in this workspace exposes.
#[async_trait]
pub trait SourceConnector: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    /// Schema name -> table names, with internal catalog schemas already
    /// filtered out.
    async fn list_schemas_and_tables(&mut self) -> Result<BTreeMap<String, Vec<String>>>;

    async fn get_table_schema(&mut self, schema: &str, table: &str) -> Result<SourceTableSchema>;

    /// The position a freshly started CDC tail should begin from, used when
    /// a task has no `last_position` yet (spec's "current point" case).
    async fn get_current_position(&mut self) -> Result<Position>;

    /// Fetch one page of a table's rows for the initial-load snapshot.
    /// `offset` is in rows, not bytes; connectors that can't express
    /// keyset pagination may fall back to `OFFSET`/`FETCH`.
    async fn snapshot_chunk(
        &mut self,
        table: &TableSpec,
        chunk_size: u32,
        offset: u64,
    ) -> Result<SnapshotChunk>;

    /// Fetch change events strictly after `last_position`, for the given
    /// tables only. Returns the events (ordered by position ascending) and
    /// the position reached, which may equal `last_position` if nothing new
    /// is available yet.
    async fn get_changes(
        &mut self,
        tables: &[TableSpec],
        last_position: &Position,
    ) -> Result<(Vec<ChangeEvent>, Position)>;
}

/// A connector that can create objects and load data into one target
/// database.
#[async_trait]
pub trait TargetConnector: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn create_schema_if_absent(&mut self, schema: &str) -> Result<()>;

    /// `table` is already in target type vocabulary, i.e. the output of a
    /// `SchemaConverter::convert` call, not the raw source schema.
    async fn create_table_if_absent(&mut self, table: &SourceTableSchema) -> Result<()>;

    async fn clear_table(&mut self, schema: &str, table: &str) -> Result<()>;

    async fn write_snapshot_chunk(
        &mut self,
        schema: &str,
        table: &str,
        chunk: &SnapshotChunk,
    ) -> Result<()>;

    /// Apply one batch of changes as a single unit: either the whole batch
    /// lands or none of it does. `merge_enabled` selects upsert (`MERGE`)
    /// semantics over separate insert/update/delete statements.
    async fn apply_changes(&mut self, events: &[ChangeEvent], merge_enabled: bool) -> Result<()>;
}

/// Translates a table definition between source and target type vocabularies.
/// Implementations are expected to be stateless and cheap to construct.
pub trait SchemaConverter: Send + Sync {
    fn convert(
        &self,
        source: &SourceTableSchema,
        source_kind: EndpointKind,
        target_kind: EndpointKind,
    ) -> Result<SourceTableSchema>;
}
