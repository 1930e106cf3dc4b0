use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use replicator_connector::{SnapshotChunk, SourceConnector};
use replicator_types::{
    ChangeEvent, ColumnDef, Operation, Position, ReplicatorError, Result, RowData, SourceTableSchema, TableSpec,
};
use tokio_postgres::{Client, NoTls};

use crate::config::PostgresConfig;
use crate::decode;

const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// Postgres source hook: schema discovery and snapshotting are fully
/// implemented against `information_schema`; the CDC tail rides a
/// `test_decoding` logical replication slot, which is enough to prove the
/// `SourceConnector` contract end to end without building out a full
/// logical-replication wire client.
pub struct PostgresSourceConnector {
    config: PostgresConfig,
    client: Option<Client>,
    /// Populated by `get_table_schema`; used to tell primary-key columns
    /// apart from ordinary columns in a `test_decoding` line, which does
    /// not itself distinguish them.
    pk_cache: BTreeMap<(String, String), Vec<String>>,
}

impl PostgresSourceConnector {
    pub fn new(config: PostgresConfig) -> Self {
        Self { config, client: None, pk_cache: BTreeMap::new() }
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ReplicatorError::ConnectError("postgres source is not connected".into()))
    }

    async fn ensure_slot(&self) -> Result<()> {
        let client = self.client()?;
        let slot = self.config.slot_name();
        let exists: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_replication_slots WHERE slot_name = $1)",
                &[&slot],
            )
            .await
            .map_err(|e| ReplicatorError::SourceFatal(e.to_string()))?
            .get(0);
        if !exists {
            client
                .execute(
                    "SELECT * FROM pg_create_logical_replication_slot($1, 'test_decoding')",
                    &[&slot],
                )
                .await
                .map_err(|e| ReplicatorError::SourceFatal(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl SourceConnector for PostgresSourceConnector {
    async fn connect(&mut self) -> Result<()> {
        let (client, connection) = tokio_postgres::connect(&self.config.connection_string(), NoTls)
            .await
            .map_err(|e| ReplicatorError::ConnectError(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres source connection task ended");
            }
        });
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }

    async fn list_schemas_and_tables(&mut self) -> Result<BTreeMap<String, Vec<String>>> {
        let client = self.client()?;
        let rows = client
            .query(
                "SELECT table_schema, table_name FROM information_schema.tables \
                 WHERE table_schema NOT IN ($1, $2, $3) ORDER BY table_schema, table_name",
                &[&SYSTEM_SCHEMAS[0], &SYSTEM_SCHEMAS[1], &SYSTEM_SCHEMAS[2]],
            )
            .await
            .map_err(|e| ReplicatorError::SourceFatal(e.to_string()))?;

        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let schema: String = row.get(0);
            let table: String = row.get(1);
            out.entry(schema).or_default().push(table);
        }
        Ok(out)
    }

    async fn get_table_schema(&mut self, schema: &str, table: &str) -> Result<SourceTableSchema> {
        let client = self.client()?;
        let rows = client
            .query(
                "SELECT column_name, data_type, character_maximum_length, numeric_precision, \
                        numeric_scale, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
                &[&schema, &table],
            )
            .await
            .map_err(|e| ReplicatorError::SourceFatal(e.to_string()))?;

        if rows.is_empty() {
            return Err(ReplicatorError::NoSuchTable {
                schema: schema.to_string(),
                table: table.to_string(),
            });
        }

        let pk_rows = client
            .query(
                "SELECT kcu.column_name FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                   ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
                 WHERE tc.table_schema = $1 AND tc.table_name = $2 AND tc.constraint_type = 'PRIMARY KEY' \
                 ORDER BY kcu.ordinal_position",
                &[&schema, &table],
            )
            .await
            .map_err(|e| ReplicatorError::SourceFatal(e.to_string()))?;
        let primary_key: Vec<String> = pk_rows.iter().map(|r| r.get(0)).collect();

        let columns = rows
            .iter()
            .map(|row| {
                let name: String = row.get(0);
                let base_type: String = row.get(1);
                let length: Option<i32> = row.get(2);
                let precision: Option<i32> = row.get(3);
                let scale: Option<i32> = row.get(4);
                let nullable: String = row.get(5);
                ColumnDef {
                    pk: primary_key.contains(&name),
                    name,
                    base_type,
                    length: length.map(|v| v.max(0) as u32),
                    precision: precision.map(|v| v.max(0) as u32),
                    scale,
                    nullable: nullable != "NO",
                }
            })
            .collect();

        self.pk_cache
            .insert((schema.to_string(), table.to_string()), primary_key.clone());

        Ok(SourceTableSchema {
            schema: schema.to_string(),
            table: table.to_string(),
            columns,
            primary_key,
        })
    }

    async fn get_current_position(&mut self) -> Result<Position> {
        let client = self.client()?;
        let lsn: String = client
            .query_one("SELECT pg_current_wal_lsn()::text", &[])
            .await
            .map_err(|e| ReplicatorError::SourceFatal(e.to_string()))?
            .get(0);
        Ok(Position(serde_json::json!({ "lsn": lsn })))
    }

    async fn snapshot_chunk(
        &mut self,
        table: &TableSpec,
        chunk_size: u32,
        offset: u64,
    ) -> Result<SnapshotChunk> {
        let client = self.client()?;
        let sql = format!(
            "SELECT * FROM \"{}\".\"{}\" ORDER BY ctid OFFSET $1 LIMIT $2",
            table.schema, table.table
        );
        let rows = client
            .query(sql.as_str(), &[&(offset as i64), &(chunk_size as i64)])
            .await
            .map_err(|e| ReplicatorError::SourceFatal(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut map = RowData::new();
            for (idx, col) in row.columns().iter().enumerate() {
                let value: Option<String> = row.try_get(idx).unwrap_or(None);
                map.insert(
                    col.name().to_string(),
                    value.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null),
                );
            }
            out.push(map);
        }
        let is_last = out.len() < chunk_size as usize;
        Ok(SnapshotChunk { rows: out, is_last })
    }

    async fn get_changes(
        &mut self,
        tables: &[TableSpec],
        last_position: &Position,
    ) -> Result<(Vec<ChangeEvent>, Position)> {
        self.ensure_slot().await?;
        let client = self.client()?;
        let slot = self.config.slot_name();

        let rows = client
            .query(
                "SELECT lsn::text, data FROM pg_logical_slot_get_changes($1, NULL, NULL)",
                &[&slot],
            )
            .await
            .map_err(|e| ReplicatorError::SourceTransient(e.to_string()))?;

        if rows.is_empty() {
            return Ok((vec![], last_position.clone()));
        }

        let wanted: Vec<(&str, &str)> = tables.iter().map(|t| (t.schema.as_str(), t.table.as_str())).collect();
        let mut events = Vec::new();
        let mut last_lsn = None;

        for row in &rows {
            let lsn: String = row.get(0);
            let data: String = row.get(1);
            last_lsn = Some(lsn.clone());

            let Some(decoded) = decode::parse_line(&data) else {
                continue;
            };
            if !wanted.is_empty() && !wanted.contains(&(decoded.schema.as_str(), decoded.table.as_str())) {
                continue;
            }

            let pk_columns = self
                .pk_cache
                .get(&(decoded.schema.clone(), decoded.table.clone()))
                .cloned()
                .unwrap_or_default();

            let (primary_keys, before_data, after_data) = match decoded.operation {
                Operation::Insert => (BTreeMap::new(), None, Some(decoded.columns)),
                Operation::Update => {
                    let keys: RowData = decoded
                        .columns
                        .iter()
                        .filter(|(name, _)| pk_columns.contains(name))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    (keys, None, Some(decoded.columns))
                }
                Operation::Delete => {
                    let keys: RowData = decoded
                        .columns
                        .iter()
                        .filter(|(name, _)| pk_columns.contains(name))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    (keys, Some(decoded.columns), None)
                }
            };

            events.push(ChangeEvent {
                operation: decoded.operation,
                schema: decoded.schema,
                table: decoded.table,
                position: Position(serde_json::json!({ "lsn": lsn })),
                timestamp: Utc::now(),
                primary_keys,
                before_data,
                after_data,
            });
        }

        let new_position = match last_lsn {
            Some(lsn) => Position(serde_json::json!({ "lsn": lsn })),
            None => last_position.clone(),
        };
        Ok((events, new_position))
    }
}
