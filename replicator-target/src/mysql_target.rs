use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, OptsBuilder, Params, TxOpts, Value};
use replicator_connector::{SnapshotChunk, TargetConnector};
use replicator_types::{ChangeEvent, Operation, ReplicatorError, Result, SourceTableSchema};

use crate::dialect::{MySqlDialect, SqlDialect};

pub struct MysqlTargetConnector {
    host: String,
    port: u16,
    database: String,
    username: String,
    password: String,
    conn: Option<Conn>,
    dialect: MySqlDialect,
}

impl MysqlTargetConnector {
    pub fn new(host: String, port: u16, database: String, username: String, password: String) -> Self {
        Self {
            host,
            port,
            database,
            username,
            password,
            conn: None,
            dialect: MySqlDialect,
        }
    }

    fn opts(&self) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .db_name(Some(self.database.clone()))
            .user(Some(self.username.clone()))
            .pass(Some(self.password.clone()))
            .into()
    }

    fn conn_mut(&mut self) -> Result<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| ReplicatorError::ConnectError("mysql target is not connected".into()))
    }
}

fn json_to_value(value: Option<&serde_json::Value>) -> Value {
    match value {
        None | Some(serde_json::Value::Null) => Value::NULL,
        Some(serde_json::Value::String(s)) => Value::from(s.clone()),
        Some(other) => Value::from(other.to_string()),
    }
}

#[async_trait]
impl TargetConnector for MysqlTargetConnector {
    async fn connect(&mut self) -> Result<()> {
        let conn = Conn::new(self.opts())
            .await
            .map_err(|e| ReplicatorError::ConnectError(e.to_string()))?;
        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            let _ = conn.disconnect().await;
        }
        Ok(())
    }

    async fn create_schema_if_absent(&mut self, schema: &str) -> Result<()> {
        let sql = self
            .dialect
            .create_schema_sql(schema)
            .expect("mysql dialect always supports CREATE DATABASE");
        self.conn_mut()?
            .query_drop(sql)
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))
    }

    async fn create_table_if_absent(&mut self, table: &SourceTableSchema) -> Result<()> {
        let exists: Option<u32> = self
            .conn_mut()?
            .exec_first(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = :schema AND table_name = :table",
                mysql_async::params! { "schema" => &table.schema, "table" => &table.table },
            )
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        if exists.is_some() {
            return Ok(());
        }
        let sql = self.dialect.create_table_sql(table);
        self.conn_mut()?
            .query_drop(sql)
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))
    }

    async fn clear_table(&mut self, schema: &str, table: &str) -> Result<()> {
        let exists: Option<u32> = self
            .conn_mut()?
            .exec_first(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = :schema AND table_name = :table",
                mysql_async::params! { "schema" => schema, "table" => table },
            )
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        if exists.is_none() {
            tracing::warn!(schema, table, "clear_table: target table missing, treating as no-op");
            return Ok(());
        }
        let sql = self.dialect.delete_clear_sql(schema, table);
        self.conn_mut()?
            .query_drop(sql)
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))
    }

    async fn write_snapshot_chunk(&mut self, schema: &str, table: &str, chunk: &SnapshotChunk) -> Result<()> {
        if chunk.rows.is_empty() {
            return Ok(());
        }
        let columns: Vec<String> = chunk.rows[0].keys().cloned().collect();
        let sql = self.dialect.insert_sql(schema, table, &columns);
        let conn = self.conn_mut()?;
        let mut txn = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        for row in &chunk.rows {
            let values: Vec<Value> = columns.iter().map(|c| json_to_value(row.get(c))).collect();
            txn.exec_drop(sql.as_str(), Params::Positional(values))
                .await
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        }
        txn.commit().await.map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        Ok(())
    }

    async fn apply_changes(&mut self, events: &[ChangeEvent], merge_enabled: bool) -> Result<()> {
        let conn = self.conn_mut()?;
        let mut txn = conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;

        for event in events {
            if !event.has_required_fields() {
                tracing::warn!(schema = %event.schema, table = %event.table, operation = ?event.operation, "skipping change with missing required fields");
                continue;
            }

            let exists: Option<u32> = txn
                .exec_first(
                    "SELECT 1 FROM information_schema.tables WHERE table_schema = :schema AND table_name = :table",
                    mysql_async::params! { "schema" => &event.schema, "table" => &event.table },
                )
                .await
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
            if exists.is_none() {
                tracing::warn!(schema = %event.schema, table = %event.table, "apply_changes: unknown target table, skipping event");
                continue;
            }

            let dialect = &self.dialect;
            let pk_cols: Vec<String> = event.primary_keys.keys().cloned().collect();

            let outcome = match event.operation {
                Operation::Insert if merge_enabled => {
                    let after = event.after_data.as_ref().unwrap();
                    let mut all_cols: Vec<String> = pk_cols.clone();
                    all_cols.extend(after.keys().filter(|c| !pk_cols.contains(c)).cloned());
                    let sql = dialect.upsert_sql(&event.schema, &event.table, &all_cols, &pk_cols);
                    let values: Vec<Value> = all_cols
                        .iter()
                        .map(|c| json_to_value(event.primary_keys.get(c).or_else(|| after.get(c))))
                        .collect();
                    txn.exec_drop(sql.as_str(), Params::Positional(values)).await
                }
                Operation::Insert => {
                    let after = event.after_data.as_ref().unwrap();
                    let cols: Vec<String> = after.keys().cloned().collect();
                    let sql = dialect.insert_sql(&event.schema, &event.table, &cols);
                    let values: Vec<Value> = cols.iter().map(|c| json_to_value(after.get(c))).collect();
                    txn.exec_drop(sql.as_str(), Params::Positional(values)).await
                }
                Operation::Update if merge_enabled => {
                    let after = event.after_data.as_ref().unwrap();
                    let mut all_cols: Vec<String> = pk_cols.clone();
                    all_cols.extend(after.keys().filter(|c| !pk_cols.contains(c)).cloned());
                    let sql = dialect.upsert_sql(&event.schema, &event.table, &all_cols, &pk_cols);
                    let values: Vec<Value> = all_cols
                        .iter()
                        .map(|c| json_to_value(event.primary_keys.get(c).or_else(|| after.get(c))))
                        .collect();
                    txn.exec_drop(sql.as_str(), Params::Positional(values)).await
                }
                Operation::Update => {
                    let after = event.after_data.as_ref().unwrap();
                    let set_cols: Vec<String> = after.keys().filter(|c| !pk_cols.contains(c)).cloned().collect();
                    if set_cols.is_empty() {
                        tracing::warn!(schema = %event.schema, table = %event.table, "update with no non-key columns, skipping");
                        continue;
                    }
                    let sql = dialect.update_by_pk_sql(&event.schema, &event.table, &set_cols, &pk_cols);
                    let mut values: Vec<Value> = set_cols.iter().map(|c| json_to_value(after.get(c))).collect();
                    values.extend(pk_cols.iter().map(|c| json_to_value(event.primary_keys.get(c))));
                    txn.exec_drop(sql.as_str(), Params::Positional(values)).await
                }
                Operation::Delete => {
                    let sql = dialect.delete_by_pk_sql(&event.schema, &event.table, &pk_cols);
                    let values: Vec<Value> = pk_cols.iter().map(|c| json_to_value(event.primary_keys.get(c))).collect();
                    txn.exec_drop(sql.as_str(), Params::Positional(values)).await
                }
            };

            outcome.map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        }

        txn.commit().await.map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        Ok(())
    }
}
