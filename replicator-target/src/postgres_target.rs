use std::error::Error as StdError;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use replicator_connector::{SnapshotChunk, TargetConnector};
use replicator_types::{ChangeEvent, Operation, ReplicatorError, Result, SourceTableSchema};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};

use crate::dialect::{PostgresDialect, SqlDialect};

pub struct PostgresTargetConnector {
    host: String,
    port: u16,
    database: String,
    username: String,
    password: String,
    client: Option<Client>,
    dialect: PostgresDialect,
}

impl PostgresTargetConnector {
    pub fn new(host: String, port: u16, database: String, username: String, password: String) -> Self {
        Self {
            host,
            port,
            database,
            username,
            password,
            client: None,
            dialect: PostgresDialect,
        }
    }

    fn client_mut(&mut self) -> Result<&mut Client> {
        self.client
            .as_mut()
            .ok_or_else(|| ReplicatorError::ConnectError("postgres target is not connected".into()))
    }
}

#[async_trait]
impl TargetConnector for PostgresTargetConnector {
    async fn connect(&mut self) -> Result<()> {
        let conn_str = format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.username, self.password
        );
        let (client, connection) = tokio_postgres::connect(&conn_str, NoTls)
            .await
            .map_err(|e| ReplicatorError::ConnectError(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres target connection driver exited");
            }
        });
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }

    async fn create_schema_if_absent(&mut self, schema: &str) -> Result<()> {
        let client = self.client_mut()?;
        let sql = self
            .dialect
            .create_schema_sql(schema)
            .expect("postgres dialect always supports CREATE SCHEMA");
        client
            .execute(sql.as_str(), &[])
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        Ok(())
    }

    async fn create_table_if_absent(&mut self, table: &SourceTableSchema) -> Result<()> {
        let exists: bool = {
            let client = self.client_mut()?;
            let row = client
                .query_opt(
                    "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
                    &[&table.schema, &table.table],
                )
                .await
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
            row.is_some()
        };
        if exists {
            return Ok(());
        }
        let sql = self.dialect.create_table_sql(table);
        self.client_mut()?
            .execute(sql.as_str(), &[])
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        Ok(())
    }

    async fn clear_table(&mut self, schema: &str, table: &str) -> Result<()> {
        let sql = self.dialect.delete_clear_sql(schema, table);
        match self.client_mut()?.execute(sql.as_str(), &[]).await {
            Ok(_) => Ok(()),
            Err(e) if e.code().map(|c| c.code() == "42P01").unwrap_or(false) => {
                tracing::warn!(schema, table, "clear_table: target table missing, treating as no-op");
                Ok(())
            }
            Err(e) => Err(ReplicatorError::TargetApplyError(e.to_string())),
        }
    }

    async fn write_snapshot_chunk(&mut self, schema: &str, table: &str, chunk: &SnapshotChunk) -> Result<()> {
        if chunk.rows.is_empty() {
            return Ok(());
        }
        let columns: Vec<String> = chunk.rows[0].keys().cloned().collect();
        let sql = self.dialect.insert_sql(schema, table, &columns);
        let client = self.client_mut()?;
        let txn = client
            .transaction()
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        for row in &chunk.rows {
            let values: Vec<JsonParam> = columns.iter().map(|c| JsonParam(row.get(c).cloned())).collect();
            let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            txn.execute(sql.as_str(), &params)
                .await
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        }
        txn.commit().await.map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        Ok(())
    }

    async fn apply_changes(&mut self, events: &[ChangeEvent], merge_enabled: bool) -> Result<()> {
        let client = self.client_mut()?;
        let txn = client
            .transaction()
            .await
            .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;

        for event in events {
            if !event.has_required_fields() {
                tracing::warn!(schema = %event.schema, table = %event.table, operation = ?event.operation, "skipping change with missing required fields");
                continue;
            }
            let known: Option<i32> = txn
                .query_opt(
                    "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
                    &[&event.schema, &event.table],
                )
                .await
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?
                .map(|_| 1);
            if known.is_none() {
                tracing::warn!(schema = %event.schema, table = %event.table, "apply_changes: unknown target table, skipping event");
                continue;
            }

            let dialect = &self.dialect;
            let pk_cols: Vec<String> = event.primary_keys.keys().cloned().collect();

            let result = match event.operation {
                Operation::Insert if merge_enabled => {
                    let after = event.after_data.as_ref().unwrap();
                    let mut all_cols: Vec<String> = pk_cols.clone();
                    all_cols.extend(after.keys().filter(|c| !pk_cols.contains(c)).cloned());
                    let sql = dialect.upsert_sql(&event.schema, &event.table, &all_cols, &pk_cols);
                    let values: Vec<JsonParam> = all_cols
                        .iter()
                        .map(|c| JsonParam(event.primary_keys.get(c).or_else(|| after.get(c)).cloned()))
                        .collect();
                    let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                    txn.execute(sql.as_str(), &params).await
                }
                Operation::Insert => {
                    let after = event.after_data.as_ref().unwrap();
                    let cols: Vec<String> = after.keys().cloned().collect();
                    let sql = dialect.insert_sql(&event.schema, &event.table, &cols);
                    let values: Vec<JsonParam> = cols.iter().map(|c| JsonParam(after.get(c).cloned())).collect();
                    let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                    txn.execute(sql.as_str(), &params).await
                }
                Operation::Update if merge_enabled => {
                    let after = event.after_data.as_ref().unwrap();
                    let mut all_cols: Vec<String> = pk_cols.clone();
                    all_cols.extend(after.keys().filter(|c| !pk_cols.contains(c)).cloned());
                    let sql = dialect.upsert_sql(&event.schema, &event.table, &all_cols, &pk_cols);
                    let values: Vec<JsonParam> = all_cols
                        .iter()
                        .map(|c| JsonParam(event.primary_keys.get(c).or_else(|| after.get(c)).cloned()))
                        .collect();
                    let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                    txn.execute(sql.as_str(), &params).await
                }
                Operation::Update => {
                    let after = event.after_data.as_ref().unwrap();
                    let set_cols: Vec<String> = after.keys().filter(|c| !pk_cols.contains(c)).cloned().collect();
                    if set_cols.is_empty() {
                        tracing::warn!(schema = %event.schema, table = %event.table, "update with no non-key columns, skipping");
                        continue;
                    }
                    let sql = dialect.update_by_pk_sql(&event.schema, &event.table, &set_cols, &pk_cols);
                    let mut values: Vec<JsonParam> = set_cols.iter().map(|c| JsonParam(after.get(c).cloned())).collect();
                    values.extend(pk_cols.iter().map(|c| JsonParam(event.primary_keys.get(c).cloned())));
                    let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                    txn.execute(sql.as_str(), &params).await
                }
                Operation::Delete => {
                    let sql = dialect.delete_by_pk_sql(&event.schema, &event.table, &pk_cols);
                    let values: Vec<JsonParam> = pk_cols.iter().map(|c| JsonParam(event.primary_keys.get(c).cloned())).collect();
                    let params: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
                    txn.execute(sql.as_str(), &params).await
                }
            };

            if let Err(e) = result {
                return Err(ReplicatorError::TargetApplyError(e.to_string()));
            }
        }

        txn.commit().await.map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        Ok(())
    }
}

type BoxError = Box<dyn StdError + Sync + Send>;

/// Binds a decoded `ChangeEvent`/snapshot column value against whatever
/// Postgres parameter type the server reports for its placeholder. Unlike
/// binding everything as `Option<String>`, this lets an integer, numeric,
/// boolean or timestamp column receive a value in its own wire format
/// instead of a text value `ToSql` on `String` would reject outright.
#[derive(Debug, Clone)]
struct JsonParam(Option<Value>);

impl ToSql for JsonParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        let value = match &self.0 {
            None | Some(Value::Null) => return Ok(IsNull::Yes),
            Some(v) => v,
        };
        match *ty {
            Type::BOOL => json_bool(value)?.to_sql(ty, out),
            Type::INT2 => (json_i64(value)? as i16).to_sql(ty, out),
            Type::INT4 => (json_i64(value)? as i32).to_sql(ty, out),
            Type::INT8 => json_i64(value)?.to_sql(ty, out),
            Type::FLOAT4 => (json_f64(value)? as f32).to_sql(ty, out),
            Type::FLOAT8 => json_f64(value)?.to_sql(ty, out),
            Type::NUMERIC => json_decimal(value)?.to_sql(ty, out),
            Type::DATE => json_date(value)?.to_sql(ty, out),
            Type::TIMESTAMP => json_timestamp(value)?.to_sql(ty, out),
            Type::TIMESTAMPTZ => json_timestamptz(value)?.to_sql(ty, out),
            Type::UUID => json_uuid(value)?.to_sql(ty, out),
            Type::JSON | Type::JSONB => value.to_sql(ty, out),
            _ => value_to_text(value).to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn json_text_ref(v: &Value) -> std::result::Result<&str, BoxError> {
    match v {
        Value::String(s) => Ok(s.as_str()),
        other => Err(format!("expected a string value, got {other}").into()),
    }
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_bool(v: &Value) -> std::result::Result<bool, BoxError> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        Value::String(s) => match s.as_str() {
            "t" | "true" | "1" => Ok(true),
            "f" | "false" | "0" => Ok(false),
            other => Err(format!("cannot bind {other:?} as boolean").into()),
        },
        other => Err(format!("cannot bind {other} as boolean").into()),
    }
}

fn json_i64(v: &Value) -> std::result::Result<i64, BoxError> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| format!("cannot bind {n} as integer").into()),
        Value::String(s) => s.trim().parse::<i64>().map_err(|e| format!("cannot bind {s:?} as integer: {e}").into()),
        other => Err(format!("cannot bind {other} as integer").into()),
    }
}

fn json_f64(v: &Value) -> std::result::Result<f64, BoxError> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("cannot bind {n} as float").into()),
        Value::String(s) => s.trim().parse::<f64>().map_err(|e| format!("cannot bind {s:?} as float: {e}").into()),
        other => Err(format!("cannot bind {other} as float").into()),
    }
}

fn json_decimal(v: &Value) -> std::result::Result<Decimal, BoxError> {
    let text = match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => return Err(format!("cannot bind {other} as numeric").into()),
    };
    Decimal::from_str(&text).map_err(|e| format!("cannot bind {text:?} as numeric: {e}").into())
}

fn json_date(v: &Value) -> std::result::Result<NaiveDate, BoxError> {
    let s = json_text_ref(v)?;
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .map_err(|e| format!("cannot bind {s:?} as date: {e}").into())
}

fn json_timestamp(v: &Value) -> std::result::Result<NaiveDateTime, BoxError> {
    let s = json_text_ref(v)?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| format!("cannot bind {s:?} as timestamp: {e}").into())
}

fn json_timestamptz(v: &Value) -> std::result::Result<DateTime<Utc>, BoxError> {
    let s = json_text_ref(v)?;
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("cannot bind {s:?} as timestamptz: {e}").into())
}

fn json_uuid(v: &Value) -> std::result::Result<uuid::Uuid, BoxError> {
    let s = json_text_ref(v)?;
    uuid::Uuid::parse_str(s).map_err(|e| format!("cannot bind {s:?} as uuid: {e}").into())
}
