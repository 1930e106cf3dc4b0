use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use oracle::sql_type::{OracleType, SqlValue, ToSql};
use oracle::Connection;
use replicator_types::{ChangeEvent, Operation, ReplicatorError, Result, RowData};

use crate::dialect::{OracleDialect, SqlDialect};

/// A bind value picked per the target column's catalog `DATA_TYPE`. Binding
/// everything as `String` makes Oracle implicitly convert text to the
/// column's real type using the session's NLS format, which rejects the
/// RFC3339 timestamps this workspace produces (ORA-01858/ORA-01830); binding
/// a `chrono` value instead uses the `oracle` crate's native date/timestamp
/// OCI conversion and skips NLS entirely.
enum Bind {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<FixedOffset>),
}

impl ToSql for Bind {
    fn oratype(&self, conn: &Connection) -> oracle::Result<OracleType> {
        match self {
            Bind::Null => None::<String>.oratype(conn),
            Bind::Text(v) => v.oratype(conn),
            Bind::Int(v) => v.oratype(conn),
            Bind::Float(v) => v.oratype(conn),
            Bind::Timestamp(v) => v.oratype(conn),
            Bind::TimestampTz(v) => v.oratype(conn),
        }
    }

    fn to_sql(&self, val: &mut SqlValue) -> oracle::Result<()> {
        match self {
            Bind::Null => None::<String>.to_sql(val),
            Bind::Text(v) => v.to_sql(val),
            Bind::Int(v) => v.to_sql(val),
            Bind::Float(v) => v.to_sql(val),
            Bind::Timestamp(v) => v.to_sql(val),
            Bind::TimestampTz(v) => v.to_sql(val),
        }
    }
}

fn bind_value(value: Option<&serde_json::Value>, data_type: Option<&String>) -> Bind {
    let value = match value {
        None | Some(serde_json::Value::Null) => return Bind::Null,
        Some(v) => v,
    };
    let upper = data_type.map(|t| t.to_uppercase()).unwrap_or_default();
    if upper.starts_with("DATE") || upper.contains("TIMESTAMP") {
        if let serde_json::Value::String(s) = value {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Bind::TimestampTz(dt);
            }
            if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Bind::Timestamp(ts);
            }
        }
    } else if upper.starts_with("NUMBER") || upper.contains("FLOAT") || upper.contains("INT") {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Bind::Int(i);
                }
                if let Some(f) = n.as_f64() {
                    return Bind::Float(f);
                }
            }
            serde_json::Value::String(s) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    return Bind::Int(i);
                }
                if let Ok(f) = s.trim().parse::<f64>() {
                    return Bind::Float(f);
                }
            }
            _ => {}
        }
    }
    Bind::Text(match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// `COLUMN_NAME -> DATA_TYPE` for one target table, read from `ALL_TAB_COLUMNS`
/// the same way `table_exists` reads `ALL_TABLES` (owner/table names
/// uppercased, matching Oracle's default unquoted-identifier folding).
pub fn column_types(conn: &Connection, schema: &str, table: &str) -> Result<HashMap<String, String>> {
    let rows = conn
        .query(
            "SELECT COLUMN_NAME, DATA_TYPE FROM ALL_TAB_COLUMNS WHERE OWNER = :1 AND TABLE_NAME = :2",
            &[&schema.to_uppercase(), &table.to_uppercase()],
        )
        .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
    let mut types = HashMap::new();
    for row in rows {
        let row = row.map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        let name: String = row.get(0).map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        let data_type: String = row.get(1).map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
        types.insert(name.to_uppercase(), data_type);
    }
    Ok(types)
}

/// Binds one snapshot row using the target table's column types
/// (`column_types`) so date/numeric columns bind natively instead of as
/// text.
pub fn execute_row(
    conn: &Connection,
    sql: &str,
    columns: &[String],
    row: &RowData,
    col_types: &HashMap<String, String>,
) -> Result<()> {
    let values: Vec<Bind> = columns
        .iter()
        .map(|c| bind_value(row.get(c), col_types.get(&c.to_uppercase())))
        .collect();
    let binds: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
    conn.execute(sql, &binds)
        .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
    Ok(())
}

fn table_exists(conn: &Connection, schema: &str, table: &str) -> Result<bool> {
    let row = conn
        .query_row_as::<Option<String>>(
            "SELECT TABLE_NAME FROM ALL_TABLES WHERE OWNER = :1 AND TABLE_NAME = :2",
            &[&schema.to_uppercase(), &table.to_uppercase()],
        )
        .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
    Ok(row.is_some())
}

/// Applies one batch inside exactly one Oracle transaction: every statement
/// up to the final `commit()` shares the session's implicit transaction, so
/// any unhandled driver error leaves the commit uncalled and the caller's
/// `spawn_blocking` failure propagates without partial effects (Oracle has
/// no autocommit unless the connection was opened with it enabled, which
/// this workspace never does).
pub fn apply_batch(conn: &Connection, events: &[ChangeEvent], merge_enabled: bool) -> Result<()> {
    let dialect = OracleDialect;
    let mut types_cache: HashMap<(String, String), HashMap<String, String>> = HashMap::new();

    for event in events {
        if !event.has_required_fields() {
            tracing::warn!(schema = %event.schema, table = %event.table, operation = ?event.operation, "skipping change with missing required fields");
            continue;
        }
        if !table_exists(conn, &event.schema, &event.table)? {
            tracing::warn!(schema = %event.schema, table = %event.table, "apply_changes: unknown target table, skipping event");
            continue;
        }
        let key = (event.schema.clone(), event.table.clone());
        if !types_cache.contains_key(&key) {
            let types = column_types(conn, &event.schema, &event.table)?;
            types_cache.insert(key.clone(), types);
        }
        let col_types = &types_cache[&key];

        let pk_cols: Vec<String> = event.primary_keys.keys().cloned().collect();
        let bind_of = |col: &str, v: Option<&serde_json::Value>| bind_value(v, col_types.get(&col.to_uppercase()));

        let outcome = match event.operation {
            Operation::Insert if merge_enabled => {
                let after = event.after_data.as_ref().unwrap();
                let mut all_cols: Vec<String> = pk_cols.clone();
                all_cols.extend(after.keys().filter(|c| !pk_cols.contains(c)).cloned());
                let sql = dialect.upsert_sql(&event.schema, &event.table, &all_cols, &pk_cols);
                let values: Vec<Bind> = all_cols
                    .iter()
                    .map(|c| bind_of(c, event.primary_keys.get(c).or_else(|| after.get(c))))
                    .collect();
                let binds: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                conn.execute(&sql, &binds)
            }
            Operation::Insert => {
                let after = event.after_data.as_ref().unwrap();
                let cols: Vec<String> = after.keys().cloned().collect();
                let sql = dialect.insert_sql(&event.schema, &event.table, &cols);
                let values: Vec<Bind> = cols.iter().map(|c| bind_of(c, after.get(c))).collect();
                let binds: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                conn.execute(&sql, &binds)
            }
            Operation::Update if merge_enabled => {
                let after = event.after_data.as_ref().unwrap();
                let mut all_cols: Vec<String> = pk_cols.clone();
                all_cols.extend(after.keys().filter(|c| !pk_cols.contains(c)).cloned());
                let sql = dialect.upsert_sql(&event.schema, &event.table, &all_cols, &pk_cols);
                let values: Vec<Bind> = all_cols
                    .iter()
                    .map(|c| bind_of(c, event.primary_keys.get(c).or_else(|| after.get(c))))
                    .collect();
                let binds: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                conn.execute(&sql, &binds)
            }
            Operation::Update => {
                let after = event.after_data.as_ref().unwrap();
                let set_cols: Vec<String> = after.keys().filter(|c| !pk_cols.contains(c)).cloned().collect();
                if set_cols.is_empty() {
                    tracing::warn!(schema = %event.schema, table = %event.table, "update with no non-key columns, skipping");
                    continue;
                }
                let sql = dialect.update_by_pk_sql(&event.schema, &event.table, &set_cols, &pk_cols);
                let mut values: Vec<Bind> = set_cols.iter().map(|c| bind_of(c, after.get(c))).collect();
                values.extend(pk_cols.iter().map(|c| bind_of(c, event.primary_keys.get(c))));
                let binds: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                conn.execute(&sql, &binds)
            }
            Operation::Delete => {
                let sql = dialect.delete_by_pk_sql(&event.schema, &event.table, &pk_cols);
                let values: Vec<Bind> = pk_cols.iter().map(|c| bind_of(c, event.primary_keys.get(c))).collect();
                let binds: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                conn.execute(&sql, &binds)
            }
        };

        outcome.map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
    }

    conn.commit().map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))
}
