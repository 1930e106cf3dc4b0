//! Synchronous Oracle driver calls. Every function here runs on a blocking
//! thread via `tokio::task::spawn_blocking`; nothing in this module is
//! async, mirroring how `dozer-sink-oracle` isolates the `oracle` crate's
//! blocking OCI calls from the async executor.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use oracle::sql_type::OracleType;
use oracle::{Connection, Row};
use replicator_types::{ChangeEvent, ColumnDef, Operation, Position, Result, RowData, SourceTableSchema, TableSpec};
use serde_json::Value;

use crate::column_values::{build_mine_value_sql, column_base_index, mine_value_to_json, FIX_NLS_FORMAT_SQL};
use crate::config::OracleConfig;
use crate::error::{map_connect_err, map_fatal, map_tail_err};

const SYSTEM_SCHEMAS: &[&str] = &[
    "SYS", "SYSTEM", "XDB", "AUDSYS", "OUTLN", "DBSNMP", "APPQOSSYS", "ORDSYS", "ORDDATA",
    "CTXSYS", "MDSYS", "WMSYS", "OLAPSYS", "GSMADMIN_INTERNAL", "DVSYS",
];

const MAX_VALID_SCN: u64 = 1u64 << 48;

pub fn connect(config: &OracleConfig) -> Result<Connection> {
    let conn = Connection::connect(&config.username, &config.password, config.connect_string())
        .map_err(map_connect_err)?;
    // MINE_VALUE renders DATE/TIMESTAMP columns as text in the session's NLS
    // format; pin it so `column_values::mine_value_to_json` always sees the
    // same layout regardless of the client environment.
    conn.execute(FIX_NLS_FORMAT_SQL, &[]).map_err(map_connect_err)?;
    Ok(conn)
}

pub fn disconnect(conn: Connection) -> Result<()> {
    // Ending any live mining session is handled by the caller before this is
    // reached; `close` here just releases the OCI handle.
    conn.close().map_err(map_fatal)
}

pub fn current_scn(conn: &Connection) -> Result<u64> {
    conn.query_row_as::<u64>("SELECT CURRENT_SCN FROM V$DATABASE", &[])
        .map_err(map_fatal)
}

pub fn list_schemas_and_tables(conn: &Connection) -> Result<BTreeMap<String, Vec<String>>> {
    let rows = conn
        .query(
            "SELECT OWNER, TABLE_NAME FROM ALL_TABLES ORDER BY OWNER, TABLE_NAME",
            &[],
        )
        .map_err(map_fatal)?;

    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let row = row.map_err(map_fatal)?;
        let owner: String = row.get(0).map_err(map_fatal)?;
        if SYSTEM_SCHEMAS.contains(&owner.as_str()) {
            continue;
        }
        let table: String = row.get(1).map_err(map_fatal)?;
        out.entry(owner).or_default().push(table);
    }
    Ok(out)
}

pub fn get_table_schema(conn: &Connection, schema: &str, table: &str) -> Result<SourceTableSchema> {
    if let Some(found) = get_table_schema_exact(conn, schema, table)? {
        return Ok(found);
    }
    // Oracle case-folds unquoted identifiers to upper case; retry that way
    // before giving up, per spec.md's case-handling contract.
    let upper_schema = schema.to_uppercase();
    let upper_table = table.to_uppercase();
    if (upper_schema.as_str(), upper_table.as_str()) != (schema, table) {
        if let Some(found) = get_table_schema_exact(conn, &upper_schema, &upper_table)? {
            return Ok(found);
        }
    }
    Err(replicator_types::ReplicatorError::NoSuchTable {
        schema: schema.to_string(),
        table: table.to_string(),
    })
}

fn get_table_schema_exact(
    conn: &Connection,
    schema: &str,
    table: &str,
) -> Result<Option<SourceTableSchema>> {
    let rows = conn
        .query(
            "SELECT COLUMN_NAME, DATA_TYPE, DATA_LENGTH, DATA_PRECISION, DATA_SCALE, NULLABLE \
             FROM ALL_TAB_COLUMNS WHERE OWNER = :1 AND TABLE_NAME = :2 ORDER BY COLUMN_ID",
            &[&schema, &table],
        )
        .map_err(map_fatal)?;

    let pk_columns = primary_key_columns(conn, schema, table)?;

    let mut columns = Vec::new();
    for row in rows {
        let row = row.map_err(map_fatal)?;
        let name: String = row.get(0).map_err(map_fatal)?;
        let base_type: String = row.get(1).map_err(map_fatal)?;
        let length: Option<i64> = row.get(2).map_err(map_fatal)?;
        let precision: Option<i64> = row.get(3).map_err(map_fatal)?;
        let scale: Option<i64> = row.get(4).map_err(map_fatal)?;
        let nullable: String = row.get(5).map_err(map_fatal)?;

        columns.push(ColumnDef {
            pk: pk_columns.contains(&name),
            name,
            base_type,
            length: length.map(|v| v.max(0) as u32),
            precision: precision.map(|v| v.max(0) as u32),
            scale: scale.map(|v| v as i32),
            nullable: nullable != "N",
        });
    }

    if columns.is_empty() {
        return Ok(None);
    }

    Ok(Some(SourceTableSchema {
        schema: schema.to_string(),
        table: table.to_string(),
        columns,
        primary_key: pk_columns,
    }))
}

fn primary_key_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<String>> {
    let rows = conn
        .query(
            "SELECT cc.COLUMN_NAME FROM ALL_CONSTRAINTS c \
             JOIN ALL_CONS_COLUMNS cc ON cc.OWNER = c.OWNER AND cc.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
             WHERE c.OWNER = :1 AND c.TABLE_NAME = :2 AND c.CONSTRAINT_TYPE = 'P' \
             ORDER BY cc.POSITION",
            &[&schema, &table],
        )
        .map_err(map_fatal)?;

    let mut names = Vec::new();
    for row in rows {
        let row = row.map_err(map_fatal)?;
        names.push(row.get(0).map_err(map_fatal)?);
    }
    Ok(names)
}

pub fn snapshot_chunk(
    conn: &Connection,
    table: &TableSpec,
    chunk_size: u32,
    offset: u64,
) -> Result<(Vec<RowData>, bool)> {
    let sql = format!(
        "SELECT * FROM {}.{} ORDER BY ROWID OFFSET :1 ROWS FETCH NEXT :2 ROWS ONLY",
        table.schema, table.table
    );
    let rows = conn
        .query(sql.as_str(), &[&(offset as i64), &(chunk_size as i64)])
        .map_err(map_fatal)?;

    let mut out = Vec::new();
    for row in rows {
        let row = row.map_err(map_fatal)?;
        out.push(row_to_map(&row)?);
    }
    let is_last = out.len() < chunk_size as usize;
    Ok((out, is_last))
}

fn row_to_map(row: &Row) -> Result<RowData> {
    let mut map = RowData::new();
    for (idx, col) in row.column_info().iter().enumerate() {
        let value = column_value(row, idx, col.oracle_type()).map_err(map_fatal)?;
        map.insert(col.name().to_string(), value);
    }
    Ok(map)
}

fn column_value(row: &Row, idx: usize, oracle_type: &OracleType) -> oracle::Result<Value> {
    let value = match oracle_type {
        OracleType::Number(_, _) | OracleType::BinaryFloat | OracleType::BinaryDouble => {
            match row.get::<_, Option<f64>>(idx)? {
                Some(n) => serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                None => Value::Null,
            }
        }
        OracleType::Date | OracleType::Timestamp(_) | OracleType::TimestampTZ(_) => {
            match row.get::<_, Option<NaiveDateTime>>(idx)? {
                Some(ts) => Value::String(ts.and_utc().to_rfc3339()),
                None => Value::Null,
            }
        }
        _ => match row.get::<_, Option<String>>(idx)? {
            Some(s) => Value::String(s),
            None => Value::Null,
        },
    };
    Ok(value)
}

/// The 7-step tail call described by the LogMiner algorithm: determine the
/// end window, validate the SCN range, register log files, start a session,
/// query captured events, translate rows and close the session.
pub fn tail(
    conn: &Connection,
    tables: &[TableSpec],
    start_scn: u64,
) -> Result<(Vec<ChangeEvent>, u64)> {
    let end_scn = determine_end_window(conn, start_scn)?;
    validate_scn_range(conn, start_scn, end_scn)?;

    let registered = register_log_files(conn, start_scn, end_scn)?;
    if registered == 0 {
        tracing::warn!(start_scn, end_scn, "no logs registered for mining window, backing off");
        return Ok((vec![], start_scn));
    }

    start_mining_session(conn)?;
    let result = query_and_translate(conn, tables, start_scn);
    // Always attempt to end the session, even if the query failed, so a
    // later `disconnect` does not inherit a half-open mining session.
    let _ = end_mining_session(conn);

    let (events, max_scn) = result?;
    let new_scn = max_scn.unwrap_or(start_scn).max(start_scn);
    Ok((events, new_scn))
}

fn determine_end_window(conn: &Connection, start_scn: u64) -> Result<u64> {
    let current = current_scn(conn)?;
    if start_scn > current {
        tracing::warn!(start_scn, current, "persisted position ahead of current_scn, resetting");
        Ok(current)
    } else {
        Ok(current)
    }
}

fn validate_scn_range(conn: &Connection, start_scn: u64, end_scn: u64) -> Result<()> {
    let oldest: Option<u64> = conn
        .query_row_as::<Option<u64>>(
            "SELECT MIN(FIRST_CHANGE#) FROM (\
               SELECT FIRST_CHANGE# FROM V$ARCHIVED_LOG WHERE NEXT_CHANGE# < :1 \
               UNION ALL \
               SELECT FIRST_CHANGE# FROM V$LOG WHERE NEXT_CHANGE# < :1)",
            &[&(MAX_VALID_SCN as i64)],
        )
        .map_err(map_fatal)?;

    if let Some(oldest) = oldest {
        if start_scn < oldest {
            return Err(replicator_types::ReplicatorError::SourceFatal(format!(
                "position purged: start_scn {start_scn} precedes oldest registered log at {oldest}"
            )));
        }
    }
    let _ = end_scn;
    Ok(())
}

fn register_log_files(conn: &Connection, start_scn: u64, end_scn: u64) -> Result<usize> {
    let mut registered = 0usize;
    for attempt in 0..3 {
        registered += register_archived_logs(conn, start_scn, end_scn)?;
        registered += register_online_logs(conn, start_scn, end_scn)?;
        if registered > 0 {
            return Ok(registered);
        }
        tracing::warn!(attempt, "no log files in range, forcing archive log switch");
        let _ = conn.execute("ALTER SYSTEM ARCHIVE LOG CURRENT", &[]);
        std::thread::sleep(std::time::Duration::from_millis(250));
    }
    Ok(registered)
}

fn register_archived_logs(conn: &Connection, start_scn: u64, end_scn: u64) -> Result<usize> {
    let rows = conn
        .query(
            "SELECT NAME FROM V$ARCHIVED_LOG \
             WHERE NEXT_CHANGE# > :1 AND FIRST_CHANGE# <= :2 AND NEXT_CHANGE# < :3 AND NAME IS NOT NULL",
            &[&(start_scn as i64), &(end_scn as i64), &(MAX_VALID_SCN as i64)],
        )
        .map_err(map_fatal)?;

    let mut count = 0;
    for row in rows {
        let row = row.map_err(map_fatal)?;
        let name: String = row.get(0).map_err(map_fatal)?;
        match conn.execute("BEGIN DBMS_LOGMNR.ADD_LOGFILE(:1, DBMS_LOGMNR.ADDFILE); END;", &[&name]) {
            Ok(_) => count += 1,
            Err(e) => tracing::warn!(log = %name, error = %e, "could not register archived log, skipping"),
        }
    }
    Ok(count)
}

fn register_online_logs(conn: &Connection, start_scn: u64, end_scn: u64) -> Result<usize> {
    let rows = conn
        .query(
            "SELECT MEMBER FROM V$LOGFILE lf JOIN V$LOG l ON l.GROUP# = lf.GROUP# \
             WHERE l.NEXT_CHANGE# > :1 AND l.FIRST_CHANGE# <= :2 AND l.NEXT_CHANGE# < :3",
            &[&(start_scn as i64), &(end_scn as i64), &(MAX_VALID_SCN as i64)],
        )
        .map_err(map_fatal)?;

    let mut count = 0;
    for row in rows {
        let row = row.map_err(map_fatal)?;
        let name: String = row.get(0).map_err(map_fatal)?;
        match conn.execute(
            "BEGIN DBMS_LOGMNR.ADD_LOGFILE(:1, DBMS_LOGMNR.ADDFILE); END;",
            &[&name],
        ) {
            Ok(_) => count += 1,
            Err(e) => tracing::warn!(log = %name, error = %e, "could not register online log, skipping"),
        }
    }
    Ok(count)
}

fn start_mining_session(conn: &Connection) -> Result<()> {
    conn.execute(
        "BEGIN DBMS_LOGMNR.START_LOGMNR(OPTIONS => \
            DBMS_LOGMNR.DICT_FROM_ONLINE_CATALOG + \
            DBMS_LOGMNR.COMMITTED_DATA_ONLY + \
            DBMS_LOGMNR.PRINT_PRETTY_SQL + \
            DBMS_LOGMNR.CONTINUOUS_MINE); END;",
        &[],
    )
    .map_err(map_tail_err)
}

fn end_mining_session(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN DBMS_LOGMNR.END_LOGMNR; END;", &[])
        .map_err(map_tail_err)
}

/// Reads events for one table at a time: the `DBMS_LOGMNR.MINE_VALUE`/
/// `COLUMN_PRESENT` projection is shaped by that table's column list, so it
/// cannot be folded into one cross-table query the way a raw `SELECT *`
/// could. Per spec.md §4.2.1 step 6, primary keys and before/after images
/// come from these supplemental-logged columns, never from parsing
/// `SQL_REDO` text.
fn query_and_translate(
    conn: &Connection,
    tables: &[TableSpec],
    start_scn: u64,
) -> Result<(Vec<ChangeEvent>, Option<u64>)> {
    let mut events = Vec::new();
    let mut max_scn = None;

    for table in tables {
        let schema = get_table_schema(conn, &table.schema, &table.table)?;
        let sql = build_mine_value_sql(&schema.columns);
        let rows = conn
            .query(sql.as_str(), &[&(start_scn as i64), &table.schema.as_str(), &table.table.as_str()])
            .map_err(map_tail_err)?;

        for row in rows {
            let row = row.map_err(map_tail_err)?;
            let scn: i64 = row.get(0).map_err(map_tail_err)?;
            let op_code: i64 = row.get(1).map_err(map_tail_err)?;
            let timestamp: NaiveDateTime = row.get(2).map_err(map_tail_err)?;

            let operation = match op_code {
                1 => Operation::Insert,
                2 => Operation::Delete,
                3 => Operation::Update,
                _ => continue,
            };

            let mut after = RowData::new();
            let mut before = RowData::new();
            for (i, col) in schema.columns.iter().enumerate() {
                let base = column_base_index(i);
                let redo_present: Option<i64> = row.get(base).map_err(map_tail_err)?;
                if redo_present == Some(1) {
                    let redo: Option<String> = row.get(base + 1).map_err(map_tail_err)?;
                    after.insert(
                        col.name.clone(),
                        redo.map(|s| mine_value_to_json(&col.base_type, &s)).unwrap_or(Value::Null),
                    );
                }
                let undo_present: Option<i64> = row.get(base + 2).map_err(map_tail_err)?;
                if undo_present == Some(1) {
                    let undo: Option<String> = row.get(base + 3).map_err(map_tail_err)?;
                    before.insert(
                        col.name.clone(),
                        undo.map(|s| mine_value_to_json(&col.base_type, &s)).unwrap_or(Value::Null),
                    );
                }
            }

            let after_data = match operation {
                Operation::Delete => None,
                _ if after.is_empty() => None,
                _ => Some(after),
            };
            let before_data = match operation {
                Operation::Insert => None,
                _ if before.is_empty() => None,
                _ => Some(before),
            };

            let pk_source = match operation {
                Operation::Delete => before_data.as_ref(),
                _ => after_data.as_ref(),
            };
            let mut primary_keys = RowData::new();
            if let Some(source) = pk_source {
                for name in &schema.primary_key {
                    if let Some(v) = source.get(name) {
                        primary_keys.insert(name.clone(), v.clone());
                    }
                }
            }
            if primary_keys.is_empty() {
                tracing::warn!(
                    schema = %table.schema, table = %table.table, scn,
                    "no primary key columns present in supplemental log data, skipping event"
                );
                continue;
            }

            events.push(ChangeEvent {
                operation,
                schema: table.schema.clone(),
                table: table.table.clone(),
                position: Position::from_scn(scn as u64),
                timestamp: timestamp.and_utc(),
                primary_keys,
                before_data,
                after_data,
            });
            max_scn = Some(scn.max(max_scn.unwrap_or(0)) as u64);
        }
    }

    events.sort_by(|a, b| a.position.scn().cmp(&b.position.scn()));
    Ok((events, max_scn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_schemas_cover_spec_examples() {
        assert!(SYSTEM_SCHEMAS.contains(&"SYS"));
        assert!(SYSTEM_SCHEMAS.contains(&"SYSTEM"));
        assert!(SYSTEM_SCHEMAS.contains(&"XDB"));
        assert!(SYSTEM_SCHEMAS.contains(&"AUDSYS"));
    }
}
