//! Builds the `DBMS_LOGMNR.MINE_VALUE`/`COLUMN_PRESENT` projection used to
//! read supplemental-logged column values out of `V$LOGMNR_CONTENTS`
//! (spec.md §4.2.1 step 6's "translate rows" step), and converts the text
//! `MINE_VALUE` returns back into a typed `serde_json::Value` using the
//! column's catalog type.

use chrono::NaiveDateTime;
use replicator_types::ColumnDef;
use serde_json::Value;

/// Fixed leading columns selected ahead of the per-column projection.
pub const FIXED_COLUMN_COUNT: usize = 3;
/// Number of projected expressions per table column (redo presence, redo
/// value, undo presence, undo value).
pub const EXPRESSIONS_PER_COLUMN: usize = 4;

/// `ALTER SESSION` statement run once per connection so `MINE_VALUE`'s text
/// output for DATE/TIMESTAMP columns is in a format `parse_mined_timestamp`
/// can always read back, regardless of the client's NLS environment.
pub const FIX_NLS_FORMAT_SQL: &str =
    "ALTER SESSION SET NLS_DATE_FORMAT = 'YYYY-MM-DD HH24:MI:SS' NLS_TIMESTAMP_FORMAT = 'YYYY-MM-DD HH24:MI:SS.FF6'";

/// `SELECT SCN, OPERATION_CODE, TIMESTAMP, <mine-value projection>` for one
/// table, scoped to `SEG_OWNER = :2 AND TABLE_NAME = :3` by the caller.
/// Aliases are index-based (`P0`/`R0`/`Q0`/`U0`, ...) rather than
/// column-name-based so a long column name can never overflow an Oracle
/// identifier limit.
pub fn build_mine_value_sql(columns: &[ColumnDef]) -> String {
    let mut projection = String::new();
    for (i, col) in columns.iter().enumerate() {
        let name = col.name.replace('\'', "''");
        projection.push_str(&format!(
            ", DBMS_LOGMNR.COLUMN_PRESENT(REDO_VALUE, OBJECT_ID, '{name}') AS \"P{i}\"\
             , DBMS_LOGMNR.MINE_VALUE(REDO_VALUE, OBJECT_ID, '{name}') AS \"R{i}\"\
             , DBMS_LOGMNR.COLUMN_PRESENT(UNDO_VALUE, OBJECT_ID, '{name}') AS \"Q{i}\"\
             , DBMS_LOGMNR.MINE_VALUE(UNDO_VALUE, OBJECT_ID, '{name}') AS \"U{i}\"",
        ));
    }
    format!(
        "SELECT SCN, OPERATION_CODE, TIMESTAMP{projection} \
         FROM V$LOGMNR_CONTENTS \
         WHERE SCN > :1 AND OPERATION_CODE IN (1,2,3) AND SEG_OWNER = :2 AND TABLE_NAME = :3 \
         ORDER BY SCN ASC"
    )
}

/// Column index (0-based, in `columns` order) -> the 0-based offset of its
/// first projected expression in the row, after the three fixed columns.
pub fn column_base_index(i: usize) -> usize {
    FIXED_COLUMN_COUNT + i * EXPRESSIONS_PER_COLUMN
}

/// `MINE_VALUE` always returns text; interpret it using the column's
/// catalog `DATA_TYPE` so numeric/date columns round-trip as the same JSON
/// shape the snapshot path (`blocking::column_value`) produces.
pub fn mine_value_to_json(base_type: &str, raw: &str) -> Value {
    let upper = base_type.to_uppercase();
    if upper.starts_with("NUMBER") || upper.contains("FLOAT") || upper.contains("DOUBLE") || upper.contains("INT") {
        if let Ok(n) = raw.trim().parse::<f64>() {
            return serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
        }
    } else if upper.starts_with("DATE") || upper.contains("TIMESTAMP") {
        if let Some(ts) = parse_mined_timestamp(raw.trim()) {
            return Value::String(ts.and_utc().to_rfc3339());
        }
    }
    Value::String(raw.to_string())
}

fn parse_mined_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, base_type: &str) -> ColumnDef {
        ColumnDef {
            name: name.into(),
            base_type: base_type.into(),
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            pk: false,
        }
    }

    #[test]
    fn mine_value_sql_projects_four_expressions_per_column() {
        let columns = vec![col("ID", "NUMBER"), col("NAME", "VARCHAR2")];
        let sql = build_mine_value_sql(&columns);
        assert!(sql.contains("\"P0\""));
        assert!(sql.contains("\"R0\""));
        assert!(sql.contains("\"Q0\""));
        assert!(sql.contains("\"U0\""));
        assert!(sql.contains("\"P1\""));
        assert!(sql.contains("'NAME'"));
    }

    #[test]
    fn column_base_index_accounts_for_fixed_columns() {
        assert_eq!(column_base_index(0), 3);
        assert_eq!(column_base_index(1), 7);
    }

    #[test]
    fn mine_value_to_json_parses_numbers() {
        assert_eq!(mine_value_to_json("NUMBER", "42"), Value::from(42.0));
    }

    #[test]
    fn mine_value_to_json_parses_timestamps() {
        let v = mine_value_to_json("TIMESTAMP(6)", "2024-01-02 03:04:05.000000");
        assert_eq!(v, Value::String("2024-01-02T03:04:05+00:00".into()));
    }

    #[test]
    fn mine_value_to_json_falls_back_to_text() {
        assert_eq!(mine_value_to_json("VARCHAR2", "hello"), Value::String("hello".into()));
    }
}
