use std::collections::BTreeMap;

use regex::Regex;
use replicator_types::{Operation, RowData};
use serde_json::Value;
use std::sync::OnceLock;

/// One row parsed out of a `test_decoding` logical-replication line, before
/// it is turned into a `ChangeEvent` (which also needs the table's known
/// primary-key columns, not available to this module).
pub struct DecodedRow {
    pub schema: String,
    pub table: String,
    pub operation: Operation,
    pub columns: RowData,
}

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^table (?P<schema>[^.]+)\.(?P<table>[^:]+): (?P<op>INSERT|UPDATE|DELETE): (?P<rest>.*)$")
            .expect("static regex")
    })
}

fn column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?P<name>[A-Za-z0-9_]+)\[(?P<type>[^\]]+)\]:(?P<value>'(?:[^']|'')*'|[^\s]+)")
            .expect("static regex")
    })
}

/// Parses one line of `pg_logical_slot_get_changes` output produced by the
/// `test_decoding` plugin, e.g.:
/// `table public.employees: INSERT: id[integer]:1 name[text]:'Alice'`
pub fn parse_line(line: &str) -> Option<DecodedRow> {
    let caps = line_re().captures(line)?;
    let schema = caps["schema"].to_string();
    let table = caps["table"].to_string();
    let operation = match &caps["op"] {
        "INSERT" => Operation::Insert,
        "UPDATE" => Operation::Update,
        "DELETE" => Operation::Delete,
        _ => return None,
    };

    let mut columns = BTreeMap::new();
    for col in column_re().captures_iter(&caps["rest"]) {
        let name = col["name"].to_string();
        let value = parse_value(&col["value"]);
        columns.insert(name, value);
    }

    Some(DecodedRow { schema, table, operation, columns })
}

fn parse_value(raw: &str) -> Value {
    if raw == "null" {
        return Value::Null;
    }
    if let Some(inner) = raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::String(inner.replace("''", "'"));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null);
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_line() {
        let line = "table public.employees: INSERT: id[integer]:1 name[text]:'Alice O''Brien'";
        let row = parse_line(line).unwrap();
        assert_eq!(row.schema, "public");
        assert_eq!(row.table, "employees");
        assert!(matches!(row.operation, Operation::Insert));
        assert_eq!(row.columns["id"], Value::from(1));
        assert_eq!(row.columns["name"], Value::String("Alice O'Brien".into()));
    }

    #[test]
    fn parses_delete_line_with_null() {
        let line = "table public.employees: DELETE: id[integer]:1 manager_id[integer]:null";
        let row = parse_line(line).unwrap();
        assert!(matches!(row.operation, Operation::Delete));
        assert_eq!(row.columns["manager_id"], Value::Null);
    }

    #[test]
    fn ignores_non_table_lines() {
        assert!(parse_line("BEGIN 123").is_none());
        assert!(parse_line("COMMIT 123").is_none());
    }
}
