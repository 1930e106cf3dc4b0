use replicator_types::EndpointKind;

use crate::generic::GenericType;

/// Renders a generic type back into one target database's DDL type name,
/// threading through length/precision/scale where the target vocabulary
/// takes them.
pub fn render(
    generic: GenericType,
    target_kind: EndpointKind,
    length: Option<u32>,
    precision: Option<u32>,
    scale: Option<i32>,
) -> String {
    use EndpointKind::*;
    use GenericType::*;
    match (generic, target_kind) {
        (Varchar, Oracle) => sized("VARCHAR2", length.unwrap_or(4000)),
        (Varchar, Postgres) => sized("VARCHAR", length.unwrap_or(4000)),
        (Varchar, Mysql) => sized("VARCHAR", length.unwrap_or(4000)),
        (Varchar, Bigquery) => "STRING".into(),

        (Char, Oracle) => sized("CHAR", length.unwrap_or(1)),
        (Char, Postgres) | (Char, Mysql) => sized("CHAR", length.unwrap_or(1)),
        (Char, Bigquery) => "STRING".into(),

        (Numeric, Oracle) => precise("NUMBER", precision, scale),
        (Numeric, Postgres) => precise("NUMERIC", precision, scale),
        (Numeric, Mysql) => precise("DECIMAL", precision, scale),
        (Numeric, Bigquery) => "NUMERIC".into(),

        (Integer, Oracle) => "NUMBER(10)".into(),
        (Integer, Postgres) => "INTEGER".into(),
        (Integer, Mysql) => "INT".into(),
        (Integer, Bigquery) => "INT64".into(),

        (SmallInt, Oracle) => "NUMBER(5)".into(),
        (SmallInt, Postgres) => "SMALLINT".into(),
        (SmallInt, Mysql) => "SMALLINT".into(),
        (SmallInt, Bigquery) => "INT64".into(),

        (BigInt, Oracle) => "NUMBER(19)".into(),
        (BigInt, Postgres) => "BIGINT".into(),
        (BigInt, Mysql) => "BIGINT".into(),
        (BigInt, Bigquery) => "INT64".into(),

        (Float, Oracle) => "BINARY_FLOAT".into(),
        (Float, Postgres) => "REAL".into(),
        (Float, Mysql) => "FLOAT".into(),
        (Float, Bigquery) => "FLOAT64".into(),

        (Double, Oracle) => "BINARY_DOUBLE".into(),
        (Double, Postgres) => "DOUBLE PRECISION".into(),
        (Double, Mysql) => "DOUBLE".into(),
        (Double, Bigquery) => "FLOAT64".into(),

        (Boolean, Oracle) => "NUMBER(1)".into(),
        (Boolean, Postgres) => "BOOLEAN".into(),
        (Boolean, Mysql) => "TINYINT(1)".into(),
        (Boolean, Bigquery) => "BOOL".into(),

        (Text, Oracle) => "CLOB".into(),
        (Text, Postgres) => "TEXT".into(),
        (Text, Mysql) => "LONGTEXT".into(),
        (Text, Bigquery) => "STRING".into(),

        (Binary, Oracle) => "BLOB".into(),
        (Binary, Postgres) => "BYTEA".into(),
        (Binary, Mysql) => "LONGBLOB".into(),
        (Binary, Bigquery) => "BYTES".into(),

        (Timestamp, Oracle) => "DATE".into(),
        (Timestamp, Postgres) => "TIMESTAMP".into(),
        (Timestamp, Mysql) => "DATETIME".into(),
        (Timestamp, Bigquery) => "TIMESTAMP".into(),

        (TimestampTz, Oracle) => "TIMESTAMP WITH TIME ZONE".into(),
        (TimestampTz, Postgres) => "TIMESTAMP WITH TIME ZONE".into(),
        (TimestampTz, Mysql) => "TIMESTAMP".into(),
        (TimestampTz, Bigquery) => "TIMESTAMP".into(),

        (Json, Oracle) => "CLOB".into(),
        (Json, Postgres) => "JSONB".into(),
        (Json, Mysql) => "JSON".into(),
        (Json, Bigquery) => "JSON".into(),

        (Uuid, Oracle) => "VARCHAR2(36)".into(),
        (Uuid, Postgres) => "UUID".into(),
        (Uuid, Mysql) => "CHAR(36)".into(),
        (Uuid, Bigquery) => "STRING".into(),

        (Interval, Oracle) => "INTERVAL DAY TO SECOND".into(),
        (Interval, Postgres) => "INTERVAL".into(),
        (Interval, Mysql) => "VARCHAR(64)".into(),
        (Interval, Bigquery) => "STRING".into(),
    }
}

fn sized(name: &str, length: u32) -> String {
    format!("{name}({length})")
}

fn precise(name: &str, precision: Option<u32>, scale: Option<i32>) -> String {
    match (precision, scale) {
        (Some(p), Some(s)) => format!("{name}({p},{s})"),
        (Some(p), None) => format!("{name}({p})"),
        (None, _) => name.to_string(),
    }
}
