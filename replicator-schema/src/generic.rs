/// A source-agnostic column type, the intermediate representation every
/// source base type is mapped into before being rendered back out in the
/// target's own type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericType {
    Varchar,
    Char,
    Numeric,
    Integer,
    SmallInt,
    BigInt,
    Float,
    Double,
    Boolean,
    Text,
    Binary,
    Timestamp,
    TimestampTz,
    Json,
    Uuid,
    Interval,
}

/// Source base type name (upper-cased) -> generic type, covering Oracle,
/// Postgres and MySQL vocabularies the way a single shared map would if one
/// basic converter served every source kind.
pub fn lookup(base_type: &str) -> Option<GenericType> {
    use GenericType::*;
    let hit = match base_type {
        "VARCHAR2" | "NVARCHAR2" | "VARCHAR" | "CHARACTER VARYING" => Varchar,
        "CHAR" | "NCHAR" | "CHARACTER" => Char,
        "NUMBER" | "DECIMAL" | "NUMERIC" => Numeric,
        "INTEGER" | "INT" | "INT4" | "MEDIUMINT" => Integer,
        "SMALLINT" | "INT2" | "TINYINT" => SmallInt,
        "BIGINT" | "INT8" => BigInt,
        "FLOAT" | "BINARY_FLOAT" | "REAL" | "FLOAT4" => Float,
        "BINARY_DOUBLE" | "DOUBLE PRECISION" | "DOUBLE" | "FLOAT8" => Double,
        "BOOLEAN" | "BOOL" => Boolean,
        "CLOB" | "NCLOB" | "TEXT" | "LONG" | "MEDIUMTEXT" | "LONGTEXT" => Text,
        "BLOB" | "RAW" | "LONG RAW" | "BYTEA" | "BINARY" | "VARBINARY" => Binary,
        "DATE" | "TIMESTAMP" | "DATETIME" => Timestamp,
        "TIMESTAMP WITH TIME ZONE" | "TIMESTAMP WITH LOCAL TIME ZONE" | "TIMESTAMPTZ" => {
            TimestampTz
        }
        "JSON" | "JSONB" => Json,
        "UUID" => Uuid,
        "INTERVAL YEAR TO MONTH" | "INTERVAL DAY TO SECOND" | "INTERVAL" => Interval,
        _ => return None,
    };
    Some(hit)
}

/// Best-effort fallback for a base type the exact-match table above doesn't
/// know, based on its leading token. Mirrors the original converter's
/// `startswith` fallback chain.
pub fn lookup_prefix(base_type: &str) -> Option<GenericType> {
    use GenericType::*;
    if base_type.starts_with("VARCHAR") || base_type.starts_with("NVARCHAR") {
        Some(Varchar)
    } else if base_type.starts_with("NUMBER") || base_type.starts_with("DECIMAL") {
        Some(Numeric)
    } else if base_type.starts_with("CHAR") || base_type.starts_with("NCHAR") {
        Some(Char)
    } else if base_type.starts_with("FLOAT") {
        Some(Float)
    } else {
        None
    }
}
