use replicator_types::{EndpointKind, SourceTableSchema};

/// Column names appended to every created target table so `apply_changes`'
/// upsert path (spec's `merge_enabled`) has somewhere to record row
/// provenance. Present even when a task never turns merge on, the same way
/// a table's columns don't change depending on which DML touches it.
pub const META_CREATE_COLUMN: &str = "meta_create_timestamp";
pub const META_UPDATE_COLUMN: &str = "meta_update_timestamp";

/// String-generation seam for the three SQL targets this workspace supports.
/// Connection handling, binding, and transaction control stay with each
/// concrete connector; only the text of the statements is generalized here,
/// since Oracle's synchronous driver and the two async drivers don't share
/// an executor shape worth forcing into one trait.
pub trait SqlDialect: Send + Sync {
    fn kind(&self) -> EndpointKind;

    fn quote_ident(&self, ident: &str) -> String;

    fn qualified(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    /// Positional bind placeholder for the `index`-th bound value (1-based).
    fn placeholder(&self, index: usize) -> String;

    fn timestamp_type(&self) -> &'static str;

    /// `None` means this dialect has no idempotent "create schema" DDL
    /// (Oracle schemas are users, which this workspace does not provision).
    fn create_schema_sql(&self, schema: &str) -> Option<String>;

    fn create_table_sql(&self, table: &SourceTableSchema) -> String {
        let mut columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "" } else { " NOT NULL" };
                format!("{} {}{}", self.quote_ident(&c.name), c.base_type, null)
            })
            .collect();
        columns.push(format!("{} {}", self.quote_ident(META_CREATE_COLUMN), self.timestamp_type()));
        columns.push(format!("{} {}", self.quote_ident(META_UPDATE_COLUMN), self.timestamp_type()));
        if !table.primary_key.is_empty() {
            let pk_cols: Vec<String> = table.primary_key.iter().map(|c| self.quote_ident(c)).collect();
            columns.push(format!("PRIMARY KEY ({})", pk_cols.join(", ")));
        }
        format!(
            "CREATE TABLE {} ({})",
            self.qualified(&table.schema, &table.table),
            columns.join(", ")
        )
    }

    fn insert_sql(&self, schema: &str, table: &str, columns: &[String]) -> String {
        let idents: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified(schema, table),
            idents.join(", "),
            placeholders.join(", ")
        )
    }

    fn delete_by_pk_sql(&self, schema: &str, table: &str, pk_columns: &[String]) -> String {
        let clauses: Vec<String> = pk_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", self.quote_ident(c), self.placeholder(i + 1)))
            .collect();
        format!("DELETE FROM {} WHERE {}", self.qualified(schema, table), clauses.join(" AND "))
    }

    fn update_by_pk_sql(&self, schema: &str, table: &str, set_columns: &[String], pk_columns: &[String]) -> String {
        let sets: Vec<String> = set_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", self.quote_ident(c), self.placeholder(i + 1)))
            .collect();
        let offset = set_columns.len();
        let clauses: Vec<String> = pk_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = {}", self.quote_ident(c), self.placeholder(offset + i + 1)))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {}",
            self.qualified(schema, table),
            sets.join(", "),
            clauses.join(" AND ")
        )
    }

    /// Dialect-specific idempotent upsert keyed on `pk_columns`. `all_columns`
    /// includes the primary key columns (used for the insert branch); the
    /// update branch sets every non-key column plus `meta_update_timestamp`.
    fn upsert_sql(&self, schema: &str, table: &str, all_columns: &[String], pk_columns: &[String]) -> String;

    fn delete_clear_sql(&self, schema: &str, table: &str) -> String {
        format!("DELETE FROM {}", self.qualified(schema, table))
    }
}

pub struct OracleDialect;
pub struct PostgresDialect;
pub struct MySqlDialect;

impl SqlDialect for OracleDialect {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Oracle
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.to_uppercase())
    }

    fn placeholder(&self, index: usize) -> String {
        format!(":{index}")
    }

    fn timestamp_type(&self) -> &'static str {
        "TIMESTAMP"
    }

    fn create_schema_sql(&self, _schema: &str) -> Option<String> {
        None
    }

    fn upsert_sql(&self, schema: &str, table: &str, all_columns: &[String], pk_columns: &[String]) -> String {
        let target = self.qualified(schema, table);
        let non_key: Vec<&String> = all_columns.iter().filter(|c| !pk_columns.contains(c)).collect();
        let using_cols: Vec<String> = all_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} AS {}", self.placeholder(i + 1), self.quote_ident(c)))
            .collect();
        let on_clause: Vec<String> = pk_columns
            .iter()
            .map(|c| format!("t.{0} = s.{0}", self.quote_ident(c)))
            .collect();
        let set_clause: Vec<String> = non_key
            .iter()
            .map(|c| format!("t.{0} = s.{0}", self.quote_ident(c)))
            .chain(std::iter::once(format!("t.{} = SYSTIMESTAMP", self.quote_ident(META_UPDATE_COLUMN))))
            .collect();
        let insert_cols: Vec<String> = all_columns.iter().map(|c| self.quote_ident(c)).collect();
        let insert_vals: Vec<String> = all_columns.iter().map(|c| format!("s.{}", self.quote_ident(c))).collect();
        format!(
            "MERGE INTO {target} t USING (SELECT {using} FROM DUAL) s ON ({on}) \
             WHEN MATCHED THEN UPDATE SET {set} \
             WHEN NOT MATCHED THEN INSERT ({icols}, {ccol}, {ucol}) VALUES ({ivals}, SYSTIMESTAMP, SYSTIMESTAMP)",
            using = using_cols.join(", "),
            on = on_clause.join(" AND "),
            set = set_clause.join(", "),
            icols = insert_cols.join(", "),
            ccol = self.quote_ident(META_CREATE_COLUMN),
            ucol = self.quote_ident(META_UPDATE_COLUMN),
            ivals = insert_vals.join(", "),
        )
    }
}

impl SqlDialect for PostgresDialect {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Postgres
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.to_lowercase())
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn timestamp_type(&self) -> &'static str {
        "TIMESTAMPTZ"
    }

    fn create_schema_sql(&self, schema: &str) -> Option<String> {
        Some(format!("CREATE SCHEMA IF NOT EXISTS {}", self.quote_ident(schema)))
    }

    fn upsert_sql(&self, schema: &str, table: &str, all_columns: &[String], pk_columns: &[String]) -> String {
        let target = self.qualified(schema, table);
        let idents: Vec<String> = all_columns.iter().map(|c| self.quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=all_columns.len()).map(|i| self.placeholder(i)).collect();
        let conflict_cols: Vec<String> = pk_columns.iter().map(|c| self.quote_ident(c)).collect();
        let set_clause: Vec<String> = all_columns
            .iter()
            .filter(|c| !pk_columns.contains(c))
            .map(|c| format!("{0} = EXCLUDED.{0}", self.quote_ident(c)))
            .chain(std::iter::once(format!(
                "{} = now()",
                self.quote_ident(META_UPDATE_COLUMN)
            )))
            .collect();
        format!(
            "INSERT INTO {target} ({cols}, {ccol}, {ucol}) VALUES ({vals}, now(), now()) \
             ON CONFLICT ({conflict}) DO UPDATE SET {set}",
            cols = idents.join(", "),
            ccol = self.quote_ident(META_CREATE_COLUMN),
            ucol = self.quote_ident(META_UPDATE_COLUMN),
            vals = placeholders.join(", "),
            conflict = conflict_cols.join(", "),
            set = set_clause.join(", "),
        )
    }
}

impl SqlDialect for MySqlDialect {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Mysql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{ident}`")
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn timestamp_type(&self) -> &'static str {
        "DATETIME"
    }

    fn create_schema_sql(&self, schema: &str) -> Option<String> {
        Some(format!("CREATE DATABASE IF NOT EXISTS {}", self.quote_ident(schema)))
    }

    fn upsert_sql(&self, schema: &str, table: &str, all_columns: &[String], pk_columns: &[String]) -> String {
        let target = self.qualified(schema, table);
        let idents: Vec<String> = all_columns.iter().map(|c| self.quote_ident(c)).collect();
        let placeholders: Vec<String> = all_columns.iter().map(|_| "?".to_string()).collect();
        let set_clause: Vec<String> = all_columns
            .iter()
            .filter(|c| !pk_columns.contains(c))
            .map(|c| format!("{0} = VALUES({0})", self.quote_ident(c)))
            .chain(std::iter::once(format!(
                "{} = NOW()",
                self.quote_ident(META_UPDATE_COLUMN)
            )))
            .collect();
        format!(
            "INSERT INTO {target} ({cols}, {ccol}, {ucol}) VALUES ({vals}, NOW(), NOW()) \
             ON DUPLICATE KEY UPDATE {set}",
            cols = idents.join(", "),
            ccol = self.quote_ident(META_CREATE_COLUMN),
            ucol = self.quote_ident(META_UPDATE_COLUMN),
            vals = placeholders.join(", "),
            set = set_clause.join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_upsert_sets_meta_update_timestamp() {
        let dialect = PostgresDialect;
        let sql = dialect.upsert_sql(
            "public",
            "accounts",
            &["id".into(), "name".into()],
            &["id".into()],
        );
        assert!(sql.contains("ON CONFLICT (\"id\") DO UPDATE"));
        assert!(sql.contains("meta_update_timestamp"));
    }

    #[test]
    fn oracle_quote_ident_uppercases() {
        let dialect = OracleDialect;
        assert_eq!(dialect.quote_ident("employees"), "\"EMPLOYEES\"");
    }
}
