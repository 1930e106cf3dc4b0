use async_trait::async_trait;
use oracle::Connection;
use replicator_connector::{SnapshotChunk, TargetConnector};
use replicator_types::{ChangeEvent, ReplicatorError, Result, SourceTableSchema};

use crate::dialect::{OracleDialect, SqlDialect};
use crate::oracle_apply;

pub struct OracleTargetConnector {
    connect_string: String,
    username: String,
    password: String,
    conn: Option<Connection>,
    dialect: OracleDialect,
}

impl OracleTargetConnector {
    pub fn new(connect_string: String, username: String, password: String) -> Self {
        Self {
            connect_string,
            username,
            password,
            conn: None,
            dialect: OracleDialect,
        }
    }

    fn take_conn(&mut self) -> Result<Connection> {
        self.conn
            .take()
            .ok_or_else(|| ReplicatorError::ConnectError("oracle target is not connected".into()))
    }

    async fn with_conn<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.take_conn()?;
        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = f(&conn);
            (conn, result)
        })
        .await
        .map_err(|e| ReplicatorError::TargetApplyError(format!("blocking task panicked: {e}")))?;
        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl TargetConnector for OracleTargetConnector {
    async fn connect(&mut self) -> Result<()> {
        let connect_string = self.connect_string.clone();
        let username = self.username.clone();
        let password = self.password.clone();
        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(&username, &password, &connect_string)
                .map_err(|e| ReplicatorError::ConnectError(e.to_string()))
        })
        .await
        .map_err(|e| ReplicatorError::ConnectError(format!("blocking task panicked: {e}")))??;
        self.conn = Some(conn);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || {
            let _ = conn.close();
        })
        .await
        .map_err(|e| ReplicatorError::TargetApplyError(format!("blocking task panicked: {e}")))?;
        Ok(())
    }

    async fn create_schema_if_absent(&mut self, schema: &str) -> Result<()> {
        let schema = schema.to_uppercase();
        self.with_conn(move |conn| {
            let exists = conn
                .query_row_as::<Option<String>>("SELECT USERNAME FROM ALL_USERS WHERE USERNAME = :1", &[&schema])
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
            if exists.is_some() {
                return Ok(());
            }
            Err(ReplicatorError::ConfigError(format!(
                "oracle target schema {schema} does not exist; this workspace does not provision Oracle users, create it out of band"
            )))
        })
        .await
    }

    async fn create_table_if_absent(&mut self, table: &SourceTableSchema) -> Result<()> {
        let table = table.clone();
        let dialect = OracleDialect;
        self.with_conn(move |conn| {
            let exists = conn
                .query_row_as::<Option<String>>(
                    "SELECT TABLE_NAME FROM ALL_TABLES WHERE OWNER = :1 AND TABLE_NAME = :2",
                    &[&table.schema.to_uppercase(), &table.table.to_uppercase()],
                )
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
            if exists.is_some() {
                return Ok(());
            }
            let sql = dialect.create_table_sql(&table);
            conn.execute(&sql, &[])
                .map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))?;
            conn.commit().map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))
        })
        .await
    }

    async fn clear_table(&mut self, schema: &str, table: &str) -> Result<()> {
        let schema = schema.to_string();
        let table = table.to_string();
        let dialect = OracleDialect;
        self.with_conn(move |conn| {
            let sql = dialect.delete_clear_sql(&schema, &table);
            match conn.execute(&sql, &[]) {
                Ok(_) => conn.commit().map_err(|e| ReplicatorError::TargetApplyError(e.to_string())),
                Err(e) if is_no_such_table(&e) => {
                    tracing::warn!(schema = %schema, table = %table, "clear_table: target table missing, treating as no-op");
                    Ok(())
                }
                Err(e) => Err(ReplicatorError::TargetApplyError(e.to_string())),
            }
        })
        .await
    }

    async fn write_snapshot_chunk(&mut self, schema: &str, table: &str, chunk: &SnapshotChunk) -> Result<()> {
        if chunk.rows.is_empty() {
            return Ok(());
        }
        let schema = schema.to_string();
        let table = table.to_string();
        let rows = chunk.rows.clone();
        let dialect = OracleDialect;
        self.with_conn(move |conn| {
            let columns: Vec<String> = rows[0].keys().cloned().collect();
            let sql = dialect.insert_sql(&schema, &table, &columns);
            let col_types = oracle_apply::column_types(conn, &schema, &table)?;
            for row in &rows {
                oracle_apply::execute_row(conn, &sql, &columns, row, &col_types)?;
            }
            conn.commit().map_err(|e| ReplicatorError::TargetApplyError(e.to_string()))
        })
        .await
    }

    async fn apply_changes(&mut self, events: &[ChangeEvent], merge_enabled: bool) -> Result<()> {
        let events = events.to_vec();
        self.with_conn(move |conn| oracle_apply::apply_batch(conn, &events, merge_enabled)).await
    }
}

fn is_no_such_table(err: &oracle::Error) -> bool {
    err.to_string().contains("ORA-00942")
}
