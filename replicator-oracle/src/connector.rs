use std::collections::BTreeMap;

use async_trait::async_trait;
use oracle::Connection;
use replicator_connector::{SnapshotChunk, SourceConnector};
use replicator_types::{ChangeEvent, Position, ReplicatorError, Result, SourceTableSchema, TableSpec};

use crate::blocking;
use crate::config::OracleConfig;
use crate::state::ConnectionState;

/// Oracle LogMiner source. Holds the blocking `oracle::Connection` directly;
/// every method hands it to a blocking task and gets it back, since the
/// `oracle` crate has no async API of its own.
pub struct OracleSourceConnector {
    config: OracleConfig,
    conn: Option<Connection>,
    state: ConnectionState,
}

impl OracleSourceConnector {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            config,
            conn: None,
            state: ConnectionState::Disconnected,
        }
    }

    fn take_conn(&mut self) -> Result<Connection> {
        self.conn.take().ok_or_else(|| {
            ReplicatorError::ConnectError("oracle source is not connected".into())
        })
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
        .map_err(|e| ReplicatorError::SourceFatal(format!("blocking task panicked: {e}")))?;
        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl SourceConnector for OracleSourceConnector {
    async fn connect(&mut self) -> Result<()> {
        let config = self.config.clone();
        let conn = tokio::task::spawn_blocking(move || blocking::connect(&config))
            .await
            .map_err(|e| ReplicatorError::ConnectError(format!("blocking task panicked: {e}")))??;
        self.conn = Some(conn);
        self.state = ConnectionState::Idle;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || blocking::disconnect(conn))
            .await
            .map_err(|e| ReplicatorError::SourceFatal(format!("blocking task panicked: {e}")))?
    }

    async fn list_schemas_and_tables(&mut self) -> Result<BTreeMap<String, Vec<String>>> {
        self.with_conn(|conn| blocking::list_schemas_and_tables(conn)).await
    }

    async fn get_table_schema(&mut self, schema: &str, table: &str) -> Result<SourceTableSchema> {
        let schema = schema.to_string();
        let table = table.to_string();
        self.with_conn(move |conn| blocking::get_table_schema(conn, &schema, &table))
            .await
    }

    async fn get_current_position(&mut self) -> Result<Position> {
        let scn = self.with_conn(|conn| blocking::current_scn(conn)).await?;
        Ok(Position::from_scn(scn))
    }

    async fn snapshot_chunk(
        &mut self,
        table: &TableSpec,
        chunk_size: u32,
        offset: u64,
    ) -> Result<SnapshotChunk> {
        let table = table.clone();
        let (rows, is_last) = self
            .with_conn(move |conn| blocking::snapshot_chunk(conn, &table, chunk_size, offset))
            .await?;
        Ok(SnapshotChunk { rows, is_last })
    }

    async fn get_changes(
        &mut self,
        tables: &[TableSpec],
        last_position: &Position,
    ) -> Result<(Vec<ChangeEvent>, Position)> {
        let start_scn = last_position.scn().unwrap_or(0);
        let tables = tables.to_vec();
        self.state = ConnectionState::MiningSession;
        let result = self
            .with_conn(move |conn| blocking::tail(conn, &tables, start_scn))
            .await;
        match result {
            Ok((events, new_scn)) => {
                self.state = ConnectionState::Idle;
                Ok((events, Position::from_scn(new_scn)))
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }
}
