use std::collections::HashMap;

use replicator_types::{Endpoint, EndpointKind, ReplicatorError, Result};

use crate::factory::{SourceConnectorFactory, TargetConnectorFactory};
use crate::traits::{SourceConnector, TargetConnector};

/// Keyed lookup of connector factories by `EndpointKind`, replacing the
/// Python original's runtime `isinstance`/class-registry dispatch with a
/// table built once at startup.
#[derive(Default)]
pub struct SourceConnectorRegistry {
    factories: HashMap<EndpointKind, Box<dyn SourceConnectorFactory>>,
}

impl SourceConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EndpointKind, factory: Box<dyn SourceConnectorFactory>) {
        self.factories.insert(kind, factory);
    }

    pub fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn SourceConnector>> {
        let factory = self.factories.get(&endpoint.kind).ok_or_else(|| {
            ReplicatorError::ConfigError(format!(
                "no source connector registered for endpoint kind {:?}",
                endpoint.kind
            ))
        })?;
        factory.build(endpoint)
    }
}

#[derive(Default)]
pub struct TargetConnectorRegistry {
    factories: HashMap<EndpointKind, Box<dyn TargetConnectorFactory>>,
}

impl TargetConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EndpointKind, factory: Box<dyn TargetConnectorFactory>) {
        self.factories.insert(kind, factory);
    }

    pub fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn TargetConnector>> {
        let factory = self.factories.get(&endpoint.kind).ok_or_else(|| {
            ReplicatorError::ConfigError(format!(
                "no target connector registered for endpoint kind {:?}",
                endpoint.kind
            ))
        })?;
        factory.build(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use replicator_types::{ChangeEvent, Position, Role, SourceTableSchema, TableSpec};
    use std::collections::BTreeMap;

    struct FakeOracleSource;

    #[async_trait]
    impl SourceConnector for FakeOracleSource {
        async fn connect(&mut self) -> Result<()> {
            Ok(())
        }
        async fn disconnect(&mut self) -> Result<()> {
            Ok(())
        }
        async fn list_schemas_and_tables(&mut self) -> Result<BTreeMap<String, Vec<String>>> {
            Ok(BTreeMap::new())
        }
        async fn get_table_schema(&mut self, schema: &str, table: &str) -> Result<SourceTableSchema> {
            Ok(SourceTableSchema {
                schema: schema.into(),
                table: table.into(),
                columns: vec![],
                primary_key: vec![],
            })
        }
        async fn get_current_position(&mut self) -> Result<Position> {
            Ok(Position::null())
        }
        async fn snapshot_chunk(
            &mut self,
            _table: &TableSpec,
            _chunk_size: u32,
            _offset: u64,
        ) -> Result<crate::SnapshotChunk> {
            Ok(crate::SnapshotChunk::default())
        }
        async fn get_changes(
            &mut self,
            _tables: &[TableSpec],
            last_position: &Position,
        ) -> Result<(Vec<ChangeEvent>, Position)> {
            Ok((vec![], last_position.clone()))
        }
    }

    struct FakeOracleFactory;

    impl SourceConnectorFactory for FakeOracleFactory {
        fn build(&self, _endpoint: &Endpoint) -> Result<Box<dyn SourceConnector>> {
            Ok(Box::new(FakeOracleSource))
        }
    }

    fn oracle_endpoint() -> Endpoint {
        Endpoint {
            id: "src".into(),
            kind: EndpointKind::Oracle,
            role: Role::Source,
            host: "localhost".into(),
            port: 1521,
            database: None,
            service_name: Some("ORCL".into()),
            username: "hr".into(),
            password: "secret".into(),
            target_schema: None,
        }
    }

    #[test]
    fn builds_registered_kind() {
        let mut registry = SourceConnectorRegistry::new();
        registry.register(EndpointKind::Oracle, Box::new(FakeOracleFactory));
        assert!(registry.build(&oracle_endpoint()).is_ok());
    }

    #[test]
    fn errors_on_unregistered_kind() {
        let registry = SourceConnectorRegistry::new();
        let err = registry.build(&oracle_endpoint()).unwrap_err();
        assert!(matches!(err, ReplicatorError::ConfigError(_)));
    }
}
