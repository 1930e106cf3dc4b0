use replicator_connector::{SourceConnectorRegistry, TargetConnectorRegistry};
use replicator_types::EndpointKind;

/// Populates a `SourceConnectorRegistry` with every source connector this
/// workspace ships. BigQuery has no connector (see DESIGN.md's Open
/// Question), so selecting it surfaces `ConfigError` from the registry
/// lookup rather than a panic here.
pub fn build_source_registry() -> SourceConnectorRegistry {
    let mut registry = SourceConnectorRegistry::new();
    registry.register(EndpointKind::Oracle, Box::new(replicator_oracle::OracleSourceConnectorFactory));
    registry.register(EndpointKind::Postgres, Box::new(replicator_postgres::PostgresSourceConnectorFactory));
    registry.register(EndpointKind::Mysql, Box::new(replicator_mysql::MysqlSourceConnectorFactory));
    registry
}

pub fn build_target_registry() -> TargetConnectorRegistry {
    let mut registry = TargetConnectorRegistry::new();
    registry.register(EndpointKind::Oracle, Box::new(replicator_target::OracleTargetConnectorFactory));
    registry.register(EndpointKind::Postgres, Box::new(replicator_target::PostgresTargetConnectorFactory));
    registry.register(EndpointKind::Mysql, Box::new(replicator_target::MysqlTargetConnectorFactory));
    registry
}
