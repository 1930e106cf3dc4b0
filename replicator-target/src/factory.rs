use replicator_connector::{TargetConnector, TargetConnectorFactory};
use replicator_types::{Endpoint, ReplicatorError, Result};

use crate::mysql_target::MysqlTargetConnector;
use crate::oracle_target::OracleTargetConnector;
use crate::postgres_target::PostgresTargetConnector;

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleTargetConnectorFactory;

impl TargetConnectorFactory for OracleTargetConnectorFactory {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn TargetConnector>> {
        let service_name = endpoint
            .service_name
            .clone()
            .ok_or_else(|| ReplicatorError::ConfigError("oracle target endpoint is missing service_name".into()))?;
        let connect_string = format!("//{}:{}/{}", endpoint.host, endpoint.port, service_name);
        Ok(Box::new(OracleTargetConnector::new(
            connect_string,
            endpoint.username.clone(),
            endpoint.password.clone(),
        )))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresTargetConnectorFactory;

impl TargetConnectorFactory for PostgresTargetConnectorFactory {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn TargetConnector>> {
        let database = endpoint
            .database
            .clone()
            .ok_or_else(|| ReplicatorError::ConfigError("postgres target endpoint is missing database".into()))?;
        Ok(Box::new(PostgresTargetConnector::new(
            endpoint.host.clone(),
            endpoint.port,
            database,
            endpoint.username.clone(),
            endpoint.password.clone(),
        )))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlTargetConnectorFactory;

impl TargetConnectorFactory for MysqlTargetConnectorFactory {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn TargetConnector>> {
        let database = endpoint
            .database
            .clone()
            .ok_or_else(|| ReplicatorError::ConfigError("mysql target endpoint is missing database".into()))?;
        Ok(Box::new(MysqlTargetConnector::new(
            endpoint.host.clone(),
            endpoint.port,
            database,
            endpoint.username.clone(),
            endpoint.password.clone(),
        )))
    }
}
