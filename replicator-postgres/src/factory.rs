use replicator_connector::{SourceConnector, SourceConnectorFactory};
use replicator_types::{Endpoint, Result};

use crate::config::PostgresConfig;
use crate::connector::PostgresSourceConnector;

#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresSourceConnectorFactory;

impl SourceConnectorFactory for PostgresSourceConnectorFactory {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn SourceConnector>> {
        let config = PostgresConfig::from_endpoint(endpoint)?;
        Ok(Box::new(PostgresSourceConnector::new(config)))
    }
}
