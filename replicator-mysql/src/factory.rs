use replicator_connector::{SourceConnector, SourceConnectorFactory};
use replicator_types::{Endpoint, Result};

use crate::config::MysqlConfig;
use crate::connector::MysqlSourceConnector;

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlSourceConnectorFactory;

impl SourceConnectorFactory for MysqlSourceConnectorFactory {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn SourceConnector>> {
        let config = MysqlConfig::from_endpoint(endpoint)?;
        Ok(Box::new(MysqlSourceConnector::new(config)))
    }
}
