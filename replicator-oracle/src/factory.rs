use replicator_connector::{SourceConnector, SourceConnectorFactory};
use replicator_types::{Endpoint, Result};

use crate::config::OracleConfig;
use crate::connector::OracleSourceConnector;

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleSourceConnectorFactory;

impl SourceConnectorFactory for OracleSourceConnectorFactory {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn SourceConnector>> {
        let config = OracleConfig::from_endpoint(endpoint)?;
        Ok(Box::new(OracleSourceConnector::new(config)))
    }
}
