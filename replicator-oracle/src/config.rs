use replicator_types::{Endpoint, ReplicatorError, Result};

/// Connection parameters for one Oracle endpoint, parsed once out of the
/// generic `Endpoint` row.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub username: String,
    pub password: String,
}

impl OracleConfig {
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self> {
        let service_name = endpoint.service_name.clone().ok_or_else(|| {
            ReplicatorError::ConfigError("oracle endpoint is missing service_name".into())
        })?;
        Ok(Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            service_name,
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
        })
    }

    /// Oracle "easy connect" descriptor, e.g. `//host:1521/ORCLPDB1`.
    pub fn connect_string(&self) -> String {
        format!("//{}:{}/{}", self.host, self.port, self.service_name)
    }
}
