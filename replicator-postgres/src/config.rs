use replicator_types::{Endpoint, ReplicatorError, Result};

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub endpoint_id: String,
}

impl PostgresConfig {
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self> {
        let database = endpoint
            .database
            .clone()
            .ok_or_else(|| ReplicatorError::ConfigError("postgres endpoint is missing database".into()))?;
        Ok(Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            database,
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
            endpoint_id: endpoint.id.clone(),
        })
    }

    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.username, self.password
        )
    }

    /// Deterministic per-endpoint slot name; replication slots are
    /// per-database server objects, so this must not collide across tasks
    /// sharing the same source endpoint.
    pub fn slot_name(&self) -> String {
        format!("replicator_{}", self.endpoint_id.replace(['-', '.'], "_"))
    }
}
