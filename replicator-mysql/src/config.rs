use replicator_types::{Endpoint, ReplicatorError, Result};

#[derive(Debug, Clone)]
pub struct MysqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Must be unique among replicas connected to the same primary.
    pub server_id: u32,
}

impl MysqlConfig {
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self> {
        let database = endpoint
            .database
            .clone()
            .ok_or_else(|| ReplicatorError::ConfigError("mysql endpoint is missing database".into()))?;
        let server_id = fnv1a32(&endpoint.id) | 0x8000_0000;
        Ok(Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            database,
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
            server_id,
        })
    }
}

/// Deterministic, endpoint-stable server id so repeated runs of the same
/// task don't collide with a previous run still registering as a replica.
fn fnv1a32(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
