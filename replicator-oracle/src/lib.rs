//! Oracle LogMiner source connector (C3): the normative tail algorithm from
//! spec is implemented in `blocking`, driven through `tokio::spawn_blocking`
//! by `OracleSourceConnector`.

mod blocking;
mod column_values;
mod config;
mod connector;
mod error;
mod factory;
mod state;

pub use config::OracleConfig;
pub use connector::OracleSourceConnector;
pub use factory::OracleSourceConnectorFactory;
