//! The seam every source and target connector implements. The executor (C5)
//! drives tasks purely in terms of these traits; it never knows whether it
//! is talking to Oracle LogMiner, Postgres or a target database.

mod factory;
mod registry;
mod traits;

pub use factory::{SourceConnectorFactory, TargetConnectorFactory};
pub use registry::{SourceConnectorRegistry, TargetConnectorRegistry};
pub use traits::{SchemaConverter, SnapshotChunk, SourceConnector, TargetConnector};
