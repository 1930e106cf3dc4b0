use replicator_types::{Endpoint, Result};

use crate::{SourceConnector, TargetConnector};

/// Builds a `SourceConnector` for one `EndpointKind`. The executor never
/// matches on `EndpointKind` itself; it looks up the right factory once at
/// startup and treats every endpoint uniformly from then on.
pub trait SourceConnectorFactory: Send + Sync {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn SourceConnector>>;
}

pub trait TargetConnectorFactory: Send + Sync {
    fn build(&self, endpoint: &Endpoint) -> Result<Box<dyn TargetConnector>>;
}
