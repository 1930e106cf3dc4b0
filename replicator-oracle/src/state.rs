/// Connector-internal state, per spec.md §4.2.2 (`Disconnected -> Connected
/// -> {Idle, MiningSession, Failed}`). Not exposed outside this crate; the
/// executor only sees the `SourceConnector` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Idle,
    MiningSession,
    Failed,
}
