use replicator_types::ReplicatorError;

/// Oracle error codes that indicate a transient connectivity problem rather
/// than something durably wrong with the mining session or the data.
const TRANSIENT_CODES: &[&str] = &["ORA-03113", "ORA-03135", "ORA-12541", "ORA-12170", "ORA-02396"];

pub fn map_connect_err(err: oracle::Error) -> ReplicatorError {
    ReplicatorError::ConnectError(err.to_string())
}

/// Maps a driver error raised while tailing changes into the source-transient
/// vs. source-fatal split spec.md §4.2 requires of `get_changes`.
pub fn map_tail_err(err: oracle::Error) -> ReplicatorError {
    let message = err.to_string();
    if TRANSIENT_CODES.iter().any(|code| message.contains(code)) {
        ReplicatorError::SourceTransient(message)
    } else {
        ReplicatorError::SourceFatal(message)
    }
}

pub fn map_fatal(err: oracle::Error) -> ReplicatorError {
    ReplicatorError::SourceFatal(err.to_string())
}
