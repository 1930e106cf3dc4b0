use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque marker of "how far we have consumed from the source".
///
/// The core treats this as a black-box blob: it is stored, compared for
/// equality and serialized, but never interpreted. Only the source
/// connector that produced a `Position` knows how to read it (for the
/// Oracle LogMiner source, the observable shape is `{"scn": <u64>}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Position(pub Value);

impl Position {
    /// `null` means "start from the current source position".
    pub fn null() -> Self {
        Position(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// Convenience constructor for SCN-based positions (Oracle).
    pub fn from_scn(scn: u64) -> Self {
        Position(serde_json::json!({ "scn": scn }))
    }

    /// Convenience accessor for SCN-based positions (Oracle). Returns `None`
    /// for positions produced by a different kind of source, or `null`.
    pub fn scn(&self) -> Option<u64> {
        self.0.get("scn").and_then(Value::as_u64)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_position_round_trips() {
        let pos = Position::null();
        assert!(pos.is_null());
        let json = serde_json::to_string(&pos).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(pos, back);
    }

    #[test]
    fn scn_position_round_trips() {
        let pos = Position::from_scn(12345);
        assert_eq!(pos.scn(), Some(12345));
        let json = serde_json::to_string(&pos).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scn(), Some(12345));
    }

    #[test]
    fn foreign_position_has_no_scn() {
        let pos = Position(serde_json::json!({ "lsn": "0/1A00000" }));
        assert_eq!(pos.scn(), None);
    }
}
