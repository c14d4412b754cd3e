use thiserror::Error;

/// Errors surfaced by the tracking core.
///
/// Everything here is handled at the boundary where it occurs and converted
/// into a benign result; nothing propagates into the simulation tick or the
/// ingest path as a failure.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Malformed ping or query. Rejected with no state change.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced vehicle/route/stop does not resolve to known data.
    /// Treated as an empty result, never fatal.
    #[error("unknown {kind}: {id}")]
    UnknownReference { kind: &'static str, id: String },

    /// Below the clustering or quorum threshold. Not a failure, just
    /// "no fix available yet".
    #[error("insufficient data for a resolved fix")]
    InsufficientData,
}
