//! Failures reported by the remote collaborators (bookmark store, data source, location).
//!
//! None of these are fatal: bookmark resolve fails open to "not bookmarked",
//! toggles roll back, and a missing location degrades distance sorting.

/// Error from a remote collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The collaborator answered but reported `success: false`.
    #[error("rejected: {0}")]
    Rejected(String),
    /// The call itself failed (connection, timeout, panicked task).
    #[error("transport: {0}")]
    Transport(String),
    /// The response could not be parsed.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The requested data cannot be produced (e.g. no location permission).
    #[error("unavailable: {0}")]
    Unavailable(String),
}
