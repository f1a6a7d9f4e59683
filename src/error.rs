//! Error types for the reconciliation core.
//!
//! Two families matter at runtime: transport failures, which are recovered
//! locally by rolling the model back, and programming errors (an edit key
//! with no entry in the field mapping), which are surfaced loudly and never
//! swallowed.

use thiserror::Error;

/// Errors produced by the reconciliation engine and its remote transport.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure talking to the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status.
    #[error("endpoint '{endpoint}' returned status {status}")]
    EndpointStatus { endpoint: String, status: u16 },

    /// The backend answered 200 but flagged the operation as failed.
    #[error("backend rejected request: {0}")]
    RemoteRejected(String),

    /// A fetched record could not be split into the editing model.
    #[error("malformed agent record: {0}")]
    MalformedRecord(String),

    /// An edit key with no entry in the field-to-namespace mapping.
    ///
    /// This is a programming error: the closed key set is missing an entry,
    /// not a runtime data problem.
    #[error("unknown field key '{0}': no namespace mapping exists for it")]
    UnknownField(String),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}
