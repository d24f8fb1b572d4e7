//! Error types for the annotation engine.

use thiserror::Error;

use crate::model::RoiId;

/// Failures talking to the remote analysis store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The store has nothing for this request (no analysis, no scale bar).
    #[error("Not found")]
    NotFound,

    /// Non-success HTTP status
    #[error("Server returned {code}: {message}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body or reason
        message: String,
    },

    /// Transport-level failure (connection refused, timeout, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the expected schema
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::InvalidResponse(e.to_string())
    }
}

/// Commands rejected because their preconditions do not hold.
///
/// These never reach the user as a notice; the command is simply a no-op.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image selected")]
    NoImageSelected,

    #[error("No drawing session active")]
    NotDrawing,

    #[error("A drawing session is already active")]
    SessionBusy,

    #[error("Session is waiting for the store to confirm")]
    Submitting,

    #[error("Polygon needs at least {required} points, has {actual}")]
    TooFewPoints { required: usize, actual: usize },

    #[error("Point index {index} out of range (len {len})")]
    PointIndex { index: usize, len: usize },

    #[error("Unknown ROI {0}")]
    UnknownRoi(RoiId),

    #[error("No scale bar defined")]
    NoScaleBar,

    #[error("Nothing to retry for ROI {0}")]
    NothingToRetry(RoiId),

    #[error("Request already in flight")]
    AlreadyInFlight,
}
