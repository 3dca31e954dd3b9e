use docshare_async_utils::CancelErr;
use thiserror::Error;

use crate::classify::ApiError;

pub type Result<T> = std::result::Result<T, SyncError>;

/// The request never produced an HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// No credential could be attached to the request.
    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// Local dispatch failure. Never retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Terminal remote failure.
    #[error(transparent)]
    Api(ApiError),

    /// A listed permission matched but carried no ID.
    #[error("no permission ID for {email}")]
    MissingPermissionId { email: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{reason} after {attempts} attempt(s)")]
    Cancelled { reason: CancelErr, attempts: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The worker running this document's task did not finish normally.
    #[error("task aborted: {0}")]
    TaskAborted(String),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}
