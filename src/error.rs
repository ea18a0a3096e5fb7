use thiserror::Error;
use tide::StatusCode;

/**
 * Every way a request against the vote API can fail.
 *
 * None of these are retried, they terminate the request. Handlers propagate them with `?` and
 * the error rendering middleware in `routes` turns them into a status and JSON body.
 */
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Vote {0} not found")]
    NotFound(String),

    #[error("User {user_id} does not have permission to modify vote {vote_id}")]
    Forbidden { user_id: String, vote_id: String },

    #[error("Storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

impl VoteError {
    pub fn status(&self) -> StatusCode {
        match self {
            VoteError::Validation(_) => StatusCode::BadRequest,
            VoteError::Unauthorized(_) => StatusCode::Unauthorized,
            VoteError::NotFound(_) => StatusCode::NotFound,
            VoteError::Forbidden { .. } => StatusCode::Forbidden,
            VoteError::Storage(_) => StatusCode::InternalServerError,
        }
    }

    /**
     * Stable name of the error kind, used in the JSON error body
     */
    pub fn kind(&self) -> &'static str {
        match self {
            VoteError::Validation(_) => "ValidationError",
            VoteError::Unauthorized(_) => "AuthError",
            VoteError::NotFound(_) => "NotFound",
            VoteError::Forbidden { .. } => "Forbidden",
            VoteError::Storage(_) => "StorageFailure",
        }
    }

    /**
     * Message safe to hand back to the client; backend faults are not echoed
     */
    pub fn public_message(&self) -> String {
        match self {
            VoteError::Storage(_) => "Storage operation failed".to_string(),
            other => other.to_string(),
        }
    }
}
