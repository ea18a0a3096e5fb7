use serde::{Deserialize, Serialize};

use crate::models::Vote;

/**
 * Envelope for a single vote
 */
#[derive(Debug, Deserialize, Serialize)]
pub struct VoteItem {
    pub item: Vote,
}

/**
 * Envelope for the caller's votes
 */
#[derive(Debug, Deserialize, Serialize)]
pub struct VoteItems {
    pub items: Vec<Vote>,
}

/**
 * User-provided ballot for a vote
 */
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVoteType {
    /**
     * "yes" counts as a yes, anything else as a no
     */
    pub vote_type: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateVoteDone {
    pub done: bool,
}

/**
 * Pre-signed location the client should PUT the attachment to
 */
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrl {
    pub upload_url: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
