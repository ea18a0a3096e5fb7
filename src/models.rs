use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/**
 * Generate a new UUID to be used as an opaque identifier for votes and attachments
 */
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/**
 * A single yes/no poll, owned by the user who created it.
 *
 * The record is keyed by `(vote_id, user_id)` and the owner never changes once the vote has
 * been persisted.
 */
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub vote_id: String,
    pub user_id: String,
    pub vote_name: String,
    pub question: String,
    pub start_date: String,
    pub end_date: String,
    pub created_at: DateTime<Utc>,
    pub vote_yes_count: i32,
    pub vote_no_count: i32,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
}

impl Vote {
    /**
     * Build a fresh vote for `user_id` with zeroed tallies
     */
    pub fn new(user_id: &str, details: InsertableVote) -> Self {
        Self {
            vote_id: generate_uuid(),
            user_id: user_id.to_string(),
            vote_name: details.vote_name,
            question: details.question,
            start_date: details.start_date,
            end_date: details.end_date,
            created_at: Utc::now(),
            vote_yes_count: 0,
            vote_no_count: 0,
            done: false,
            attachment_url: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /**
     * Apply a partial update in place, touching only the named fields
     */
    pub fn apply(&mut self, fields: &VoteFields) {
        match fields {
            VoteFields::IncrementTally(VoteChoice::Yes) => {
                self.vote_yes_count = self.vote_yes_count.saturating_add(1)
            }
            VoteFields::IncrementTally(VoteChoice::No) => {
                self.vote_no_count = self.vote_no_count.saturating_add(1)
            }
            VoteFields::Done(done) => self.done = *done,
            VoteFields::AttachmentUrl(url) => self.attachment_url = Some(url.clone()),
        }
    }
}

/**
 * User-provided details to create a Vote
 */
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertableVote {
    pub vote_name: String,
    pub start_date: String,
    pub end_date: String,
    pub question: String,
}

/**
 * Which counter a ballot increments
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteChoice {
    Yes,
    No,
}

impl VoteChoice {
    /**
     * Only the literal string "yes" counts as a yes, every other value is a no
     */
    pub fn from_vote_type(vote_type: &str) -> Self {
        if vote_type == "yes" {
            VoteChoice::Yes
        } else {
            VoteChoice::No
        }
    }
}

/**
 * The set of fields a partial update is allowed to touch
 */
#[derive(Clone, Debug, PartialEq)]
pub enum VoteFields {
    IncrementTally(VoteChoice),
    Done(bool),
    AttachmentUrl(String),
}
