/**
 * One row per vote, keyed by `(vote_id, user_id)`
 */
pub const CREATE_VOTES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS votes (
    vote_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    vote_name TEXT NOT NULL,
    question TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    vote_yes_count INT4 NOT NULL DEFAULT 0 CHECK (vote_yes_count >= 0),
    vote_no_count INT4 NOT NULL DEFAULT 0 CHECK (vote_no_count >= 0),
    done BOOLEAN NOT NULL DEFAULT FALSE,
    attachment_url TEXT,
    PRIMARY KEY (vote_id, user_id)
)
"#;

/**
 * Secondary index used to list a user's votes
 */
pub const CREATE_VOTES_USER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS votes_user_id_idx ON votes (user_id)";

pub const STATEMENTS: &[&str] = &[CREATE_VOTES_TABLE, CREATE_VOTES_USER_INDEX];
