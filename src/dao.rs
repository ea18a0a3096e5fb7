//! The dao module holds the key-value style access to the `votes` table.
//!
//! Every operation addresses a single vote by its key, apart from listing which goes through the
//! secondary index on `user_id`.
use async_std::sync::RwLock;
use async_trait::async_trait;
use log::*;
use sqlx::postgres::{PgPool, PgPoolOptions};

use std::collections::HashMap;

use crate::models::{Vote, VoteChoice, VoteFields};

pub type StoreResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn put(&self, vote: &Vote) -> StoreResult<()>;

    async fn query_by_owner(&self, user_id: &str) -> StoreResult<Vec<Vote>>;

    /**
     * Look a vote up by its identifier alone, regardless of owner
     */
    async fn get(&self, vote_id: &str) -> StoreResult<Option<Vote>>;

    async fn get_by_key(&self, vote_id: &str, user_id: &str) -> StoreResult<Option<Vote>>;

    /**
     * Update only the fields named in `fields`, returning the record as it is after the write.
     *
     * `None` means no record matched the key.
     */
    async fn update_fields(
        &self,
        vote_id: &str,
        user_id: &str,
        fields: &VoteFields,
    ) -> StoreResult<Option<Vote>>;

    /**
     * Returns false when nothing was deleted
     */
    async fn delete_by_key(&self, vote_id: &str, user_id: &str) -> StoreResult<bool>;
}

/**
 * PostgreSQL backed store
 */
#[derive(Clone, Debug)]
pub struct PgVoteStore {
    pool: PgPool,
}

impl PgVoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /**
     * Create the connection pool and make sure the table and its index exist
     */
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        for statement in crate::schema::STATEMENTS {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("Votes table ready");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn put(&self, vote: &Vote) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO votes (vote_id, user_id, vote_name, question, start_date, end_date, \
             created_at, vote_yes_count, vote_no_count, done, attachment_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&vote.vote_id)
        .bind(&vote.user_id)
        .bind(&vote.vote_name)
        .bind(&vote.question)
        .bind(&vote.start_date)
        .bind(&vote.end_date)
        .bind(vote.created_at)
        .bind(vote.vote_yes_count)
        .bind(vote.vote_no_count)
        .bind(vote.done)
        .bind(&vote.attachment_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_by_owner(&self, user_id: &str) -> StoreResult<Vec<Vote>> {
        sqlx::query_as::<_, Vote>("SELECT * FROM votes WHERE user_id = $1 ORDER BY created_at ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn get(&self, vote_id: &str) -> StoreResult<Option<Vote>> {
        sqlx::query_as::<_, Vote>("SELECT * FROM votes WHERE vote_id = $1 LIMIT 1")
            .bind(vote_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_by_key(&self, vote_id: &str, user_id: &str) -> StoreResult<Option<Vote>> {
        sqlx::query_as::<_, Vote>("SELECT * FROM votes WHERE vote_id = $1 AND user_id = $2")
            .bind(vote_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn update_fields(
        &self,
        vote_id: &str,
        user_id: &str,
        fields: &VoteFields,
    ) -> StoreResult<Option<Vote>> {
        debug!("Updating {:?} on vote {}", fields, vote_id);

        /*
         * Tally increments happen inside the UPDATE so concurrent ballots can't overwrite each
         * other with a stale read
         */
        let query = match fields {
            VoteFields::IncrementTally(VoteChoice::Yes) => sqlx::query_as::<_, Vote>(
                "UPDATE votes SET vote_yes_count = vote_yes_count + 1 \
                 WHERE vote_id = $1 AND user_id = $2 RETURNING *",
            ),
            VoteFields::IncrementTally(VoteChoice::No) => sqlx::query_as::<_, Vote>(
                "UPDATE votes SET vote_no_count = vote_no_count + 1 \
                 WHERE vote_id = $1 AND user_id = $2 RETURNING *",
            ),
            VoteFields::Done(_) => sqlx::query_as::<_, Vote>(
                "UPDATE votes SET done = $3 WHERE vote_id = $1 AND user_id = $2 RETURNING *",
            ),
            VoteFields::AttachmentUrl(_) => sqlx::query_as::<_, Vote>(
                "UPDATE votes SET attachment_url = $3 \
                 WHERE vote_id = $1 AND user_id = $2 RETURNING *",
            ),
        };

        let query = query.bind(vote_id).bind(user_id);
        let query = match fields {
            VoteFields::Done(done) => query.bind(*done),
            VoteFields::AttachmentUrl(url) => query.bind(url.clone()),
            VoteFields::IncrementTally(_) => query,
        };

        query.fetch_optional(&self.pool).await
    }

    async fn delete_by_key(&self, vote_id: &str, user_id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM votes WHERE vote_id = $1 AND user_id = $2")
            .bind(vote_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/**
 * Process-local store, used when no database is configured
 *
 * Each write happens under the map's write lock, which makes the read-modify-write of a tally
 * increment atomic.
 */
pub struct MemoryVoteStore {
    votes: RwLock<HashMap<String, Vote>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self {
            votes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryVoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn put(&self, vote: &Vote) -> StoreResult<()> {
        self.votes
            .write()
            .await
            .insert(vote.vote_id.clone(), vote.clone());
        Ok(())
    }

    async fn query_by_owner(&self, user_id: &str) -> StoreResult<Vec<Vote>> {
        let mut votes: Vec<Vote> = self
            .votes
            .read()
            .await
            .values()
            .filter(|vote| vote.is_owned_by(user_id))
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(votes)
    }

    async fn get(&self, vote_id: &str) -> StoreResult<Option<Vote>> {
        Ok(self.votes.read().await.get(vote_id).cloned())
    }

    async fn get_by_key(&self, vote_id: &str, user_id: &str) -> StoreResult<Option<Vote>> {
        Ok(self
            .votes
            .read()
            .await
            .get(vote_id)
            .filter(|vote| vote.is_owned_by(user_id))
            .cloned())
    }

    async fn update_fields(
        &self,
        vote_id: &str,
        user_id: &str,
        fields: &VoteFields,
    ) -> StoreResult<Option<Vote>> {
        let mut votes = self.votes.write().await;
        match votes.get_mut(vote_id) {
            Some(vote) if vote.is_owned_by(user_id) => {
                vote.apply(fields);
                Ok(Some(vote.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_by_key(&self, vote_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut votes = self.votes.write().await;
        let owned = votes
            .get(vote_id)
            .map(|vote| vote.is_owned_by(user_id))
            .unwrap_or(false);
        if owned {
            votes.remove(vote_id);
        }
        Ok(owned)
    }
}
