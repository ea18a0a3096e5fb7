//! Business rules for votes: who may touch a vote, and what each operation changes.
use log::*;

use std::sync::Arc;

use crate::dao::VoteStore;
use crate::error::VoteError;
use crate::models::{InsertableVote, Vote, VoteChoice, VoteFields};
use crate::storage::ObjectStore;

pub type VoteResult<T> = Result<T, VoteError>;

/**
 * The only user of the vote store and the attachment store.
 *
 * Every operation on an existing vote first reads it fresh from the store and checks that the
 * caller owns it, before anything is written.
 */
pub struct VoteService {
    store: Arc<dyn VoteStore>,
    objects: Arc<dyn ObjectStore>,
}

impl VoteService {
    pub fn new(store: Arc<dyn VoteStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self { store, objects }
    }

    pub async fn create(&self, owner: &str, details: InsertableVote) -> VoteResult<Vote> {
        let vote = Vote::new(owner, details);
        self.store.put(&vote).await?;
        info!("Created vote {} for {}", vote.vote_id, owner);
        Ok(vote)
    }

    pub async fn list(&self, owner: &str) -> VoteResult<Vec<Vote>> {
        Ok(self.store.query_by_owner(owner).await?)
    }

    pub async fn get(&self, owner: &str, vote_id: &str) -> VoteResult<Vote> {
        self.owned(owner, vote_id).await
    }

    /**
     * Count one ballot. The increment itself is a single atomic store update
     */
    pub async fn record_vote_choice(
        &self,
        owner: &str,
        vote_id: &str,
        choice: VoteChoice,
    ) -> VoteResult<Vote> {
        self.owned(owner, vote_id).await?;
        debug!("Recording {:?} on vote {}", choice, vote_id);
        self.update(owner, vote_id, VoteFields::IncrementTally(choice))
            .await
    }

    pub async fn set_done(&self, owner: &str, vote_id: &str, done: bool) -> VoteResult<Vote> {
        self.owned(owner, vote_id).await?;
        self.update(owner, vote_id, VoteFields::Done(done)).await
    }

    pub async fn delete(&self, owner: &str, vote_id: &str) -> VoteResult<()> {
        self.owned(owner, vote_id).await?;
        if !self.store.delete_by_key(vote_id, owner).await? {
            return Err(VoteError::NotFound(vote_id.to_string()));
        }
        info!("Deleted vote {}", vote_id);
        Ok(())
    }

    /**
     * Point the vote's attachment at the object stored under `attachment_id`, replacing any
     * earlier attachment
     */
    pub async fn attach_upload(
        &self,
        owner: &str,
        vote_id: &str,
        attachment_id: &str,
    ) -> VoteResult<Vote> {
        let url = self.objects.retrieval_url(attachment_id);
        self.owned(owner, vote_id).await?;
        info!("Updating vote {} with attachment URL {}", vote_id, url);
        self.update(owner, vote_id, VoteFields::AttachmentUrl(url))
            .await
    }

    /**
     * Pre-signed upload location for `attachment_id`.
     *
     * There is no ownership check here, attachment ids are random and only handed out to the
     * vote's owner.
     */
    pub fn issue_upload_target(&self, attachment_id: &str) -> String {
        self.objects.upload_url(attachment_id)
    }

    async fn owned(&self, owner: &str, vote_id: &str) -> VoteResult<Vote> {
        let vote = self.store.get(vote_id).await?.ok_or_else(|| {
            warn!("Vote {} not found", vote_id);
            VoteError::NotFound(vote_id.to_string())
        })?;

        if !vote.is_owned_by(owner) {
            warn!(
                "User {} does not have permission to modify vote {}",
                owner, vote_id
            );
            return Err(VoteError::Forbidden {
                user_id: owner.to_string(),
                vote_id: vote_id.to_string(),
            });
        }
        Ok(vote)
    }

    async fn update(&self, owner: &str, vote_id: &str, fields: VoteFields) -> VoteResult<Vote> {
        self.store
            .update_fields(vote_id, owner, &fields)
            .await?
            .ok_or_else(|| VoteError::NotFound(vote_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::MemoryVoteStore;
    use crate::storage::StaticObjectStore;

    use std::collections::HashSet;

    fn service() -> (VoteService, Arc<MemoryVoteStore>) {
        let store = Arc::new(MemoryVoteStore::new());
        let service = VoteService::new(store.clone(), Arc::new(StaticObjectStore));
        (service, store)
    }

    fn details(name: &str) -> InsertableVote {
        InsertableVote {
            vote_name: name.to_string(),
            start_date: "2021-06-01".to_string(),
            end_date: "2021-06-30".to_string(),
            question: "Should we?".to_string(),
        }
    }

    #[async_std::test]
    async fn test_create_starts_at_zero_with_fresh_ids() {
        let (service, store) = service();
        let mut ids = HashSet::new();

        for i in 0..20 {
            let vote = service
                .create("alice", details(&format!("vote {}", i)))
                .await
                .unwrap();
            assert_eq!(vote.vote_yes_count, 0);
            assert_eq!(vote.vote_no_count, 0);
            assert!(!vote.done);
            assert!(ids.insert(vote.vote_id.clone()));
            assert_eq!(store.get(&vote.vote_id).await.unwrap(), Some(vote));
        }
    }

    #[async_std::test]
    async fn test_list_is_owner_scoped() {
        let (service, _) = service();
        service.create("alice", details("a")).await.unwrap();
        service.create("bob", details("b")).await.unwrap();

        let votes = service.list("alice").await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote_name, "a");
    }

    #[async_std::test]
    async fn test_choices_increment_one_counter() {
        let (service, _) = service();
        let vote = service.create("alice", details("x")).await.unwrap();

        let after_yes = service
            .record_vote_choice("alice", &vote.vote_id, VoteChoice::Yes)
            .await
            .unwrap();
        assert_eq!((after_yes.vote_yes_count, after_yes.vote_no_count), (1, 0));

        let after_no = service
            .record_vote_choice("alice", &vote.vote_id, VoteChoice::from_vote_type("maybe"))
            .await
            .unwrap();
        assert_eq!((after_no.vote_yes_count, after_no.vote_no_count), (1, 1));
    }

    #[async_std::test]
    async fn test_missing_vote_is_not_found_for_anyone() {
        let (service, _) = service();
        service.create("alice", details("x")).await.unwrap();

        for owner in &["alice", "bob"] {
            assert!(matches!(
                service.record_vote_choice(owner, "missing", VoteChoice::Yes).await,
                Err(VoteError::NotFound(_))
            ));
            assert!(matches!(
                service.set_done(owner, "missing", true).await,
                Err(VoteError::NotFound(_))
            ));
            assert!(matches!(
                service.delete(owner, "missing").await,
                Err(VoteError::NotFound(_))
            ));
            assert!(matches!(
                service.attach_upload(owner, "missing", "att").await,
                Err(VoteError::NotFound(_))
            ));
        }
    }

    #[async_std::test]
    async fn test_other_owner_is_forbidden_and_nothing_changes() {
        let (service, store) = service();
        let vote = service.create("alice", details("x")).await.unwrap();
        let id = vote.vote_id.as_str();

        assert!(matches!(
            service.record_vote_choice("mallory", id, VoteChoice::Yes).await,
            Err(VoteError::Forbidden { .. })
        ));
        assert!(matches!(
            service.set_done("mallory", id, true).await,
            Err(VoteError::Forbidden { .. })
        ));
        assert!(matches!(
            service.attach_upload("mallory", id, "att").await,
            Err(VoteError::Forbidden { .. })
        ));
        assert!(matches!(
            service.delete("mallory", id).await,
            Err(VoteError::Forbidden { .. })
        ));
        assert!(matches!(
            service.get("mallory", id).await,
            Err(VoteError::Forbidden { .. })
        ));

        assert_eq!(store.get(id).await.unwrap(), Some(vote));
    }

    #[async_std::test]
    async fn test_latest_attachment_wins() {
        let (service, _) = service();
        let vote = service.create("alice", details("x")).await.unwrap();

        service
            .attach_upload("alice", &vote.vote_id, "first")
            .await
            .unwrap();
        let updated = service
            .attach_upload("alice", &vote.vote_id, "second")
            .await
            .unwrap();

        assert_eq!(
            updated.attachment_url.as_deref(),
            Some("https://attachments.test/second")
        );
        assert_eq!(
            service.get("alice", &vote.vote_id).await.unwrap().attachment_url,
            updated.attachment_url
        );
    }

    #[async_std::test]
    async fn test_upload_target_is_a_pass_through() {
        let (service, _) = service();
        assert_eq!(
            service.issue_upload_target("abc"),
            "https://uploads.test/abc?signed"
        );
    }

    #[async_std::test]
    async fn test_full_lifecycle() {
        let (service, store) = service();
        let vote = service.create("U", details("V")).await.unwrap();
        let id = vote.vote_id.clone();

        service
            .record_vote_choice("U", &id, VoteChoice::Yes)
            .await
            .unwrap();
        service
            .record_vote_choice("U", &id, VoteChoice::Yes)
            .await
            .unwrap();
        let tallied = service
            .record_vote_choice("U", &id, VoteChoice::No)
            .await
            .unwrap();
        assert_eq!(tallied.vote_yes_count, 2);
        assert_eq!(tallied.vote_no_count, 1);

        let done = service.set_done("U", &id, true).await.unwrap();
        assert!(done.done);
        assert_eq!(done.vote_yes_count, 2);

        service.delete("U", &id).await.unwrap();
        assert_eq!(store.get_by_key(&id, "U").await.unwrap(), None);
        assert!(matches!(
            service.get("U", &id).await,
            Err(VoteError::NotFound(_))
        ));
    }
}
