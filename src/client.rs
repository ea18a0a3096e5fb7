//! View state for a client of the votes API.
//!
//! The client keeps a local copy of the caller's votes. Every change goes through [`VotesView::reduce`]
//! as an [`Action`]: a mutation is first marked pending, and only once the server confirms it is
//! the change applied to the local copy. A failed mutation records an error and leaves the list as
//! it was.
use log::*;

use std::collections::HashMap;

use crate::models::{Vote, VoteChoice, VoteFields};

/**
 * A change to one existing vote, as requested by the client
 */
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Choice(VoteChoice),
    SetDone(bool),
    Delete,
    /** The retrieval URL the attachment will be served from */
    Attach(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    LoadStarted,
    Loaded(Vec<Vote>),
    LoadFailed(String),
    Created(Vote),
    MutationStarted { vote_id: String, mutation: Mutation },
    MutationSucceeded { vote_id: String },
    MutationFailed { vote_id: String, message: String },
    DismissError,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VotesView {
    pub votes: Vec<Vote>,
    pub loading: bool,
    /** At most one mutation in flight per vote */
    pub pending: HashMap<String, Mutation>,
    pub error: Option<String>,
}

impl VotesView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, vote_id: &str) -> Option<&Vote> {
        self.votes.iter().find(|v| v.vote_id == vote_id)
    }

    pub fn is_pending(&self, vote_id: &str) -> bool {
        self.pending.contains_key(vote_id)
    }

    pub fn reduce(mut self, action: Action) -> Self {
        match action {
            Action::LoadStarted => {
                self.loading = true;
            }
            Action::Loaded(votes) => {
                self.loading = false;
                self.votes = votes;
                self.pending.clear();
            }
            Action::LoadFailed(message) => {
                self.loading = false;
                self.error = Some(message);
            }
            Action::Created(vote) => {
                self.votes.push(vote);
            }
            Action::MutationStarted { vote_id, mutation } => {
                if self.find(&vote_id).is_none() {
                    warn!("Ignoring mutation for unknown vote {}", vote_id);
                } else if let Some(in_flight) = self.pending.get(&vote_id) {
                    warn!(
                        "Ignoring {:?} on vote {}, {:?} is still in flight",
                        mutation, vote_id, in_flight
                    );
                } else {
                    self.pending.insert(vote_id, mutation);
                }
            }
            Action::MutationSucceeded { vote_id } => {
                let fields = match self.pending.remove(&vote_id) {
                    Some(Mutation::Choice(choice)) => VoteFields::IncrementTally(choice),
                    Some(Mutation::SetDone(done)) => VoteFields::Done(done),
                    Some(Mutation::Attach(url)) => VoteFields::AttachmentUrl(url),
                    Some(Mutation::Delete) => {
                        self.votes.retain(|v| v.vote_id != vote_id);
                        return self;
                    }
                    None => {
                        debug!("No pending mutation for vote {}", vote_id);
                        return self;
                    }
                };
                if let Some(vote) = self.votes.iter_mut().find(|v| v.vote_id == vote_id) {
                    vote.apply(&fields);
                }
            }
            Action::MutationFailed { vote_id, message } => {
                self.pending.remove(&vote_id);
                self.error = Some(message);
            }
            Action::DismissError => {
                self.error = None;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InsertableVote;

    fn vote(owner: &str, name: &str) -> Vote {
        Vote::new(
            owner,
            InsertableVote {
                vote_name: name.to_string(),
                start_date: "2021-06-01".to_string(),
                end_date: "2021-06-30".to_string(),
                question: "Lunch?".to_string(),
            },
        )
    }

    fn loaded(votes: Vec<Vote>) -> VotesView {
        VotesView::new()
            .reduce(Action::LoadStarted)
            .reduce(Action::Loaded(votes))
    }

    fn start(vote_id: &str, mutation: Mutation) -> Action {
        Action::MutationStarted {
            vote_id: vote_id.to_string(),
            mutation,
        }
    }

    fn succeed(vote_id: &str) -> Action {
        Action::MutationSucceeded {
            vote_id: vote_id.to_string(),
        }
    }

    #[test]
    fn test_loading() {
        let view = VotesView::new().reduce(Action::LoadStarted);
        assert!(view.loading);

        let view = view.reduce(Action::Loaded(vec![vote("alice", "a")]));
        assert!(!view.loading);
        assert_eq!(view.votes.len(), 1);

        let view = view.reduce(Action::LoadFailed("offline".to_string()));
        assert_eq!(view.error.as_deref(), Some("offline"));
        assert_eq!(view.votes.len(), 1);
    }

    #[test]
    fn test_choice_applied_only_after_success() {
        let v = vote("alice", "a");
        let id = v.vote_id.clone();

        let view = loaded(vec![v]).reduce(start(&id, Mutation::Choice(VoteChoice::Yes)));
        assert!(view.is_pending(&id));
        assert_eq!(view.find(&id).unwrap().vote_yes_count, 0);

        let view = view.reduce(succeed(&id));
        assert!(!view.is_pending(&id));
        assert_eq!(view.find(&id).unwrap().vote_yes_count, 1);
        assert_eq!(view.find(&id).unwrap().vote_no_count, 0);
    }

    #[test]
    fn test_second_mutation_waits_for_the_first() {
        let v = vote("alice", "a");
        let id = v.vote_id.clone();

        let view = loaded(vec![v])
            .reduce(start(&id, Mutation::Choice(VoteChoice::Yes)))
            .reduce(start(&id, Mutation::SetDone(true)));
        assert_eq!(
            view.pending.get(&id),
            Some(&Mutation::Choice(VoteChoice::Yes))
        );

        let view = view.reduce(succeed(&id));
        let stored = view.find(&id).unwrap();
        assert_eq!(stored.vote_yes_count, 1);
        assert!(!stored.done);
        assert!(!view.is_pending(&id));

        let view = view
            .reduce(start(&id, Mutation::SetDone(true)))
            .reduce(succeed(&id));
        assert!(view.find(&id).unwrap().done);
        assert_eq!(view.find(&id).unwrap().vote_yes_count, 1);
    }

    #[test]
    fn test_failure_leaves_list_untouched() {
        let v = vote("alice", "a");
        let id = v.vote_id.clone();
        let before = loaded(vec![v]);

        let view = before
            .clone()
            .reduce(start(&id, Mutation::SetDone(true)))
            .reduce(Action::MutationFailed {
                vote_id: id.clone(),
                message: "Something went wrong".to_string(),
            });

        assert_eq!(view.votes, before.votes);
        assert!(!view.is_pending(&id));
        assert_eq!(view.error.as_deref(), Some("Something went wrong"));

        let view = view.reduce(Action::DismissError);
        assert_eq!(view.error, None);
    }

    #[test]
    fn test_delete_and_attach() {
        let keep = vote("alice", "keep");
        let drop = vote("alice", "drop");
        let (keep_id, drop_id) = (keep.vote_id.clone(), drop.vote_id.clone());

        let view = loaded(vec![keep, drop])
            .reduce(start(&drop_id, Mutation::Delete))
            .reduce(succeed(&drop_id))
            .reduce(start(
                &keep_id,
                Mutation::Attach("https://attachments.test/x".to_string()),
            ))
            .reduce(succeed(&keep_id));

        assert_eq!(view.votes.len(), 1);
        assert!(view.find(&drop_id).is_none());
        assert_eq!(
            view.find(&keep_id).unwrap().attachment_url.as_deref(),
            Some("https://attachments.test/x")
        );
    }

    #[test]
    fn test_unknown_vote_is_ignored() {
        let view = loaded(vec![vote("alice", "a")]).reduce(start("missing", Mutation::Delete));
        assert!(view.pending.is_empty());

        let view = view.reduce(succeed("missing"));
        assert_eq!(view.votes.len(), 1);
    }

    #[test]
    fn test_created_is_appended() {
        let view = loaded(vec![]).reduce(Action::Created(vote("alice", "new")));
        assert_eq!(view.votes.len(), 1);
        assert_eq!(view.votes[0].vote_name, "new");
    }
}
