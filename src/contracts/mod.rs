//! Backing collaborators for the vote tally: where vote records are read from
//! and where prepared vote calls are submitted.
//!
//! Two interchangeable backends are provided:
//!
//! * [`bucket::BucketStore`] keeps every vote as a content-addressed JSON
//!   object on disk.
//! * [`LocalChain`] is an in-process stand-in for the vote contract that
//!   accepts `vote(uint256, bool)` calls and serves reads back.

pub mod bucket;

use async_trait::async_trait;
use parking_lot::Mutex;
use reelvote_core::{
    tally::VoteSource,
    tx::VoteTransaction,
    vote::{AddressMatch, Vote},
    ReelError,
};
use sha2::{Digest, Sha256};
use tracing::info;

/// Accepts a prepared vote call on behalf of `vote.address` and returns the
/// hex hash identifying the submission.
#[async_trait]
pub trait VoteSink: Send + Sync {
    async fn submit(&self, tx: &VoteTransaction, vote: &Vote) -> Result<String, ReelError>;
}

#[derive(Default)]
struct ChainState {
    votes: Vec<Vote>,
    nonce: u64,
}

/// In-process vote contract. Addresses are compared byte for byte.
#[derive(Default)]
pub struct LocalChain {
    state: Mutex<ChainState>,
}

impl LocalChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a vote log saved with [`LocalChain::votes`].
    pub fn from_votes(votes: Vec<Vote>) -> Self {
        let nonce = votes.len() as u64;
        Self {
            state: Mutex::new(ChainState { votes, nonce }),
        }
    }

    /// Execute a vote call sent by `sender`.
    pub fn execute(
        &self,
        tx: &VoteTransaction,
        sender: &str,
        timestamp: &str,
    ) -> Result<String, ReelError> {
        let (movie, vote_type) = tx.decode_vote()?;
        let mut state = self.state.lock();
        state.nonce += 1;
        let mut hasher = Sha256::new();
        hasher.update(tx.digest());
        hasher.update(sender.as_bytes());
        hasher.update(state.nonce.to_le_bytes());
        let hash = hex::encode(hasher.finalize());
        state.votes.push(Vote {
            movie_id: movie.to_string(),
            address: sender.to_string(),
            vote_type,
            timestamp: timestamp.to_string(),
        });
        info!("chain: vote on movie {movie} by {sender} ({hash})");
        Ok(hash)
    }

    /// Every accepted vote, in submission order.
    pub fn votes(&self) -> Vec<Vote> {
        self.state.lock().votes.clone()
    }
}

#[async_trait]
impl VoteSource for LocalChain {
    async fn fetch_votes(&self, movie_id: &str) -> Result<Vec<Vote>, ReelError> {
        let state = self.state.lock();
        Ok(state
            .votes
            .iter()
            .filter(|vote| vote.movie_id == movie_id)
            .cloned()
            .collect())
    }

    fn address_match(&self) -> AddressMatch {
        AddressMatch::Exact
    }
}

#[async_trait]
impl VoteSink for LocalChain {
    async fn submit(&self, tx: &VoteTransaction, vote: &Vote) -> Result<String, ReelError> {
        self.execute(tx, &vote.address, &vote.timestamp)
    }
}
