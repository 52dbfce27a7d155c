use serde::{Deserialize, Serialize};

use crate::error::ReelError;

pub type MovieId = String;
pub type Address = String;

/// Single recorded vote, as stored by a bucket or read back from the chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub movie_id: MovieId,
    pub address: Address,
    pub vote_type: bool,
    pub timestamp: String,
}

/// Aggregate of all votes for one movie. Recomputed on every read.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VoteSummary {
    pub yes: u64,
    pub no: u64,
    pub voters: Vec<Address>,
}

impl VoteSummary {
    /// Reduce `records` into a summary for `movie_id`. Records for other
    /// movies are ignored; repeated voters are kept.
    pub fn from_records<'a>(
        movie_id: &str,
        records: impl IntoIterator<Item = &'a Vote>,
    ) -> Self {
        let mut summary = VoteSummary::default();
        for vote in records.into_iter().filter(|v| v.movie_id == movie_id) {
            if vote.vote_type {
                summary.yes += 1;
            } else {
                summary.no += 1;
            }
            summary.voters.push(vote.address.clone());
        }
        summary
    }

    pub fn total(&self) -> u64 {
        self.yes + self.no
    }

    pub fn contains_voter(&self, address: &str, rule: AddressMatch) -> bool {
        self.voters.iter().any(|voter| rule.matches(voter, address))
    }
}

/// How a source compares wallet addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AddressMatch {
    /// Byte-for-byte, case-sensitive.
    #[default]
    Exact,
    /// ASCII case-insensitive (mixed-case checksummed hex addresses).
    IgnoreAsciiCase,
}

impl AddressMatch {
    pub fn matches(self, a: &str, b: &str) -> bool {
        match self {
            AddressMatch::Exact => a == b,
            AddressMatch::IgnoreAsciiCase => a.eq_ignore_ascii_case(b),
        }
    }
}

const MAX_MOVIE_ID_LEN: usize = 128;

/// Movie ids double as bucket prefixes, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_movie_id(movie_id: &str) -> Result<&str, ReelError> {
    let valid = !movie_id.is_empty()
        && movie_id.len() <= MAX_MOVIE_ID_LEN
        && movie_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if valid {
        Ok(movie_id)
    } else {
        Err(ReelError::InvalidMovieId(movie_id.to_string()))
    }
}

pub fn validate_address(address: &str) -> Result<&str, ReelError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ReelError::EmptyAddress);
    }
    Ok(trimmed)
}
