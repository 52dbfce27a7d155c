use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::ReelError,
    vote::{validate_address, validate_movie_id, AddressMatch, Vote, VoteSummary},
};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Backing store the tally reads vote records from.
#[async_trait]
pub trait VoteSource: Send + Sync {
    /// Return every record visible for `movie_id`. Sources may return records
    /// of other movies too; the tally filters them out. An unknown movie is an
    /// empty list, not an error.
    async fn fetch_votes(&self, movie_id: &str) -> Result<Vec<Vote>, ReelError>;

    fn address_match(&self) -> AddressMatch {
        AddressMatch::Exact
    }
}

/// Vote tally collector.
#[derive(Clone)]
pub struct VoteTally {
    source: Arc<dyn VoteSource>,
    timeout: Duration,
}

impl VoteTally {
    pub fn new(source: Arc<dyn VoteSource>) -> Self {
        Self {
            source,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch and reduce the votes for `movie_id`. A fetch that outlives the
    /// timeout is dropped and reported as [`ReelError::SourceTimeout`].
    pub async fn get_votes(&self, movie_id: &str) -> Result<VoteSummary, ReelError> {
        let movie_id = validate_movie_id(movie_id)?;
        let records = match tokio::time::timeout(self.timeout, self.source.fetch_votes(movie_id)).await {
            Ok(Ok(records)) => records,
            Ok(Err(err)) => {
                warn!("vote source failed for movie {movie_id}: {err}");
                return Err(err);
            }
            Err(_) => {
                warn!("vote source timed out for movie {movie_id} after {:?}", self.timeout);
                return Err(ReelError::SourceTimeout(self.timeout));
            }
        };
        let summary = VoteSummary::from_records(movie_id, &records);
        debug!(
            "movie {movie_id}: yes={} no={} from {} records",
            summary.yes,
            summary.no,
            records.len()
        );
        Ok(summary)
    }

    pub async fn has_user_voted(&self, movie_id: &str, address: &str) -> Result<bool, ReelError> {
        let address = validate_address(address)?;
        let summary = self.get_votes(movie_id).await?;
        Ok(summary.contains_voter(address, self.source.address_match()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    struct StaticSource {
        records: Vec<Vote>,
        rule: AddressMatch,
    }

    #[async_trait]
    impl VoteSource for StaticSource {
        async fn fetch_votes(&self, _movie_id: &str) -> Result<Vec<Vote>, ReelError> {
            Ok(self.records.clone())
        }

        fn address_match(&self) -> AddressMatch {
            self.rule
        }
    }

    struct DownSource;

    #[async_trait]
    impl VoteSource for DownSource {
        async fn fetch_votes(&self, _movie_id: &str) -> Result<Vec<Vote>, ReelError> {
            Err(ReelError::SourceUnavailable("connection refused".into()))
        }
    }

    struct StalledSource;

    #[async_trait]
    impl VoteSource for StalledSource {
        async fn fetch_votes(&self, _movie_id: &str) -> Result<Vec<Vote>, ReelError> {
            std::future::pending().await
        }
    }

    fn vote(movie: &str, address: &str, vote_type: bool) -> Vote {
        Vote {
            movie_id: movie.into(),
            address: address.into(),
            vote_type,
            timestamp: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn tally(records: Vec<Vote>) -> VoteTally {
        VoteTally::new(Arc::new(StaticSource {
            records,
            rule: AddressMatch::Exact,
        }))
    }

    #[tokio::test]
    async fn movie_without_votes_is_zero() {
        let summary = tally(vec![]).get_votes("7").await.unwrap();
        assert_eq!(summary, VoteSummary::default());
    }

    #[tokio::test]
    async fn counts_match_record_totals_for_random_sets() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..50 {
            let len = rng.gen_range(0..64);
            let records: Vec<Vote> = (0..len)
                .map(|_| {
                    let movie = rng.gen_range(1..4).to_string();
                    let voter = format!("0x{:02x}", rng.gen_range(0..8u8));
                    vote(&movie, &voter, rng.gen())
                })
                .collect();
            let expected = records.iter().filter(|v| v.movie_id == "1").count() as u64;
            let summary = tally(records).get_votes("1").await.unwrap();
            assert_eq!(summary.yes + summary.no, expected);
            assert_eq!(summary.voters.len() as u64, summary.total());
        }
    }

    #[tokio::test]
    async fn has_user_voted_follows_voters_list() {
        let t = tally(vec![vote("1", "0xABC", true), vote("2", "0xDEF", false)]);
        assert!(t.has_user_voted("1", "0xABC").await.unwrap());
        assert!(!t.has_user_voted("1", "0xabc").await.unwrap());
        assert!(!t.has_user_voted("1", "0xDEF").await.unwrap());
    }

    #[tokio::test]
    async fn case_insensitive_sources_match_any_case() {
        let t = VoteTally::new(Arc::new(StaticSource {
            records: vec![vote("1", "0xABC", true)],
            rule: AddressMatch::IgnoreAsciiCase,
        }));
        assert!(t.has_user_voted("1", "0xabc").await.unwrap());
    }

    #[tokio::test]
    async fn validation_happens_before_fetch() {
        let t = VoteTally::new(Arc::new(DownSource));
        assert!(t.get_votes("").await.unwrap_err().is_validation());
        assert_eq!(
            t.has_user_voted("1", "").await.unwrap_err(),
            ReelError::EmptyAddress
        );
    }

    #[tokio::test]
    async fn source_failure_is_not_masked() {
        let err = VoteTally::new(Arc::new(DownSource)).get_votes("1").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn stalled_source_times_out() {
        let timeout = Duration::from_millis(20);
        let t = VoteTally::new(Arc::new(StalledSource)).with_timeout(timeout);
        assert_eq!(
            t.get_votes("1").await.unwrap_err(),
            ReelError::SourceTimeout(timeout)
        );
    }
}
