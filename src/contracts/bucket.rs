use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use reelvote_core::{
    tally::VoteSource,
    tx::VoteTransaction,
    vote::{validate_movie_id, AddressMatch, Vote},
    ReelError,
};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use super::VoteSink;

/// Vote bucket on the local filesystem.
///
/// Layout: `<root>/<movie_id>/<key>.json`, one [`Vote`] per object. The key
/// is the hex SHA-256 of the object bytes and a sequence number, and the
/// first free sequence wins, so an identical repeat vote lands in a second
/// object rather than replacing the first.
#[derive(Clone, Debug)]
pub struct BucketStore {
    root: PathBuf,
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

impl BucketStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store `vote` as a new object and return its key.
    pub async fn put(&self, vote: &Vote) -> Result<String, ReelError> {
        let movie_id = validate_movie_id(&vote.movie_id)?;
        let bytes = serde_json::to_vec(vote).map_err(|e| ReelError::SourceUnavailable(e.to_string()))?;
        let dir = self.root.join(movie_id);
        fs::create_dir_all(&dir).await.map_err(unavailable)?;

        // write under a temporary name so readers never list half an object
        let tmp = dir.join(format!(
            ".{}-{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, &bytes).await.map_err(unavailable)?;

        let mut seq = 0u64;
        let stored = loop {
            let key = object_key(&bytes, seq);
            // a link never replaces an existing object
            match fs::hard_link(&tmp, dir.join(format!("{key}.json"))).await {
                Ok(()) => break Ok(key),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => seq += 1,
                Err(e) => break Err(unavailable(e)),
            }
        };
        if let Err(e) = fs::remove_file(&tmp).await {
            warn!("could not remove {}: {e}", tmp.display());
        }
        if let Ok(key) = &stored {
            debug!("bucket object {key} stored for movie {movie_id} (sequence {seq})");
        }
        stored
    }

    /// Every readable object under the movie prefix, in key order.
    pub async fn list(&self, movie_id: &str) -> Result<Vec<Vote>, ReelError> {
        let movie_id = validate_movie_id(movie_id)?;
        let dir = self.root.join(movie_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut votes = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = fs::read(&path).await.map_err(unavailable)?;
            match serde_json::from_slice::<Vote>(&bytes) {
                Ok(vote) => votes.push(vote),
                Err(e) => warn!("skipping malformed bucket object {}: {e}", path.display()),
            }
        }
        Ok(votes)
    }
}

fn object_key(bytes: &[u8], seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(seq.to_le_bytes());
    hex::encode(hasher.finalize())
}

fn unavailable(err: std::io::Error) -> ReelError {
    ReelError::SourceUnavailable(err.to_string())
}

#[async_trait]
impl VoteSource for BucketStore {
    async fn fetch_votes(&self, movie_id: &str) -> Result<Vec<Vote>, ReelError> {
        self.list(movie_id).await
    }

    fn address_match(&self) -> AddressMatch {
        AddressMatch::IgnoreAsciiCase
    }
}

#[async_trait]
impl VoteSink for BucketStore {
    async fn submit(&self, tx: &VoteTransaction, vote: &Vote) -> Result<String, ReelError> {
        let (movie, vote_type) = tx.decode_vote()?;
        if movie.to_string() != vote.movie_id || vote_type != vote.vote_type {
            return Err(ReelError::UnsupportedCall(format!(
                "call for movie {movie} does not match vote record for movie {}",
                vote.movie_id
            )));
        }
        self.put(vote).await
    }
}
