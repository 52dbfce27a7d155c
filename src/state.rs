use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use parking_lot::Mutex;
use reelvote_core::{
    clock::{Clock, UtcClock},
    points::PointEventKind,
    quota::{DailyQuota, QuotaWindow},
    store::{KeyValueStore, MemoryStore},
    streak::{StreakTracker, UserStreak},
    tally::{VoteSource, VoteTally},
    tx::{prepare_vote_transaction, VoteTransaction},
    vote::{validate_address, Vote},
    ReelError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, SourceKind},
    contracts::{bucket::BucketStore, LocalChain, VoteSink},
    ledger::{receipt_for, LedgerError, LedgerSnapshot, PointsLedger, Profile},
};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("state file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Core(#[from] ReelError),
}

/// On-disk form of everything the service keeps between runs.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    #[serde(default)]
    pub ledger: LedgerSnapshot,
    #[serde(default)]
    pub streaks: BTreeMap<String, UserStreak>,
    #[serde(default)]
    pub quotas: BTreeMap<String, QuotaWindow>,
    /// Vote log of the in-process chain; empty for bucket deployments.
    #[serde(default)]
    pub chain_votes: Vec<Vote>,
}

impl StateFile {
    /// Missing files read as empty state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("no state at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let io_err = |source| StateError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_vec_pretty(self).map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)
    }
}

/// Outcome of a submitted vote.
#[derive(Clone, Debug, Serialize)]
pub struct CastReceipt {
    pub success: bool,
    pub transaction: VoteTransaction,
    pub hash: String,
    pub streak: UserStreak,
}

pub type StreakStore = MemoryStore<UserStreak>;
pub type QuotaStore = MemoryStore<QuotaWindow>;

/// Where votes are read from and submitted to.
#[derive(Clone)]
pub enum Backend {
    Bucket(Arc<BucketStore>),
    Chain(Arc<LocalChain>),
}

impl Backend {
    /// Backend named by `config`. A chain resumes from `saved_votes`.
    pub fn from_config(config: &Config, saved_votes: Vec<Vote>) -> Self {
        match config.source {
            SourceKind::Bucket => {
                info!("vote records in bucket {}", config.bucket_dir.display());
                Backend::Bucket(Arc::new(BucketStore::new(&config.bucket_dir)))
            }
            SourceKind::Chain => {
                info!("vote records on the in-process chain ({} restored)", saved_votes.len());
                Backend::Chain(Arc::new(LocalChain::from_votes(saved_votes)))
            }
        }
    }

    pub fn source(&self) -> Arc<dyn VoteSource> {
        match self {
            Backend::Bucket(bucket) => bucket.clone(),
            Backend::Chain(chain) => chain.clone(),
        }
    }

    pub fn sink(&self) -> Arc<dyn VoteSink> {
        match self {
            Backend::Bucket(bucket) => bucket.clone(),
            Backend::Chain(chain) => chain.clone(),
        }
    }

    /// Votes that live only in memory and must travel with the state file.
    fn volatile_votes(&self) -> Vec<Vote> {
        match self {
            Backend::Bucket(_) => Vec::new(),
            Backend::Chain(chain) => chain.votes(),
        }
    }
}

/// Shared application state handed to every request handler.
pub struct AppState {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub backend: Backend,
    pub tally: VoteTally,
    pub streaks: StreakTracker<StreakStore>,
    pub quota: DailyQuota<QuotaStore>,
    pub ledger: Mutex<PointsLedger>,
    save_lock: Mutex<()>,
}

impl AppState {
    /// Build state from configuration, restoring the state file if present.
    pub fn new(config: Config) -> Result<Arc<Self>, StateError> {
        let mut saved = StateFile::load(&config.state_path)?;
        let backend = Backend::from_config(&config, std::mem::take(&mut saved.chain_votes));
        Self::assemble(config, Arc::new(UtcClock), backend, saved)
    }

    pub fn assemble(
        config: Config,
        clock: Arc<dyn Clock>,
        backend: Backend,
        saved: StateFile,
    ) -> Result<Arc<Self>, StateError> {
        let ledger = PointsLedger::from_snapshot(saved.ledger)?;
        let tally = VoteTally::new(backend.source()).with_timeout(config.fetch_timeout);
        let streaks = StreakTracker::new(
            Arc::new(MemoryStore::from_entries(saved.streaks)),
            clock.clone(),
        );
        let quota = DailyQuota::new(
            Arc::new(MemoryStore::from_entries(saved.quotas)),
            config.daily_vote_limit,
        );
        Ok(Arc::new(Self {
            config,
            clock,
            backend,
            tally,
            streaks,
            quota,
            ledger: Mutex::new(ledger),
            save_lock: Mutex::new(()),
        }))
    }

    /// Validate, spend quota, submit the vote call, then credit the voter's
    /// points and streak for the clock's current day.
    pub async fn cast_vote(
        &self,
        movie_id: &str,
        vote_type: bool,
        wallet_address: &str,
    ) -> Result<CastReceipt, StateError> {
        let address = validate_address(wallet_address)?;
        let transaction = prepare_vote_transaction(movie_id, vote_type)?;

        let today = self.clock.today();
        self.quota.try_consume(address, today)?;

        let vote = Vote {
            movie_id: movie_id.to_string(),
            address: address.to_string(),
            vote_type,
            timestamp: self.clock.now_rfc3339(),
        };
        let timeout = self.tally.timeout();
        let submitted = tokio::time::timeout(timeout, self.backend.sink().submit(&transaction, &vote))
            .await
            .unwrap_or_else(|_| Err(ReelError::SourceTimeout(timeout)));
        let hash = match submitted {
            Ok(hash) => hash,
            Err(err) => {
                warn!("vote on movie {movie_id} by {address} not submitted: {err}");
                self.quota.refund(address, today)?;
                return Err(err.into());
            }
        };

        let credited = self.ledger.lock().record_event(
            address,
            PointEventKind::Vote,
            None,
            Utc::now().timestamp(),
        );
        credited?;
        let streak = self.streaks.record_vote_on(address, today)?;

        info!(
            "vote {} on movie {movie_id} by {address} ({hash})",
            if vote_type { "yes" } else { "no" }
        );
        Ok(CastReceipt {
            success: true,
            transaction,
            hash,
            streak,
        })
    }

    /// Credit a leaderboard event. `event_id` makes the call idempotent.
    pub fn record_points(
        &self,
        address: &str,
        kind: PointEventKind,
        event_id: Option<&str>,
    ) -> Result<Profile, StateError> {
        let address = validate_address(address)?;
        let receipt = event_id.map(receipt_for);
        let profile = self
            .ledger
            .lock()
            .record_event(address, kind, receipt, Utc::now().timestamp())?;
        Ok(profile)
    }

    pub fn to_state_file(&self) -> StateFile {
        StateFile {
            ledger: self.ledger.lock().snapshot(),
            streaks: self.streaks.store().entries(),
            quotas: self.quota.store().entries(),
            chain_votes: self.backend.volatile_votes(),
        }
    }

    /// Write the state file. Saves are serialized and each one snapshots
    /// under the lock, so the last save to finish holds the newest state.
    pub fn persist(&self) -> Result<(), StateError> {
        let _guard = self.save_lock.lock();
        self.to_state_file().save(&self.config.state_path)?;
        debug!("state saved to {}", self.config.state_path.display());
        Ok(())
    }
}
