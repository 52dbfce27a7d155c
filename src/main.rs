use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{ArgAction, Parser, Subcommand};
use reelvote::{
    config::{Config, SourceKind},
    contracts::bucket::BucketStore,
    ledger::PointsLedger,
    state::{AppState, Backend, StateError, StateFile},
};
use reelvote_core::{
    clock::{format_day, parse_day, Clock, FixedClock, UtcClock},
    points::PointEventKind,
    rewards::{next_milestone, reward_for},
    tally::VoteTally,
    tx::prepare_vote_transaction,
    ReelError,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] ReelError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    Date(String),
    #[error("cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "reelvote", version, about = "Movie vote tallies, streaks and points")]
struct Cli {
    /// Directory holding vote objects, one subdirectory per movie.
    #[arg(long, global = true, default_value = "bucket")]
    bucket: PathBuf,

    /// JSON file with streaks, quotas and the points ledger.
    #[arg(long, global = true, default_value = "state/reelvote.json")]
    state: PathBuf,

    /// Give up on the bucket after this many milliseconds.
    #[arg(long, global = true, default_value_t = 5000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Yes/no counts and voters for a movie.
    Tally { movie_id: String },
    /// Whether an address has voted on a movie.
    Voted { movie_id: String, address: String },
    /// Print the contract call for a vote without submitting it.
    PrepareVote {
        movie_id: String,
        #[arg(action = ArgAction::Set)]
        vote_type: bool,
    },
    /// Record a vote in the bucket and credit the voter.
    Cast {
        movie_id: String,
        #[arg(action = ArgAction::Set)]
        vote_type: bool,
        address: String,
        /// Count the vote on this day instead of today (UTC).
        #[arg(long)]
        date: Option<String>,
        /// Votes allowed per address per day, 0 for no limit.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Current streak of an address.
    Streak { address: String },
    /// Reward points earned by a streak length.
    Reward { days: u32 },
    /// Credit a vote or comment event to the points ledger.
    RecordEvent {
        address: String,
        kind: PointEventKind,
        /// Repeating an id is rejected.
        #[arg(long)]
        event_id: Option<String>,
    },
    /// Addresses ordered by points.
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Check the ledger merkle root in the state file.
    VerifyState,
}

impl Cli {
    fn config(&self, daily_vote_limit: u32) -> Config {
        Config {
            source: SourceKind::Bucket,
            bucket_dir: self.bucket.clone(),
            state_path: self.state.clone(),
            fetch_timeout: Duration::from_millis(self.timeout_ms),
            daily_vote_limit,
            ..Config::default()
        }
    }

    fn tally(&self) -> VoteTally {
        VoteTally::new(Arc::new(BucketStore::new(&self.bucket)))
            .with_timeout(Duration::from_millis(self.timeout_ms))
    }

    fn open(&self, clock: Arc<dyn Clock>, daily_vote_limit: u32) -> Result<Arc<AppState>, CliError> {
        let saved = StateFile::load(&self.state)?;
        let backend = Backend::Bucket(Arc::new(BucketStore::new(&self.bucket)));
        let state = AppState::assemble(self.config(daily_vote_limit), clock, backend, saved)?;
        Ok(state)
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Tally { movie_id } => {
            let summary = cli.tally().get_votes(movie_id).await?;
            println!("movie {movie_id}: yes={} no={} total={}", summary.yes, summary.no, summary.total());
            for voter in &summary.voters {
                println!("  {voter}");
            }
        }
        Command::Voted { movie_id, address } => {
            let voted = cli.tally().has_user_voted(movie_id, address).await?;
            println!("{voted}");
        }
        Command::PrepareVote { movie_id, vote_type } => {
            let tx = prepare_vote_transaction(movie_id, *vote_type)?;
            println!("{}", serde_json::to_string_pretty(&tx)?);
            println!("digest: {}", hex::encode(tx.digest()));
        }
        Command::Cast {
            movie_id,
            vote_type,
            address,
            date,
            limit,
        } => {
            let clock: Arc<dyn Clock> = match date {
                Some(value) => {
                    let day = parse_day(value).ok_or_else(|| CliError::Date(value.clone()))?;
                    Arc::new(FixedClock(day))
                }
                None => Arc::new(UtcClock),
            };
            let state = cli.open(clock, *limit)?;
            let receipt = state.cast_vote(movie_id, *vote_type, address).await?;
            state.persist()?;
            println!("OK: vote stored as {}", receipt.hash);
            println!(
                "streak: current={} longest={} bonus={} total_votes={}",
                receipt.streak.current_streak,
                receipt.streak.longest_streak,
                receipt.streak.streak_bonus,
                receipt.streak.total_votes
            );
        }
        Command::Streak { address } => {
            let state = cli.open(Arc::new(UtcClock), 0)?;
            let streak = state.streaks.streak(address)?;
            let last = if streak.last_vote_date.is_empty() {
                "never"
            } else {
                streak.last_vote_date.as_str()
            };
            println!(
                "{address}: current={} longest={} last_vote={last} total_votes={} bonus={}",
                streak.current_streak, streak.longest_streak, streak.total_votes, streak.streak_bonus
            );
            if let Some(next) = next_milestone(streak.current_streak) {
                println!(
                    "next milestone: {} days ({}x, {} points), today is {}",
                    next.streak_days,
                    next.bonus_multiplier,
                    next.reward,
                    format_day(state.clock.today())
                );
            }
        }
        Command::Reward { days } => {
            println!("{}", reward_for(*days));
        }
        Command::RecordEvent {
            address,
            kind,
            event_id,
        } => {
            let state = cli.open(Arc::new(UtcClock), 0)?;
            let profile = state.record_points(address, *kind, event_id.as_deref())?;
            state.persist()?;
            println!(
                "OK: {address} +{} ({}), points={}",
                kind.delta(),
                kind.as_str(),
                profile.points
            );
        }
        Command::Leaderboard { limit } => {
            let state = cli.open(Arc::new(UtcClock), 0)?;
            let entries = state.ledger.lock().leaderboard(*limit);
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}. {} points={} votes={} comments={}",
                    rank + 1,
                    entry.address,
                    entry.points,
                    entry.votes,
                    entry.comments
                );
            }
        }
        Command::VerifyState => {
            let saved = StateFile::load(&cli.state)?;
            let root = hex::encode(saved.ledger.merkle_root);
            let ledger = PointsLedger::from_snapshot(saved.ledger).map_err(StateError::from)?;
            println!(
                "OK: ledger height={} profiles={} events={} root={root}",
                ledger.meta.height,
                ledger.profiles.len(),
                ledger.events.len()
            );
            println!("streaks={} quotas={}", saved.streaks.len(), saved.quotas.len());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(2);
    }
}
