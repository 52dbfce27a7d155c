//! Core primitives for reelvote.
//!
//! This crate holds the domain logic the service and CLI are built on:
//!
//! * [`vote`]: vote records, identifier validation and the tally reduction.
//! * [`tally`]: the vote tally collector over a pluggable [`tally::VoteSource`].
//! * [`tx`]: construction of the on-chain `vote(uint256, bool)` call.
//! * [`streak`]: per-address daily voting streaks.
//! * [`rewards`]: the static streak reward table.
//! * [`points`]: point deltas for leaderboard events.
//! * [`quota`]: per-address daily vote quota.
//! * [`store`]: key-value store abstraction with atomic per-key updates.
//!
//! Nothing here performs I/O on its own; backing collaborators (buckets,
//! chains, profile stores) are injected by the caller.

pub mod clock;
pub mod points;
pub mod quota;
pub mod rewards;
pub mod store;
pub mod streak;
pub mod tally;
pub mod tx;
pub mod vote;

mod error;

pub use error::ReelError;
