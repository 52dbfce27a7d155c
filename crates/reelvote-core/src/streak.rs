//! Daily voting streaks.
//!
//! A streak counts consecutive UTC calendar days on which an address cast at
//! least one vote. State is kept per address in an injected
//! [`KeyValueStore`]; each transition runs inside the store's `update`, so a
//! second vote on the same day can never increment the streak twice.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    clock::{format_day, parse_day, Clock},
    error::ReelError,
    rewards::reward_for,
    store::KeyValueStore,
    vote::validate_address,
};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserStreak {
    pub current_streak: u32,
    pub longest_streak: u32,
    /// `YYYY-MM-DD`, empty before the first vote.
    pub last_vote_date: String,
    pub total_votes: u32,
    pub streak_bonus: u32,
}

impl UserStreak {
    /// Apply a vote cast on `today`. Returns `false` when the address already
    /// voted that day and nothing changed.
    pub fn advance(&mut self, today: NaiveDate) -> bool {
        let last = parse_day(&self.last_vote_date);
        if last == Some(today) {
            return false;
        }
        let continues = last.and_then(|day| day.succ_opt()) == Some(today);
        self.current_streak = if continues {
            self.current_streak.saturating_add(1)
        } else {
            // gap, first vote, unreadable or future date
            1
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_vote_date = format_day(today);
        self.total_votes = self.total_votes.saturating_add(1);
        self.streak_bonus = reward_for(self.current_streak);
        true
    }
}

pub struct StreakTracker<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for StreakTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> StreakTracker<S>
where
    S: KeyValueStore<UserStreak>,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Record a vote by `address` today.
    pub fn record_vote(&self, address: &str) -> Result<UserStreak, ReelError> {
        self.record_vote_on(address, self.clock.today())
    }

    pub fn record_vote_on(&self, address: &str, today: NaiveDate) -> Result<UserStreak, ReelError> {
        let address = validate_address(address)?;
        let (changed, state) = self.store.update(address, |streak| {
            let changed = streak.advance(today);
            (changed, streak.clone())
        });
        if changed {
            debug!(
                "streak for {address}: current={} longest={} bonus={}",
                state.current_streak, state.longest_streak, state.streak_bonus
            );
        }
        Ok(state)
    }

    /// Current state, zero-valued for addresses that never voted.
    pub fn streak(&self, address: &str) -> Result<UserStreak, ReelError> {
        let address = validate_address(address)?;
        Ok(self.store.get(address).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{clock::FixedClock, store::MemoryStore};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn tracker() -> StreakTracker<MemoryStore<UserStreak>> {
        StreakTracker::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FixedClock(day("2024-01-01"))),
        )
    }

    #[test]
    fn first_vote_starts_a_streak() {
        let state = tracker().record_vote("0xABC").unwrap();
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 1);
        assert_eq!(state.last_vote_date, "2024-01-01");
        assert_eq!(state.total_votes, 1);
        assert_eq!(state.streak_bonus, 10);
    }

    #[test]
    fn same_day_is_idempotent() {
        let t = tracker();
        let first = t.record_vote("0xABC").unwrap();
        let second = t.record_vote("0xABC").unwrap();
        assert_eq!(first, second);
        assert_eq!(t.streak("0xABC").unwrap(), first);
    }

    #[test]
    fn consecutive_days_extend() {
        let t = tracker();
        t.record_vote_on("0xABC", day("2024-03-10")).unwrap();
        let state = t.record_vote_on("0xABC", day("2024-03-11")).unwrap();
        assert_eq!(state.current_streak, 2);
    }

    #[test]
    fn gap_resets_to_one() {
        let t = tracker();
        t.record_vote_on("0xABC", day("2024-03-10")).unwrap();
        t.record_vote_on("0xABC", day("2024-03-11")).unwrap();
        let state = t.record_vote_on("0xABC", day("2024-03-14")).unwrap();
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 2);
        assert_eq!(state.total_votes, 3);
    }

    #[test]
    fn three_day_run() {
        let t = tracker();
        for d in ["2024-01-01", "2024-01-02", "2024-01-03"] {
            t.record_vote_on("0xABC", day(d)).unwrap();
        }
        let state = t.streak("0xABC").unwrap();
        assert_eq!(state.current_streak, 3);
        assert_eq!(state.streak_bonus, 15);
        assert_eq!(state.total_votes, 3);
    }

    #[test]
    fn streak_crosses_month_and_year_boundaries() {
        let t = tracker();
        t.record_vote_on("0xABC", day("2023-12-31")).unwrap();
        let state = t.record_vote_on("0xABC", day("2024-01-01")).unwrap();
        assert_eq!(state.current_streak, 2);
    }

    #[test]
    fn malformed_date_is_a_fresh_start() {
        let mut state = UserStreak {
            current_streak: 9,
            longest_streak: 9,
            last_vote_date: "yesterday".into(),
            total_votes: 9,
            streak_bonus: 25,
        };
        assert!(state.advance(day("2024-05-05")));
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 9);
        assert_eq!(state.total_votes, 10);
        assert_eq!(state.streak_bonus, 10);
    }

    #[test]
    fn future_date_resets() {
        let mut state = UserStreak {
            current_streak: 4,
            longest_streak: 4,
            last_vote_date: "2030-01-01".into(),
            total_votes: 4,
            streak_bonus: 15,
        };
        state.advance(day("2024-05-05"));
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.last_vote_date, "2024-05-05");
    }

    #[test]
    fn unknown_address_reads_as_zero() {
        assert_eq!(tracker().streak("0xNEW").unwrap(), UserStreak::default());
        assert_eq!(tracker().record_vote(" ").unwrap_err(), ReelError::EmptyAddress);
    }

    #[test]
    fn concurrent_first_votes_count_once() {
        let t = tracker();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let t = t.clone();
                std::thread::spawn(move || t.record_vote("0xABC").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let state = t.streak("0xABC").unwrap();
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.total_votes, 1);
    }
}
