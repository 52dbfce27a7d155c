use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    clock::format_day,
    error::ReelError,
    store::KeyValueStore,
    vote::validate_address,
};

/// Votes used by one address on `day`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct QuotaWindow {
    pub day: String,
    pub used: u32,
}

/// Fixed daily window per address. A limit of 0 disables the check.
pub struct DailyQuota<S> {
    store: Arc<S>,
    limit: u32,
}

impl<S> Clone for DailyQuota<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            limit: self.limit,
        }
    }
}

impl<S> DailyQuota<S>
where
    S: KeyValueStore<QuotaWindow>,
{
    pub fn new(store: Arc<S>, limit: u32) -> Self {
        Self { store, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Take one vote from today's allowance and return how many remain.
    pub fn try_consume(&self, address: &str, today: NaiveDate) -> Result<u32, ReelError> {
        let address = validate_address(address)?;
        if self.limit == 0 {
            return Ok(u32::MAX);
        }
        let day = format_day(today);
        let limit = self.limit;
        let outcome = self.store.update(address, |window| {
            if window.day != day {
                window.day = day;
                window.used = 0;
            }
            if window.used >= limit {
                return Err(ReelError::QuotaExceeded { limit });
            }
            window.used += 1;
            Ok(limit - window.used)
        });
        if outcome.is_err() {
            info!("daily vote quota exhausted for {address}");
        }
        outcome
    }

    /// Give back a vote taken on `today` whose submission did not go through.
    /// Windows of other days are left alone.
    pub fn refund(&self, address: &str, today: NaiveDate) -> Result<(), ReelError> {
        let address = validate_address(address)?;
        if self.limit == 0 {
            return Ok(());
        }
        let day = format_day(today);
        self.store.update(address, |window| {
            if window.day == day {
                window.used = window.used.saturating_sub(1);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::MemoryStore;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn exhausts_and_resets_next_day() {
        let quota = DailyQuota::new(Arc::new(MemoryStore::new()), 2);
        let d1 = day("2024-02-01");
        assert_eq!(quota.try_consume("0xA", d1), Ok(1));
        assert_eq!(quota.try_consume("0xA", d1), Ok(0));
        assert_eq!(
            quota.try_consume("0xA", d1),
            Err(ReelError::QuotaExceeded { limit: 2 })
        );
        assert_eq!(quota.try_consume("0xB", d1), Ok(1));
        assert_eq!(quota.try_consume("0xA", day("2024-02-02")), Ok(1));
    }

    #[test]
    fn refund_returns_a_vote_for_the_same_day_only() {
        let quota = DailyQuota::new(Arc::new(MemoryStore::new()), 1);
        let d1 = day("2024-02-01");
        assert_eq!(quota.try_consume("0xA", d1), Ok(0));
        quota.refund("0xA", d1).unwrap();
        assert_eq!(quota.try_consume("0xA", d1), Ok(0));

        quota.refund("0xA", day("2024-01-31")).unwrap();
        assert!(quota.try_consume("0xA", d1).is_err());
        assert_eq!(quota.store().get("0xA").map(|w| w.used), Some(1));
    }

    #[test]
    fn zero_limit_is_unlimited() {
        let quota = DailyQuota::new(Arc::new(MemoryStore::new()), 0);
        for _ in 0..10 {
            assert!(quota.try_consume("0xA", day("2024-02-01")).is_ok());
        }
        assert!(quota.store().is_empty());
    }
}
