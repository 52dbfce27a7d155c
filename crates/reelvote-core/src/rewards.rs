use serde::Serialize;

/// One row of the streak reward table.
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreakReward {
    pub streak_days: u32,
    pub bonus_multiplier: f64,
    pub reward: u32,
}

/// Sorted descending by `streak_days`; lookups rely on the order.
pub static REWARD_TABLE: [StreakReward; 7] = [
    StreakReward {
        streak_days: 100,
        bonus_multiplier: 10.0,
        reward: 500,
    },
    StreakReward {
        streak_days: 60,
        bonus_multiplier: 5.0,
        reward: 200,
    },
    StreakReward {
        streak_days: 30,
        bonus_multiplier: 3.0,
        reward: 100,
    },
    StreakReward {
        streak_days: 14,
        bonus_multiplier: 2.0,
        reward: 50,
    },
    StreakReward {
        streak_days: 7,
        bonus_multiplier: 1.5,
        reward: 25,
    },
    StreakReward {
        streak_days: 3,
        bonus_multiplier: 1.2,
        reward: 15,
    },
    StreakReward {
        streak_days: 1,
        bonus_multiplier: 1.0,
        reward: 10,
    },
];

/// Reward for the largest threshold not above `streak`, or 0.
pub fn reward_for(streak: u32) -> u32 {
    REWARD_TABLE
        .iter()
        .find(|entry| entry.streak_days <= streak)
        .map_or(0, |entry| entry.reward)
}

/// Nearest threshold strictly above `streak`.
pub fn next_milestone(streak: u32) -> Option<&'static StreakReward> {
    REWARD_TABLE
        .iter()
        .rev()
        .find(|entry| entry.streak_days > streak)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_descending() {
        assert!(REWARD_TABLE
            .windows(2)
            .all(|pair| pair[0].streak_days > pair[1].streak_days));
    }

    #[test]
    fn rewards_at_thresholds() {
        let expected = [
            (0, 0),
            (1, 10),
            (3, 15),
            (7, 25),
            (14, 50),
            (30, 100),
            (60, 200),
            (100, 500),
        ];
        for (streak, reward) in expected {
            assert_eq!(reward_for(streak), reward, "streak {streak}");
        }
        assert_eq!(reward_for(2), 10);
        assert_eq!(reward_for(99), 200);
        assert_eq!(reward_for(1_000), 500);
    }

    #[test]
    fn rewards_never_decrease() {
        let mut last = 0;
        for streak in 0..=150 {
            let reward = reward_for(streak);
            assert!(reward >= last);
            last = reward;
        }
    }

    #[test]
    fn next_milestone_is_the_closest_higher_row() {
        assert_eq!(next_milestone(0).map(|r| r.streak_days), Some(1));
        assert_eq!(next_milestone(1).map(|r| r.streak_days), Some(3));
        assert_eq!(next_milestone(13).map(|r| r.streak_days), Some(14));
        assert_eq!(next_milestone(99).map(|r| r.streak_days), Some(100));
        assert!(next_milestone(100).is_none());
        assert!(next_milestone(250).is_none());
    }
}
