use serde::{Deserialize, Serialize};

/// Leaderboard events a profile earns points for.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PointEventKind {
    Vote,
    Comment,
}

impl PointEventKind {
    pub fn delta(self) -> u64 {
        match self {
            PointEventKind::Vote => 1,
            PointEventKind::Comment => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PointEventKind::Vote => "vote",
            PointEventKind::Comment => "comment",
        }
    }
}

impl std::str::FromStr for PointEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vote" => Ok(PointEventKind::Vote),
            "comment" => Ok(PointEventKind::Comment),
            other => Err(format!("unknown event type {other:?}, expected vote or comment")),
        }
    }
}
