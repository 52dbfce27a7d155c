use chrono::{NaiveDate, Utc};

/// Source of the current calendar day. Streaks and quotas count UTC days.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    fn now_rfc3339(&self) -> String;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn now_rfc3339(&self) -> String {
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

/// Clock pinned to one day, for tests and for replaying votes from the CLI.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }

    fn now_rfc3339(&self) -> String {
        format!("{}T00:00:00Z", self.0.format(DATE_FORMAT))
    }
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_day(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}

pub fn parse_day(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}
