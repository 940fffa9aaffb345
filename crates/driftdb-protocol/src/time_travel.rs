//! Time-travel addressing.
//!
//! DriftDB exposes historical state through SQL suffixes recognized by the
//! server's parser. The client only interpolates: sequence numbers and
//! timestamps are neither validated nor escaped here.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone};

/// A point (or range) in the database history to query against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeTravel {
    /// State as of a sequence number.
    Sequence(u64),
    /// State as of an ISO-8601 timestamp.
    Timestamp(String),
    /// All versions between two sequence numbers.
    Between {
        /// First sequence number.
        start: u64,
        /// Last sequence number.
        end: u64,
    },
    /// Every historical version.
    All,
}

impl TimeTravel {
    /// Address a timezone-aware instant, formatted as RFC 3339.
    pub fn at<Tz>(timestamp: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self::Timestamp(timestamp.to_rfc3339())
    }

    /// Address a naive timestamp, formatted as `YYYY-MM-DDTHH:MM:SS[.fff]`.
    #[must_use]
    pub fn at_naive(timestamp: &NaiveDateTime) -> Self {
        Self::Timestamp(timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }

    /// The SQL clause for this time-travel point.
    #[must_use]
    pub fn to_sql(&self) -> String {
        self.to_string()
    }

    /// Append this clause to `sql`, separated by a single space.
    #[must_use]
    pub fn apply(&self, sql: &str) -> String {
        format!("{sql} {self}")
    }
}

impl fmt::Display for TimeTravel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(seq) => write!(f, "FOR SYSTEM_TIME AS OF @SEQ:{seq}"),
            Self::Timestamp(ts) => write!(f, "FOR SYSTEM_TIME AS OF '{ts}'"),
            Self::Between { start, end } => {
                write!(f, "FOR SYSTEM_TIME BETWEEN @SEQ:{start} AND @SEQ:{end}")
            }
            Self::All => f.write_str("FOR SYSTEM_TIME ALL"),
        }
    }
}

impl From<u64> for TimeTravel {
    fn from(seq: u64) -> Self {
        Self::Sequence(seq)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;

    #[test]
    fn test_time_travel_to_sql() {
        assert_eq!(
            TimeTravel::Sequence(42).to_sql(),
            "FOR SYSTEM_TIME AS OF @SEQ:42"
        );
        assert_eq!(
            TimeTravel::Timestamp("2024-01-01T00:00:00".into()).to_sql(),
            "FOR SYSTEM_TIME AS OF '2024-01-01T00:00:00'"
        );
        assert_eq!(
            TimeTravel::Between { start: 10, end: 20 }.to_sql(),
            "FOR SYSTEM_TIME BETWEEN @SEQ:10 AND @SEQ:20"
        );
        assert_eq!(TimeTravel::All.to_sql(), "FOR SYSTEM_TIME ALL");
    }

    #[test]
    fn test_apply_appends_suffix() {
        assert_eq!(
            TimeTravel::Sequence(42).apply("SELECT * FROM t"),
            "SELECT * FROM t FOR SYSTEM_TIME AS OF @SEQ:42"
        );
    }

    #[test]
    fn test_naive_timestamp_format() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            TimeTravel::at_naive(&ts),
            TimeTravel::Timestamp("2024-01-01T00:00:00".into())
        );
    }

    #[test]
    fn test_aware_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(
            TimeTravel::at(&ts).to_sql(),
            "FOR SYSTEM_TIME AS OF '2024-01-01T12:30:00+00:00'"
        );
    }

    proptest! {
        #[test]
        fn prop_sequence_rewrite_is_a_pure_suffix(sql in "[A-Za-z0-9 *,=]{0,64}", seq in any::<u64>()) {
            let rewritten = TimeTravel::Sequence(seq).apply(&sql);
            let suffix = format!(" FOR SYSTEM_TIME AS OF @SEQ:{seq}");
            prop_assert!(rewritten.starts_with(&sql));
            prop_assert!(rewritten.ends_with(&suffix));
            prop_assert_eq!(rewritten.len(), sql.len() + suffix.len());
        }
    }
}
