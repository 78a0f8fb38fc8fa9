use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The durable mirror of the tracker's in-memory state. Written as a whole on
/// every transition, read once at startup.
///
/// `total_seconds` excludes the currently-running interval; `start_time` is
/// only meaningful while `is_running` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(with = "duration_secs", rename = "total_seconds")]
    pub total: Duration,
    pub is_running: bool,
}

impl SessionSnapshot {
    pub fn empty() -> Self {
        Self {
            start_time: None,
            total: Duration::zero(),
            is_running: false,
        }
    }
}

/// One finished session as it sits in the history ledger. Immutable once
/// appended; reset never touches these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSessionEntity {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs", rename = "duration_seconds")]
    pub duration: Duration,
}

mod duration_secs {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        // Durations are non-negative; a hand-edited or damaged file must not
        // drag totals below zero.
        Ok(Duration::seconds(s.max(0)))
    }
}
