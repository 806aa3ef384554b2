// Data models for taskboard

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};

/// Task identifier: creation time in milliseconds, bumped to stay strictly increasing
pub type TaskId = i64;

/// A single to-do item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default, with = "date_field")]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "time_field")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// True when the task has any due date or due time attached
    pub fn has_schedule(&self) -> bool {
        self.date.is_some() || self.time.is_some()
    }
}

/// Counts shown alongside the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl Stats {
    pub fn of(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total,
            completed,
            pending: total - completed,
        }
    }
}

/// Parse a calendar date in `YYYY-MM-DD` form
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| eyre!("Invalid date '{}': {} (expected YYYY-MM-DD)", s, e))
}

/// Parse a clock time in `HH:MM` or `HH:MM:SS` form
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| eyre!("Invalid time '{}': {} (expected HH:MM)", s, e))
}

/// Render a time the way it was most likely entered: seconds only when non-zero
pub fn format_time(t: &NaiveTime) -> String {
    if t.second() == 0 {
        t.format("%H:%M").to_string()
    } else {
        t.format("%H:%M:%S").to_string()
    }
}

// Absent dates and times are stored as "" and read back from "", null or a missing field.

mod date_field {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) if !s.trim().is_empty() => super::parse_date(&s).map(Some).map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}

mod time_field {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&super::format_time(t)),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(s) if !s.trim().is_empty() => super::parse_time(&s).map(Some).map_err(D::Error::custom),
            _ => Ok(None),
        }
    }
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
