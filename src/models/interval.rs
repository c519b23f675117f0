use chrono::{DateTime, Utc};
use serde::Serialize;

/// One tracked span of work. `end_time` is `None` while the timer runs; stop
/// sets it together with `duration_minutes`, after which the row never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkInterval {
    pub id: i64,
    #[serde(rename = "userId")]
    pub account_id: i64,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i32>,
}

impl WorkInterval {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Whole minutes between `start` and `end`, floored. A backwards clock yields 0.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i32 {
    let minutes = (end - start).num_seconds().div_euclid(60);
    minutes.clamp(0, i32::MAX as i64) as i32
}
