//! Start/stop work timers and report on the current day.
//!
//! "Today" is the server's local calendar day, expressed to storage as the
//! half-open instant range `[local midnight, next local midnight)`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::errors::AppError;
use crate::models::interval::WorkInterval;
use crate::store::{IntervalStore, StoreError};

pub struct SessionTracker {
    store: Arc<dyn IntervalStore>,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn IntervalStore>) -> Self {
        Self { store }
    }

    /// Open a timer for the account. Fails with `SessionAlreadyOpen` if one is
    /// running, including when a concurrent start won the race.
    pub async fn start(&self, account_id: i64) -> Result<WorkInterval, AppError> {
        match self.store.open_interval(account_id, Utc::now()).await {
            Ok(interval) => {
                tracing::info!(account_id, interval_id = interval.id, "session started");
                Ok(interval)
            }
            Err(StoreError::Duplicate) => Err(AppError::SessionAlreadyOpen),
            Err(e) => Err(e.into()),
        }
    }

    /// Close the account's oldest open timer and record its whole-minute duration.
    pub async fn stop(&self, account_id: i64) -> Result<WorkInterval, AppError> {
        let closed = self
            .store
            .close_oldest_open(account_id, Utc::now())
            .await?
            .ok_or(AppError::NoOpenSession)?;

        tracing::info!(
            account_id,
            interval_id = closed.id,
            duration_minutes = closed.duration_minutes,
            "session stopped"
        );
        Ok(closed)
    }

    pub async fn list_today(&self, account_id: i64) -> Result<Vec<WorkInterval>, AppError> {
        self.list_on_day_of(account_id, &Local::now()).await
    }

    /// Minutes recorded by closed timers started today. A running timer adds nothing.
    pub async fn total_today(&self, account_id: i64) -> Result<i64, AppError> {
        self.total_on_day_of(account_id, &Local::now()).await
    }

    /// Intervals started on the calendar day containing `now`, in `now`'s zone.
    pub async fn list_on_day_of<Tz: TimeZone>(
        &self,
        account_id: i64,
        now: &DateTime<Tz>,
    ) -> Result<Vec<WorkInterval>, AppError> {
        let (from, to) = day_bounds(now);
        Ok(self.store.list_started_between(account_id, from, to).await?)
    }

    pub async fn total_on_day_of<Tz: TimeZone>(
        &self,
        account_id: i64,
        now: &DateTime<Tz>,
    ) -> Result<i64, AppError> {
        let (from, to) = day_bounds(now);
        Ok(self
            .store
            .sum_closed_minutes_between(account_id, from, to)
            .await?)
    }
}

/// Start and end instants of the calendar day containing `now`.
pub fn day_bounds<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let tz = now.timezone();
    let date = now.date_naive();
    let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
    (start_of_day(&tz, date), start_of_day(&tz, next))
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Ambiguous midnight takes the earlier instant; a midnight skipped by a DST
    // jump starts the day an hour later.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}
