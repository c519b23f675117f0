//! Durable storage contracts.
//!
//! Each component depends only on the trait it needs. `PgStore` implements all
//! of them against Postgres; `MemoryStore` gives the same guarantees in-process
//! for tests and throwaway local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::account::Account;
use crate::models::interval::WorkInterval;
use crate::models::token::IssuedToken;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness guarantee rejected the write.
    #[error("unique constraint violated")]
    Duplicate,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Email → password hash mapping.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new account. A taken email yields `StoreError::Duplicate`.
    async fn insert_account(&self, email: &str, password_hash: &str) -> StoreResult<Account>;

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;
}

/// Record of every token id ever issued.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Record a freshly issued token as active.
    async fn insert_token(
        &self,
        token_id: &str,
        account_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn find_token(&self, token_id: &str) -> StoreResult<Option<IssuedToken>>;

    /// Mark a token revoked at `at`, keeping an earlier revocation if present.
    /// Returns false if the id was never issued.
    async fn revoke_token(&self, token_id: &str, at: DateTime<Utc>) -> StoreResult<bool>;
}

/// Work intervals, with at most one open interval per account.
#[async_trait]
pub trait IntervalStore: Send + Sync {
    /// Atomically open an interval. If the account already has one open,
    /// returns `StoreError::Duplicate` and writes nothing.
    async fn open_interval(
        &self,
        account_id: i64,
        start_time: DateTime<Utc>,
    ) -> StoreResult<WorkInterval>;

    /// Atomically close the account's oldest open interval at `end_time`.
    /// Returns `None` when nothing is open; of two racing callers exactly one
    /// gets the closed row.
    async fn close_oldest_open(
        &self,
        account_id: i64,
        end_time: DateTime<Utc>,
    ) -> StoreResult<Option<WorkInterval>>;

    /// Intervals with `from <= start_time < to`, ascending by start.
    async fn list_started_between(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WorkInterval>>;

    /// Sum of `duration_minutes` over closed intervals with `from <= start_time < to`.
    async fn sum_closed_minutes_between(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64>;
}
