//! In-process store with the same contracts as `PgStore`.
//!
//! A single mutex guards all tables, so every check-then-write below is one
//! critical section and the one-open-interval rule holds under concurrency.
//! Nothing survives a restart; select it with `DATABASE_URL=memory://`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CredentialStore, IntervalStore, StoreError, StoreResult, TokenLedger};
use crate::models::account::Account;
use crate::models::interval::{elapsed_minutes, WorkInterval};
use crate::models::token::IssuedToken;

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    last_account_id: i64,
    tokens: HashMap<String, IssuedToken>,
    intervals: Vec<WorkInterval>,
    last_interval_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_account(&self, email: &str, password_hash: &str) -> StoreResult<Account> {
        let mut tables = self.inner.lock().await;
        if tables.accounts.contains_key(email) {
            return Err(StoreError::Duplicate);
        }
        tables.last_account_id += 1;
        let account = Account {
            id: tables.last_account_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.accounts.insert(email.to_string(), account.clone());
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self.inner.lock().await.accounts.get(email).cloned())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TokenLedger for MemoryStore {
    async fn insert_token(
        &self,
        token_id: &str,
        account_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.inner.lock().await;
        if tables.tokens.contains_key(token_id) {
            return Err(StoreError::Duplicate);
        }
        tables.tokens.insert(
            token_id.to_string(),
            IssuedToken {
                token_id: token_id.to_string(),
                account_id,
                expires_at,
                revoked_at: None,
            },
        );
        Ok(())
    }

    async fn find_token(&self, token_id: &str) -> StoreResult<Option<IssuedToken>> {
        Ok(self.inner.lock().await.tokens.get(token_id).cloned())
    }

    async fn revoke_token(&self, token_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.inner.lock().await;
        match tables.tokens.get_mut(token_id) {
            Some(token) => {
                token.revoked_at.get_or_insert(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl IntervalStore for MemoryStore {
    async fn open_interval(
        &self,
        account_id: i64,
        start_time: DateTime<Utc>,
    ) -> StoreResult<WorkInterval> {
        let mut tables = self.inner.lock().await;
        if tables
            .intervals
            .iter()
            .any(|i| i.account_id == account_id && i.is_open())
        {
            return Err(StoreError::Duplicate);
        }
        tables.last_interval_id += 1;
        let interval = WorkInterval {
            id: tables.last_interval_id,
            account_id,
            start_time,
            end_time: None,
            duration_minutes: None,
        };
        tables.intervals.push(interval.clone());
        Ok(interval)
    }

    async fn close_oldest_open(
        &self,
        account_id: i64,
        end_time: DateTime<Utc>,
    ) -> StoreResult<Option<WorkInterval>> {
        let mut tables = self.inner.lock().await;
        let oldest = tables
            .intervals
            .iter_mut()
            .filter(|i| i.account_id == account_id && i.is_open())
            .min_by_key(|i| (i.start_time, i.id));

        Ok(oldest.map(|interval| {
            interval.end_time = Some(end_time);
            interval.duration_minutes = Some(elapsed_minutes(interval.start_time, end_time));
            interval.clone()
        }))
    }

    async fn list_started_between(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WorkInterval>> {
        let tables = self.inner.lock().await;
        let mut rows: Vec<WorkInterval> = tables
            .intervals
            .iter()
            .filter(|i| i.account_id == account_id && i.start_time >= from && i.start_time < to)
            .cloned()
            .collect();
        rows.sort_by_key(|i| (i.start_time, i.id));
        Ok(rows)
    }

    async fn sum_closed_minutes_between(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let tables = self.inner.lock().await;
        Ok(tables
            .intervals
            .iter()
            .filter(|i| i.account_id == account_id && i.start_time >= from && i.start_time < to)
            .filter_map(|i| i.duration_minutes)
            .map(i64::from)
            .sum())
    }
}
