use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{CredentialStore, IntervalStore, StoreError, StoreResult, TokenLedger};
use crate::models::account::Account;
use crate::models::interval::WorkInterval;
use crate::models::token::IssuedToken;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Unique violations become `Duplicate`; everything else stays a database error.
fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate,
        _ => StoreError::Database(err),
    }
}

// -- Accounts --

#[async_trait]
impl CredentialStore for PgStore {
    async fn insert_account(&self, email: &str, password_hash: &str) -> StoreResult<Account> {
        sqlx::query_as::<_, Account>(
            r#"INSERT INTO users (email, password_hash)
               VALUES ($1, $2)
               RETURNING id, email, password_hash, created_at"#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn find_account_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// -- Token Ledger --

#[async_trait]
impl TokenLedger for PgStore {
    async fn insert_token(
        &self,
        token_id: &str,
        account_id: i64,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO auth_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_id)
            .bind(account_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn find_token(&self, token_id: &str) -> StoreResult<Option<IssuedToken>> {
        let row = sqlx::query_as::<_, IssuedToken>(
            r#"SELECT jti AS token_id, user_id AS account_id, expires_at, revoked_at
               FROM auth_tokens
               WHERE jti = $1"#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn revoke_token(&self, token_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE auth_tokens SET revoked_at = COALESCE(revoked_at, $2) WHERE jti = $1",
        )
        .bind(token_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// -- Work Intervals --

#[async_trait]
impl IntervalStore for PgStore {
    async fn open_interval(
        &self,
        account_id: i64,
        start_time: DateTime<Utc>,
    ) -> StoreResult<WorkInterval> {
        // work_sessions_one_open_per_user turns a concurrent second insert into
        // a unique violation instead of a second open row.
        sqlx::query_as::<_, WorkInterval>(
            r#"INSERT INTO work_sessions (user_id, start_time)
               VALUES ($1, $2)
               RETURNING id, user_id AS account_id, start_time, end_time, duration_minutes"#,
        )
        .bind(account_id)
        .bind(start_time)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn close_oldest_open(
        &self,
        account_id: i64,
        end_time: DateTime<Utc>,
    ) -> StoreResult<Option<WorkInterval>> {
        // The row lock makes a racing stop wait, re-check `end_time IS NULL`
        // and come back empty.
        let row = sqlx::query_as::<_, WorkInterval>(
            r#"UPDATE work_sessions
               SET end_time = $2,
                   duration_minutes = GREATEST(FLOOR(EXTRACT(EPOCH FROM ($2 - start_time)) / 60), 0)::INT
               WHERE id = (
                   SELECT id FROM work_sessions
                   WHERE user_id = $1 AND end_time IS NULL
                   ORDER BY start_time ASC, id ASC
                   LIMIT 1
                   FOR UPDATE
               )
               AND end_time IS NULL
               RETURNING id, user_id AS account_id, start_time, end_time, duration_minutes"#,
        )
        .bind(account_id)
        .bind(end_time)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_started_between(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<WorkInterval>> {
        let rows = sqlx::query_as::<_, WorkInterval>(
            r#"SELECT id, user_id AS account_id, start_time, end_time, duration_minutes
               FROM work_sessions
               WHERE user_id = $1 AND start_time >= $2 AND start_time < $3
               ORDER BY start_time ASC, id ASC"#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn sum_closed_minutes_between(
        &self,
        account_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"SELECT COALESCE(SUM(duration_minutes), 0)::BIGINT
               FROM work_sessions
               WHERE user_id = $1
                 AND end_time IS NOT NULL
                 AND start_time >= $2 AND start_time < $3"#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
