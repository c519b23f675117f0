//! Account registration, login, token validation and revocation.
//!
//! Every validation reads the token ledger; there is no stateless fast path
//! once a token can be revoked.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::account::{Account, AccountSummary};
use crate::store::{CredentialStore, StoreError, TokenLedger};

pub mod jwt;
pub mod password;

use jwt::{generate_token_id, Claims, TokenSigner};
use password::CredentialHasher;

pub const MIN_PASSWORD_CHARS: usize = 6;

/// The authenticated account behind the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub account_id: i64,
    pub token_id: String,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account: AccountSummary,
}

pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    ledger: Arc<dyn TokenLedger>,
    signer: TokenSigner,
    hasher: CredentialHasher,
    token_ttl: chrono::Duration,
    /// Verified against when the email is unknown, so both login failures cost the same.
    dummy_hash: String,
}

impl Authenticator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        ledger: Arc<dyn TokenLedger>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let token_ttl = chrono::Duration::from_std(config.token_ttl)?;
        if Utc::now().checked_add_signed(token_ttl).is_none() {
            anyhow::bail!(
                "TOKEN_TTL_SECS ({}) is too large to compute an expiry",
                config.token_ttl.as_secs()
            );
        }

        let hasher = CredentialHasher::new(config.password_hash)?;
        let dummy_hash = hasher.hash(&generate_token_id())?;
        Ok(Self {
            credentials,
            ledger,
            signer: TokenSigner::new(&config.jwt_secret),
            hasher,
            token_ttl,
            dummy_hash,
        })
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::InvalidInput("email is required".into()));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AppError::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }

        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(anyhow::Error::from)??;

        // The unique index on email is the only duplicate check; a pre-read would race.
        match self.credentials.insert_account(email, &hash).await {
            Ok(account) => {
                tracing::info!(account_id = account.id, "account registered");
                Ok(account)
            }
            Err(StoreError::Duplicate) => {
                tracing::debug!("registration rejected: email already taken");
                Err(AppError::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, AppError> {
        let account = self
            .credentials
            .find_account_by_email(email.trim())
            .await?;

        let stored_hash = account
            .as_ref()
            .map(|a| a.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&stored_hash, &password))
            .await
            .map_err(anyhow::Error::from)?;

        let account = match account {
            Some(account) if matches => account,
            _ => {
                tracing::debug!("login rejected");
                return Err(AppError::InvalidCredentials);
            }
        };

        let grant = self.issue(&account).await?;
        tracing::info!(account_id = account.id, "login succeeded");
        Ok(grant)
    }

    /// Mint a signed token for `account` and record it in the ledger as active.
    async fn issue(&self, account: &Account) -> Result<LoginGrant, AppError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.token_ttl)
            .ok_or_else(|| anyhow::anyhow!("token expiry overflows"))?;
        let claims = Claims {
            uid: account.id,
            jti: generate_token_id(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = self.signer.sign(&claims)?;

        self.ledger
            .insert_token(&claims.jti, account.id, expires_at)
            .await?;

        Ok(LoginGrant {
            token,
            expires_at,
            account: AccountSummary::from(account),
        })
    }

    /// Resolve a presented bearer token to its principal.
    ///
    /// Forged, malformed, expired, revoked and unknown tokens all produce
    /// `InvalidToken`; the reason is only logged.
    pub async fn validate(&self, token: &str) -> Result<Principal, AppError> {
        let claims = self.signer.verify(token).map_err(|e| {
            tracing::debug!("token rejected: {}", e);
            AppError::InvalidToken
        })?;

        let record = match self.ledger.find_token(&claims.jti).await? {
            Some(record) => record,
            None => {
                tracing::debug!(jti = %claims.jti, "token rejected: not in ledger");
                return Err(AppError::InvalidToken);
            }
        };

        if record.account_id != claims.uid {
            tracing::warn!(jti = %claims.jti, "token rejected: owner mismatch");
            return Err(AppError::InvalidToken);
        }
        if !record.is_usable(Utc::now()) {
            tracing::debug!(
                jti = %claims.jti,
                revoked = record.revoked_at.is_some(),
                "token rejected: revoked or expired"
            );
            return Err(AppError::InvalidToken);
        }

        Ok(Principal {
            account_id: record.account_id,
            token_id: record.token_id,
        })
    }

    /// Revoke a token. Revoking twice is fine; an id never issued is `TokenNotFound`.
    pub async fn logout(&self, token_id: &str) -> Result<(), AppError> {
        if token_id.is_empty() || !self.ledger.revoke_token(token_id, Utc::now()).await? {
            return Err(AppError::TokenNotFound);
        }
        tracing::info!(jti = %token_id, "token revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PasswordHashConfig, SigningSecret};
    use crate::errors::ErrorKind;
    use crate::store::memory::MemoryStore;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            port: 0,
            database_url: "memory://".into(),
            cors_origin: "http://localhost:8100".into(),
            jwt_secret: SigningSecret::new("unit-test-secret-unit-test-secret"),
            token_ttl: Duration::from_secs(3600),
            password_hash: PasswordHashConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        }
    }

    fn authenticator() -> (Authenticator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let auth = Authenticator::new(store.clone(), store.clone(), &config()).unwrap();
        (auth, store)
    }

    #[test]
    fn test_unrepresentable_ttl_is_rejected_at_startup() {
        let store = Arc::new(MemoryStore::new());
        let mut cfg = config();
        cfg.token_ttl = Duration::from_secs(10_000_000_000_000);
        assert!(Authenticator::new(store.clone(), store, &cfg).is_err());
    }

    #[tokio::test]
    async fn test_long_ttl_login_still_issues() {
        let store = Arc::new(MemoryStore::new());
        let mut cfg = config();
        cfg.token_ttl = Duration::from_secs(100 * 365 * 24 * 60 * 60);
        let auth = Authenticator::new(store.clone(), store, &cfg).unwrap();

        auth.register("long@x.io", "secret1").await.unwrap();
        let grant = auth.login("long@x.io", "secret1").await.unwrap();
        assert!(grant.expires_at > Utc::now() + chrono::Duration::days(365 * 99));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let (auth, _) = authenticator();
        assert!(matches!(
            auth.register("   ", "secret1").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            auth.register("a@x.io", "12345").await,
            Err(AppError::InvalidInput(_))
        ));
        // six characters, not six bytes
        assert!(auth.register("a@x.io", "ééééé").await.is_err());
        assert!(auth.register("a@x.io", "éééééé").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let (auth, _) = authenticator();
        auth.register("a@x.io", "secret1").await.unwrap();
        let err = auth.register("a@x.io", "another1").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_password_is_not_stored_in_clear() {
        let (auth, store) = authenticator();
        auth.register("a@x.io", "secret1").await.unwrap();
        let account = store.find_account_by_email("a@x.io").await.unwrap().unwrap();
        assert_ne!(account.password_hash, "secret1");
        assert!(account.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_login_issues_ledgered_token() {
        let (auth, store) = authenticator();
        let account = auth.register("a@x.io", "secret1").await.unwrap();
        let grant = auth.login("a@x.io", "secret1").await.unwrap();

        assert_eq!(grant.account.id, account.id);
        assert_eq!(grant.account.email, "a@x.io");

        let principal = auth.validate(&grant.token).await.unwrap();
        assert_eq!(principal.account_id, account.id);

        let record = store.find_token(&principal.token_id).await.unwrap().unwrap();
        assert_eq!(record.account_id, account.id);
        assert!(record.revoked_at.is_none());
        assert_eq!(record.expires_at, grant.expires_at);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (auth, _) = authenticator();
        auth.register("a@x.io", "secret1").await.unwrap();

        let wrong_password = auth.login("a@x.io", "secret2").await.unwrap_err();
        let unknown_email = auth.login("nobody@x.io", "secret1").await.unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn test_each_login_gets_a_fresh_token_id() {
        let (auth, _) = authenticator();
        auth.register("a@x.io", "secret1").await.unwrap();
        let first = auth.login("a@x.io", "secret1").await.unwrap();
        let second = auth.login("a@x.io", "secret1").await.unwrap();
        let p1 = auth.validate(&first.token).await.unwrap();
        let p2 = auth.validate(&second.token).await.unwrap();
        assert_ne!(p1.token_id, p2.token_id);
    }

    #[tokio::test]
    async fn test_logout_revokes_only_that_token() {
        let (auth, _) = authenticator();
        auth.register("a@x.io", "secret1").await.unwrap();
        let first = auth.login("a@x.io", "secret1").await.unwrap();
        let second = auth.login("a@x.io", "secret1").await.unwrap();

        let principal = auth.validate(&first.token).await.unwrap();
        auth.logout(&principal.token_id).await.unwrap();

        assert!(matches!(
            auth.validate(&first.token).await,
            Err(AppError::InvalidToken)
        ));
        assert!(auth.validate(&second.token).await.is_ok());

        // revoking again is harmless
        auth.logout(&principal.token_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_unknown_token() {
        let (auth, _) = authenticator();
        assert!(matches!(
            auth.logout("never-issued").await,
            Err(AppError::TokenNotFound)
        ));
        assert!(matches!(auth.logout("").await, Err(AppError::TokenNotFound)));
    }

    #[tokio::test]
    async fn test_ledger_expiry_rejects_validly_signed_token() {
        let (auth, store) = authenticator();
        let account = auth.register("a@x.io", "secret1").await.unwrap();

        // signature still valid for an hour, ledger row already lapsed
        let now = Utc::now();
        let claims = Claims {
            uid: account.id,
            jti: generate_token_id(),
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        };
        let token = auth.signer.sign(&claims).unwrap();
        store
            .insert_token(&claims.jti, account.id, now - chrono::Duration::seconds(1))
            .await
            .unwrap();

        assert!(matches!(
            auth.validate(&token).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_expired_signature_rejected() {
        let (auth, store) = authenticator();
        let account = auth.register("a@x.io", "secret1").await.unwrap();
        let now = Utc::now();
        let claims = Claims {
            uid: account.id,
            jti: generate_token_id(),
            iat: now.timestamp() - 7200,
            exp: now.timestamp() - 10,
        };
        let token = auth.signer.sign(&claims).unwrap();
        store
            .insert_token(&claims.jti, account.id, now + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert!(matches!(
            auth.validate(&token).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_unledgered_or_mismatched_token_rejected() {
        let (auth, store) = authenticator();
        let account = auth.register("a@x.io", "secret1").await.unwrap();
        let now = Utc::now();

        // signed with the server key but never recorded
        let ghost = Claims {
            uid: account.id,
            jti: generate_token_id(),
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        };
        let token = auth.signer.sign(&ghost).unwrap();
        assert!(matches!(
            auth.validate(&token).await,
            Err(AppError::InvalidToken)
        ));

        // ledger row belongs to someone else
        let other = auth.register("b@x.io", "secret1").await.unwrap();
        store
            .insert_token(&ghost.jti, other.id, now + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert!(matches!(
            auth.validate(&token).await,
            Err(AppError::InvalidToken)
        ));
    }
}
