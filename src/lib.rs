//! TimeTrac: personal time-tracking API.
//!
//! Library crate shared by the binary and the integration tests in `tests/`.

use std::sync::Arc;

pub mod api;
pub mod auth;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod store;
pub mod tracker;

use auth::Authenticator;
use store::{CredentialStore, IntervalStore, TokenLedger};
use tracker::SessionTracker;

/// Shared application state passed to handlers and middleware.
/// Built once at startup and never reinitialised.
pub struct AppState {
    pub auth: Authenticator,
    pub tracker: SessionTracker,
    /// Kept for the readiness probe.
    pub credentials: Arc<dyn CredentialStore>,
    pub config: config::Config,
}

impl AppState {
    /// Wire every component to one backing store.
    pub fn new<S>(config: config::Config, store: Arc<S>) -> anyhow::Result<Self>
    where
        S: CredentialStore + TokenLedger + IntervalStore + 'static,
    {
        let credentials: Arc<dyn CredentialStore> = store.clone();
        let ledger: Arc<dyn TokenLedger> = store.clone();
        let intervals: Arc<dyn IntervalStore> = store;

        Ok(Self {
            auth: Authenticator::new(credentials.clone(), ledger, &config)?,
            tracker: SessionTracker::new(intervals),
            credentials,
            config,
        })
    }
}
