// Ledger entry for an issued access token. The signed JWT only proves who minted
// it; this row decides whether it is still honoured.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IssuedToken {
    pub token_id: String,
    pub account_id: i64,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl IssuedToken {
    /// Usable iff not yet expired and never revoked.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at && self.revoked_at.is_none()
    }
}
