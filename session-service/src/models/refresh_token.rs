use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Refresh token row backing one session. The `token` string is the opaque
/// credential handed to the client; the row stays usable until it expires or
/// is soft-deleted, and consuming it is what retires it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,

    /// Principal this session belongs to
    pub principal_id: Uuid,

    /// Opaque credential string presented by the client
    pub token: String,

    /// When this token expires
    pub expires_at: DateTime<Utc>,

    /// When this token was created
    pub created_at: DateTime<Utc>,

    /// Soft-delete marker; a set value means the token was consumed or
    /// revoked
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn new(principal_id: Uuid, token: String, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            principal_id,
            token,
            expires_at: now + Duration::seconds(ttl_seconds),
            created_at: now,
            deleted_at: None,
        }
    }

    /// A zero-TTL token is expired the instant it is minted.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Marks the row dead. Idempotent; the first timestamp wins.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(at);
        }
    }
}
