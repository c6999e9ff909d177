use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};
use tracker_core::error::AppError;
use uuid::Uuid;

use crate::models::RefreshToken;
use crate::repository::RefreshTokenRepository;

/// Issues, rotates, and retires the opaque tokens backing refresh sessions
#[derive(Clone)]
pub struct RefreshTokenStore {
    repo: Arc<dyn RefreshTokenRepository>,
    refresh_token_ttl_seconds: i64,
}

impl RefreshTokenStore {
    pub fn new(repo: Arc<dyn RefreshTokenRepository>, refresh_token_ttl_seconds: i64) -> Self {
        Self {
            repo,
            refresh_token_ttl_seconds,
        }
    }

    /// Issue a fresh token, retiring any live ones first so the principal
    /// holds at most one usable session.
    pub async fn issue(&self, principal_id: Uuid) -> Result<RefreshToken, AppError> {
        let retired = self
            .repo
            .soft_delete_live_by_principal(principal_id, Utc::now())
            .await?;
        if retired > 0 {
            debug!(principal_id = %principal_id, retired, "retired previous session tokens");
        }

        let token = RefreshToken::new(
            principal_id,
            generate_opaque_token(),
            self.refresh_token_ttl_seconds,
        );
        self.repo.insert(token).await
    }

    /// Claim a presented token for rotation.
    ///
    /// The claim retires the row before the expiry check, so a token found
    /// to be stale is spent by the very request that revealed it.
    pub async fn consume(&self, token: &str) -> Result<RefreshToken, AppError> {
        let now = Utc::now();
        let row = self
            .repo
            .claim_live_by_token(token, now)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("refresh token not found")))?;

        if row.is_expired(now) {
            info!(principal_id = %row.principal_id, "presented refresh token had expired");
            return Err(AppError::Expired(anyhow::anyhow!("refresh token expired")));
        }

        Ok(row)
    }

    /// Retire a presented token if it is still live. A token that is
    /// unknown or already retired makes this a no-op, not an error.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.repo.claim_live_by_token(token, Utc::now()).await?;
        Ok(())
    }

    /// Retire every live token a principal holds; returns how many went.
    pub async fn revoke_all_for(&self, principal_id: Uuid) -> Result<u64, AppError> {
        self.repo
            .soft_delete_live_by_principal(principal_id, Utc::now())
            .await
    }
}

fn generate_opaque_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}
