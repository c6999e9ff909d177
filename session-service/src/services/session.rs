use std::sync::Arc;
use tracing::info;
use tracker_core::error::AppError;
use uuid::Uuid;

use super::jwt::TokenCodec;
use super::metrics::record_rotation;
use super::tokens::RefreshTokenStore;
use crate::models::{Principal, SessionTokens};
use crate::repository::PrincipalRepository;

/// Pairs short-lived access tokens with their rotating refresh credential
#[derive(Clone)]
pub struct SessionManager {
    principals: Arc<dyn PrincipalRepository>,
    codec: TokenCodec,
    refresh_tokens: RefreshTokenStore,
}

impl SessionManager {
    pub fn new(
        principals: Arc<dyn PrincipalRepository>,
        codec: TokenCodec,
        refresh_tokens: RefreshTokenStore,
    ) -> Self {
        Self {
            principals,
            codec,
            refresh_tokens,
        }
    }

    /// Open a session for a verified principal. Issuing the refresh
    /// credential retires any session the principal already held.
    pub async fn open(&self, principal: &Principal) -> Result<SessionTokens, AppError> {
        let access_token = self.codec.generate(&principal.email)?;
        let refresh = self.refresh_tokens.issue(principal.id).await?;

        Ok(SessionTokens::new(
            access_token,
            refresh.token,
            self.codec.access_token_ttl_seconds(),
        ))
    }

    /// Rotate a session: spend the presented refresh token and hand back a
    /// fresh pair. The spent token stays spent even when rotation fails
    /// afterwards, so a rejected request cannot be replayed.
    pub async fn refresh(&self, token: &str) -> Result<(Principal, SessionTokens), AppError> {
        let row = match self.refresh_tokens.consume(token).await {
            Ok(row) => row,
            Err(e) => {
                record_rotation("rejected");
                return Err(e);
            }
        };

        let principal = match self.principals.find_live_by_id(row.principal_id).await? {
            Some(principal) => principal,
            None => {
                record_rotation("rejected");
                return Err(AppError::NotFound(anyhow::anyhow!(
                    "principal for session no longer exists"
                )));
            }
        };

        let tokens = self.open(&principal).await?;
        record_rotation("rotated");
        info!(principal_id = %principal.id, "session rotated");

        Ok((principal, tokens))
    }

    /// Close the session holding this refresh token; a no-op when the token
    /// is unknown or already spent.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.refresh_tokens.revoke(token).await
    }

    /// Close every session a principal holds.
    pub async fn revoke_all_for(&self, principal_id: Uuid) -> Result<u64, AppError> {
        self.refresh_tokens.revoke_all_for(principal_id).await
    }
}
