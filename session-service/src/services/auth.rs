use std::sync::Arc;
use tracing::info;
use tracker_core::error::AppError;
use validator::Validate;

use super::cache::{self, QueryCache, CATEGORY_PRINCIPALS};
use super::metrics::record_login;
use super::session::SessionManager;
use crate::models::{AuthResponse, LoginRequest, Principal, PrincipalSummary, RegisterRequest};
use crate::repository::PrincipalRepository;
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Credential registration and login, front door to the session layer
#[derive(Clone)]
pub struct AuthService {
    principals: Arc<dyn PrincipalRepository>,
    sessions: SessionManager,
    cache: Arc<dyn QueryCache>,
}

impl AuthService {
    pub fn new(
        principals: Arc<dyn PrincipalRepository>,
        sessions: SessionManager,
        cache: Arc<dyn QueryCache>,
    ) -> Self {
        Self {
            principals,
            sessions,
            cache,
        }
    }

    /// Register a new principal. Registration never opens a session; the
    /// caller logs in separately.
    pub async fn register(&self, req: RegisterRequest) -> Result<PrincipalSummary, AppError> {
        req.validate()?;

        // Check the address is free among live principals
        if self.principals.email_in_use(&req.email).await? {
            return Err(AppError::AlreadyExists(anyhow::anyhow!(
                "email already registered"
            )));
        }

        // Hash password
        let password_hash = hash_password(&Password::new(req.password))
            .map_err(|e| anyhow::anyhow!("Password hashing error: {}", e))?;

        let principal = Principal::new(req.name, req.email, password_hash.into_string());
        let principal = self.principals.insert(principal).await?;

        cache::evict(self.cache.as_ref(), CATEGORY_PRINCIPALS).await;
        info!(principal_id = %principal.id, "principal registered");

        Ok(principal.summary())
    }

    /// Verify a credential pair and open a session.
    ///
    /// An unknown email and a wrong password fail identically; the response
    /// never says which half was bad.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, AppError> {
        req.validate()?;

        // Find the principal by email
        let principal = match self.principals.find_live_by_email(&req.email).await? {
            Some(principal) => principal,
            None => {
                info!(email = %req.email, "login rejected for unknown email");
                record_login("rejected");
                return Err(bad_credentials());
            }
        };

        // Verify password
        let stored = PasswordHashString::new(principal.password_hash.clone());
        if !verify_password(&Password::new(req.password), &stored) {
            info!(principal_id = %principal.id, "login rejected for bad password");
            record_login("rejected");
            return Err(bad_credentials());
        }

        let tokens = self.sessions.open(&principal).await?;
        record_login("accepted");
        info!(principal_id = %principal.id, "session opened");

        Ok(AuthResponse {
            principal: principal.summary(),
            tokens,
        })
    }

    /// Trade a refresh token for a fresh session pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AppError> {
        let (principal, tokens) = self.sessions.refresh(refresh_token).await?;

        Ok(AuthResponse {
            principal: principal.summary(),
            tokens,
        })
    }

    /// Close the presented session. Always succeeds; a stale or unknown
    /// token simply has nothing left to close.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        self.sessions.revoke(refresh_token).await?;
        info!("session closed");
        Ok(())
    }
}

fn bad_credentials() -> AppError {
    AppError::BadCredentials(anyhow::anyhow!("invalid email or password"))
}
