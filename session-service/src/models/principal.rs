//! Principal model - the authenticated account entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::Validate;

use crate::models::status::{PrincipalStatus, Role};

/// Principal entity. Email uniqueness holds among live rows only; a
/// soft-deleted row never blocks re-registration of its address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub status: PrincipalStatus,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// Create a new active principal holding the baseline role.
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            status: PrincipalStatus::Active,
            roles: BTreeSet::from([Role::TeamMember]),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Marks the row dead and the account `Deleted`. Idempotent.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(at);
            self.status = PrincipalStatus::Deleted;
            self.updated_at = at;
        }
    }

    /// Convert to a response shape without the credential hash.
    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            status: self.status,
            roles: self.roles.clone(),
            created_at: self.created_at,
        }
    }
}

/// Request to register a new principal.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Request to login with email/password.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Partial profile update. Absent fields stay unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePrincipalRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

/// Principal response for callers (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: PrincipalStatus,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
}

/// Token pair handed out after successful auth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl SessionTokens {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Auth response with principal info and tokens.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub principal: PrincipalSummary,
    pub tokens: SessionTokens,
}
