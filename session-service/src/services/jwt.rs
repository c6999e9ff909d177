use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracker_core::error::AppError;

use crate::config::TokenConfig;

/// Signs and parses the short-lived access tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_seconds: i64,
}

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (principal email)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl AccessClaims {
    /// Expiry check is the caller's job; `TokenCodec::parse` only proves the
    /// signature, so a stale-but-genuine token still yields its claims.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

impl TokenCodec {
    /// Build a codec from the configured signing secret.
    ///
    /// The secret is treated as base64 when it decodes cleanly, raw bytes
    /// otherwise, so both generated and hand-set secrets work.
    pub fn new(config: &TokenConfig) -> Self {
        let key_bytes = match STANDARD.decode(config.signing_secret.as_bytes()) {
            Ok(decoded) => decoded,
            Err(_) => config.signing_secret.clone().into_bytes(),
        };

        tracing::info!("access token codec initialized with HS256 key");

        Self {
            encoding_key: EncodingKey::from_secret(&key_bytes),
            decoding_key: DecodingKey::from_secret(&key_bytes),
            access_token_ttl_seconds: config.access_token_ttl_seconds,
        }
    }

    /// Generate an access token for a subject
    pub fn generate(&self, subject: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_ttl_seconds);

        let claims = AccessClaims {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok(token)
    }

    /// Verify the signature and decode the claims.
    ///
    /// Expiry is deliberately not enforced here; a signature failure means a
    /// forged or corrupted token, which callers must treat differently from
    /// a merely stale one.
    pub fn parse(&self, token: &str) -> Result<AccessClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Access token lifetime in seconds (for client info)
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }
}
