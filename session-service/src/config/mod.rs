use std::env;
use tracker_core::config::{get_env, Environment};
use tracker_core::error::AppError;

/// Runtime configuration for the session service.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub redis_url: String,
    pub token: TokenConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HS256 signing secret, base64-encoded or raw bytes.
    pub signing_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub entry_ttl_seconds: i64,
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment.is_prod();

        let config = SessionConfig {
            environment,
            service_name: get_env("SERVICE_NAME", Some("session-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            redis_url: get_env("REDIS_URL", Some("redis://127.0.0.1:6379"), is_prod)?,
            token: TokenConfig {
                signing_secret: get_env(
                    "TOKEN_SIGNING_SECRET",
                    Some("dev-signing-secret-change-me"),
                    is_prod,
                )?,
                access_token_ttl_seconds: get_env(
                    "ACCESS_TOKEN_TTL_SECONDS",
                    Some("900"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
                refresh_token_ttl_seconds: get_env(
                    "REFRESH_TOKEN_TTL_SECONDS",
                    Some("604800"),
                    is_prod,
                )?
                .parse()
                .map_err(|e: std::num::ParseIntError| {
                    AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                })?,
            },
            cache: CacheConfig {
                entry_ttl_seconds: get_env("CACHE_ENTRY_TTL_SECONDS", Some("600"), is_prod)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!(e.to_string()))
                    })?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.token.access_token_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ACCESS_TOKEN_TTL_SECONDS must be positive"
            )));
        }

        if self.token.refresh_token_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REFRESH_TOKEN_TTL_SECONDS must be positive"
            )));
        }

        if self.cache.entry_ttl_seconds <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CACHE_ENTRY_TTL_SECONDS must be positive"
            )));
        }

        // In production the dev fallback secret must never survive
        if self.environment.is_prod() && self.token.signing_secret.len() < 32 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_SIGNING_SECRET must be at least 32 bytes in production"
            )));
        }

        Ok(())
    }
}
