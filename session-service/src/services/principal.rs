use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use tracker_core::error::AppError;
use tracker_core::page::{Page, PageRequest};
use uuid::Uuid;
use validator::Validate;

use super::cache::{self, cache_key, QueryCache, CATEGORY_PRINCIPALS};
use crate::events::{DeletionEvent, NotificationBus};
use crate::models::{Principal, PrincipalSummary, Role, UpdatePrincipalRequest};
use crate::repository::PrincipalRepository;

/// Directory of principals: cached reads, profile updates, role grants,
/// and the deletion that starts the cascade.
#[derive(Clone)]
pub struct PrincipalService {
    repo: Arc<dyn PrincipalRepository>,
    cache: Arc<dyn QueryCache>,
    bus: NotificationBus,
    cache_ttl_seconds: i64,
}

impl PrincipalService {
    pub fn new(
        repo: Arc<dyn PrincipalRepository>,
        cache: Arc<dyn QueryCache>,
        bus: NotificationBus,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            repo,
            cache,
            bus,
            cache_ttl_seconds,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, page: PageRequest) -> Result<Page<PrincipalSummary>, AppError> {
        let key = cache_key(
            CATEGORY_PRINCIPALS,
            &format!("list:{}:{}", page.page, page.size),
        );
        if let Some(cached) = cache::read_json(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let result = self.repo.list_live(page).await?.map(|p| p.summary());
        cache::write_json(self.cache.as_ref(), &key, &result, self.cache_ttl_seconds).await;

        Ok(result)
    }

    #[instrument(skip(self), fields(principal_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<PrincipalSummary, AppError> {
        let key = cache_key(CATEGORY_PRINCIPALS, &format!("detail:{}", id));
        if let Some(cached) = cache::read_json(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let summary = self.require_live(id).await?.summary();
        cache::write_json(self.cache.as_ref(), &key, &summary, self.cache_ttl_seconds).await;

        Ok(summary)
    }

    #[instrument(skip(self, req), fields(principal_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        req: UpdatePrincipalRequest,
    ) -> Result<PrincipalSummary, AppError> {
        req.validate()?;

        let mut principal = self.require_live(id).await?;

        if let Some(email) = req.email {
            if email != principal.email && self.repo.email_in_use(&email).await? {
                return Err(AppError::AlreadyExists(anyhow::anyhow!(
                    "email already registered"
                )));
            }
            principal.email = email;
        }
        if let Some(name) = req.name {
            principal.name = name;
        }
        principal.updated_at = Utc::now();

        self.persist(&principal).await?;
        info!(principal_id = %principal.id, "principal updated");

        Ok(principal.summary())
    }

    #[instrument(skip(self), fields(principal_id = %id, role = role.as_str()))]
    pub async fn add_role(&self, id: Uuid, role: Role) -> Result<PrincipalSummary, AppError> {
        let mut principal = self.require_live(id).await?;

        // Granting a held role changes nothing
        if !principal.roles.insert(role) {
            return Ok(principal.summary());
        }
        principal.updated_at = Utc::now();

        self.persist(&principal).await?;
        info!(principal_id = %principal.id, role = role.as_str(), "role granted");

        Ok(principal.summary())
    }

    #[instrument(skip(self), fields(principal_id = %id, role = role.as_str()))]
    pub async fn remove_role(&self, id: Uuid, role: Role) -> Result<PrincipalSummary, AppError> {
        let mut principal = self.require_live(id).await?;

        // The baseline role cannot be revoked
        if role == Role::TeamMember {
            info!(principal_id = %principal.id, "baseline role retained");
            return Ok(principal.summary());
        }
        if !principal.roles.remove(&role) {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "principal does not hold role {}",
                role.as_str()
            )));
        }
        principal.updated_at = Utc::now();

        self.persist(&principal).await?;
        info!(principal_id = %principal.id, role = role.as_str(), "role revoked");

        Ok(principal.summary())
    }

    /// Soft-delete the principal and announce it. Session teardown and the
    /// ownership cascade run off the published event.
    #[instrument(skip(self), fields(principal_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.soft_delete(id, Utc::now()).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "principal {} not found",
                id
            )));
        }

        cache::evict(self.cache.as_ref(), CATEGORY_PRINCIPALS).await;
        self.bus.publish(DeletionEvent::principal(id)).await;
        info!(principal_id = %id, "principal deleted");

        Ok(())
    }

    async fn require_live(&self, id: Uuid) -> Result<Principal, AppError> {
        self.repo
            .find_live_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("principal {} not found", id)))
    }

    async fn persist(&self, principal: &Principal) -> Result<(), AppError> {
        if !self.repo.update(principal).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "principal {} not found",
                principal.id
            )));
        }
        cache::evict(self.cache.as_ref(), CATEGORY_PRINCIPALS).await;
        Ok(())
    }
}
