//! Deletion-event listener that keeps the rest of the system consistent
//! with a soft delete: sessions close with their principal, owned projects
//! go down with their owner, and the affected cache categories are dropped.
//!
//! Handlers are idempotent; replaying an event finds nothing left to do.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::cache::{self, QueryCache, CATEGORY_PROJECTS, CATEGORY_TASKS};
use super::metrics::record_cascade;
use super::tokens::RefreshTokenStore;
use crate::events::{DeletionEvent, DeletionListener, EntityKind, NotificationBus};
use crate::repository::ProjectRepository;

pub struct ConsistencyPropagator {
    projects: Arc<dyn ProjectRepository>,
    refresh_tokens: RefreshTokenStore,
    cache: Arc<dyn QueryCache>,
}

impl ConsistencyPropagator {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        refresh_tokens: RefreshTokenStore,
        cache: Arc<dyn QueryCache>,
    ) -> Self {
        Self {
            projects,
            refresh_tokens,
            cache,
        }
    }

    async fn on_principal_deleted(
        &self,
        principal_id: Uuid,
        bus: &NotificationBus,
    ) -> Result<(), anyhow::Error> {
        // Close every session the principal still held
        let retired = self.refresh_tokens.revoke_all_for(principal_id).await?;
        record_cascade("session", retired);
        if retired > 0 {
            info!(principal_id = %principal_id, retired, "sessions closed with their principal");
        }

        // Take down the principal's projects, announcing each one so the
        // project-level cleanup runs for them too
        let now = Utc::now();
        for project in self.projects.find_all_live_by_owner(principal_id).await? {
            if self.projects.soft_delete(project.id, now).await? {
                record_cascade("project", 1);
                info!(
                    project_id = %project.id,
                    owner_id = %principal_id,
                    "project removed with its owner"
                );
                bus.publish(DeletionEvent::project(project.id)).await;
            }
        }

        cache::evict(self.cache.as_ref(), CATEGORY_PROJECTS).await;

        Ok(())
    }

    async fn on_project_deleted(&self, project_id: Uuid) -> Result<(), anyhow::Error> {
        // Row-level task cleanup is the storage engine's contract; only the
        // cached reads need dropping here.
        cache::evict(self.cache.as_ref(), CATEGORY_TASKS).await;
        debug!(project_id = %project_id, "task reads dropped for deleted project");

        Ok(())
    }
}

#[async_trait]
impl DeletionListener for ConsistencyPropagator {
    async fn on_deletion(
        &self,
        event: DeletionEvent,
        bus: &NotificationBus,
    ) -> Result<(), anyhow::Error> {
        match event.kind {
            EntityKind::Principal => self.on_principal_deleted(event.id, bus).await,
            EntityKind::Project => self.on_project_deleted(event.id).await,
        }
    }
}
