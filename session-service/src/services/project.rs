use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use tracker_core::error::AppError;
use tracker_core::page::{Page, PageRequest};
use uuid::Uuid;
use validator::Validate;

use super::cache::{self, cache_key, QueryCache, CATEGORY_PROJECTS};
use crate::events::{DeletionEvent, NotificationBus};
use crate::models::{CreateProjectRequest, Project, UpdateProjectRequest, WorkStatus};
use crate::repository::{PrincipalRepository, ProjectRepository};

/// Project directory. Names are unique among live projects; `Completed`
/// is a terminal status.
#[derive(Clone)]
pub struct ProjectService {
    repo: Arc<dyn ProjectRepository>,
    principals: Arc<dyn PrincipalRepository>,
    cache: Arc<dyn QueryCache>,
    bus: NotificationBus,
    cache_ttl_seconds: i64,
}

impl ProjectService {
    pub fn new(
        repo: Arc<dyn ProjectRepository>,
        principals: Arc<dyn PrincipalRepository>,
        cache: Arc<dyn QueryCache>,
        bus: NotificationBus,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            repo,
            principals,
            cache,
            bus,
            cache_ttl_seconds,
        }
    }

    #[instrument(skip(self, req), fields(owner_id = %req.owner_id))]
    pub async fn create(&self, req: CreateProjectRequest) -> Result<Project, AppError> {
        req.validate()?;

        // The owner must be a live principal
        if self
            .principals
            .find_live_by_id(req.owner_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "principal {} not found",
                req.owner_id
            )));
        }

        if self.repo.name_in_use(&req.name).await? {
            return Err(AppError::AlreadyExists(anyhow::anyhow!(
                "project name already in use"
            )));
        }

        let project = self.repo.insert(Project::new(req)).await?;
        cache::evict(self.cache.as_ref(), CATEGORY_PROJECTS).await;
        info!(project_id = %project.id, "project created");

        Ok(project)
    }

    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn list_by_owner(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Project>, AppError> {
        let key = cache_key(
            CATEGORY_PROJECTS,
            &format!("list:{}:{}:{}", owner_id, page.page, page.size),
        );
        if let Some(cached) = cache::read_json(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let result = self.repo.list_live_by_owner(owner_id, page).await?;
        cache::write_json(self.cache.as_ref(), &key, &result, self.cache_ttl_seconds).await;

        Ok(result)
    }

    #[instrument(skip(self), fields(project_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Project, AppError> {
        let key = cache_key(CATEGORY_PROJECTS, &format!("detail:{}", id));
        if let Some(cached) = cache::read_json(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let project = self.require_live(id).await?;
        cache::write_json(self.cache.as_ref(), &key, &project, self.cache_ttl_seconds).await;

        Ok(project)
    }

    #[instrument(skip(self, req), fields(project_id = %id))]
    pub async fn update(&self, id: Uuid, req: UpdateProjectRequest) -> Result<Project, AppError> {
        req.validate()?;

        let mut project = self.require_live(id).await?;

        if let Some(name) = req.name {
            if name != project.name && self.repo.name_in_use(&name).await? {
                return Err(AppError::AlreadyExists(anyhow::anyhow!(
                    "project name already in use"
                )));
            }
            project.name = name;
        }
        if let Some(description) = req.description {
            project.description = Some(description);
        }
        if let Some(start_date) = req.start_date {
            project.start_date = Some(start_date);
        }
        if let Some(end_date) = req.end_date {
            project.end_date = Some(end_date);
        }
        project.updated_at = Utc::now();

        self.persist(&project).await?;
        info!(project_id = %project.id, "project updated");

        Ok(project)
    }

    /// Move the project to a new status. A completed project is frozen;
    /// any further transition is a conflict.
    #[instrument(skip(self), fields(project_id = %id, status = status.as_str()))]
    pub async fn update_status(&self, id: Uuid, status: WorkStatus) -> Result<Project, AppError> {
        let mut project = self.require_live(id).await?;

        if project.status == WorkStatus::Completed {
            return Err(AppError::StatusConflict(anyhow::anyhow!(
                "project {} is completed and cannot change status",
                id
            )));
        }
        project.status = status;
        project.updated_at = Utc::now();

        self.persist(&project).await?;
        info!(project_id = %project.id, status = status.as_str(), "project status changed");

        Ok(project)
    }

    /// Soft-delete the project and announce it. The storage engine takes
    /// the project's tasks down in the same operation; listeners handle
    /// the cached reads.
    #[instrument(skip(self), fields(project_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.soft_delete(id, Utc::now()).await? {
            return Err(AppError::NotFound(anyhow::anyhow!("project {} not found", id)));
        }

        cache::evict(self.cache.as_ref(), CATEGORY_PROJECTS).await;
        self.bus.publish(DeletionEvent::project(id)).await;
        info!(project_id = %id, "project deleted");

        Ok(())
    }

    async fn require_live(&self, id: Uuid) -> Result<Project, AppError> {
        self.repo
            .find_live_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("project {} not found", id)))
    }

    async fn persist(&self, project: &Project) -> Result<(), AppError> {
        if !self.repo.update(project).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "project {} not found",
                project.id
            )));
        }
        cache::evict(self.cache.as_ref(), CATEGORY_PROJECTS).await;
        Ok(())
    }
}
