use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use tracker_core::error::AppError;
use tracker_core::page::{Page, PageRequest};
use uuid::Uuid;
use validator::Validate;

use super::cache::{self, cache_key, QueryCache, CATEGORY_TASKS};
use crate::models::task::estimated_hours_until;
use crate::models::{CreateTaskRequest, Task, TaskFilter, UpdateTaskRequest, WorkStatus};
use crate::repository::{PrincipalRepository, ProjectRepository, TaskRepository};

/// Task directory. Tasks live under a project and vanish with it; every
/// mutation here drops the whole cached category, the overdue report
/// included.
#[derive(Clone)]
pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
    projects: Arc<dyn ProjectRepository>,
    principals: Arc<dyn PrincipalRepository>,
    cache: Arc<dyn QueryCache>,
    cache_ttl_seconds: i64,
}

impl TaskService {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        projects: Arc<dyn ProjectRepository>,
        principals: Arc<dyn PrincipalRepository>,
        cache: Arc<dyn QueryCache>,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            repo,
            projects,
            principals,
            cache,
            cache_ttl_seconds,
        }
    }

    #[instrument(skip(self, req), fields(project_id = %req.project_id))]
    pub async fn create(&self, req: CreateTaskRequest) -> Result<Task, AppError> {
        req.validate()?;

        // The parent project must be live
        if self
            .projects
            .find_live_by_id(req.project_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "project {} not found",
                req.project_id
            )));
        }
        if let Some(assignee_id) = req.assignee_id {
            self.require_live_principal(assignee_id).await?;
        }

        let task = self.repo.insert(Task::new(req)).await?;
        cache::evict(self.cache.as_ref(), CATEGORY_TASKS).await;
        info!(task_id = %task.id, "task created");

        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, AppError> {
        let key = cache_key(
            CATEGORY_TASKS,
            &format!("list:{}:{}:{}", filter.cache_key_part(), page.page, page.size),
        );
        if let Some(cached) = cache::read_json(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let result = self.repo.list_live(&filter, page).await?;
        cache::write_json(self.cache.as_ref(), &key, &result, self.cache_ttl_seconds).await;

        Ok(result)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Task, AppError> {
        let key = cache_key(CATEGORY_TASKS, &format!("detail:{}", id));
        if let Some(cached) = cache::read_json(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let task = self.require_live(id).await?;
        cache::write_json(self.cache.as_ref(), &key, &task, self.cache_ttl_seconds).await;

        Ok(task)
    }

    /// Live tasks past their due date and not completed, soonest due first.
    /// Cached under a single key that every task mutation drops.
    #[instrument(skip(self))]
    pub async fn list_overdue(&self) -> Result<Vec<Task>, AppError> {
        let key = cache_key(CATEGORY_TASKS, "overdue");
        if let Some(cached) = cache::read_json(self.cache.as_ref(), &key).await {
            return Ok(cached);
        }

        let result = self.repo.list_live_overdue(Utc::now()).await?;
        cache::write_json(self.cache.as_ref(), &key, &result, self.cache_ttl_seconds).await;

        Ok(result)
    }

    #[instrument(skip(self, req), fields(task_id = %id))]
    pub async fn update(&self, id: Uuid, req: UpdateTaskRequest) -> Result<Task, AppError> {
        req.validate()?;

        let mut task = self.require_live(id).await?;

        if let Some(title) = req.title {
            task.title = title;
        }
        if let Some(description) = req.description {
            task.description = Some(description);
        }
        if let Some(due_date) = req.due_date {
            task.due_date = due_date;
            task.estimated_hours = estimated_hours_until(due_date, Utc::now());
        }
        if let Some(priority) = req.priority {
            task.priority = priority;
        }
        task.updated_at = Utc::now();

        self.persist(&task).await?;
        info!(task_id = %task.id, "task updated");

        Ok(task)
    }

    /// Hand the task to a live principal, or clear the assignment.
    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn assign(&self, id: Uuid, assignee_id: Option<Uuid>) -> Result<Task, AppError> {
        let mut task = self.require_live(id).await?;

        if let Some(assignee_id) = assignee_id {
            self.require_live_principal(assignee_id).await?;
        }
        task.assignee_id = assignee_id;
        task.updated_at = Utc::now();

        self.persist(&task).await?;
        info!(task_id = %task.id, "task reassigned");

        Ok(task)
    }

    /// Tasks move freely between statuses; completed work can reopen.
    #[instrument(skip(self), fields(task_id = %id, status = status.as_str()))]
    pub async fn update_status(&self, id: Uuid, status: WorkStatus) -> Result<Task, AppError> {
        let mut task = self.require_live(id).await?;

        task.status = status;
        task.updated_at = Utc::now();

        self.persist(&task).await?;
        info!(task_id = %task.id, status = status.as_str(), "task status changed");

        Ok(task)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.soft_delete(id, Utc::now()).await? {
            return Err(AppError::NotFound(anyhow::anyhow!("task {} not found", id)));
        }

        cache::evict(self.cache.as_ref(), CATEGORY_TASKS).await;
        info!(task_id = %id, "task deleted");

        Ok(())
    }

    async fn require_live(&self, id: Uuid) -> Result<Task, AppError> {
        self.repo
            .find_live_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("task {} not found", id)))
    }

    async fn require_live_principal(&self, id: Uuid) -> Result<(), AppError> {
        if self.principals.find_live_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "principal {} not found",
                id
            )));
        }
        Ok(())
    }

    async fn persist(&self, task: &Task) -> Result<(), AppError> {
        if !self.repo.update(task).await? {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "task {} not found",
                task.id
            )));
        }
        cache::evict(self.cache.as_ref(), CATEGORY_TASKS).await;
        Ok(())
    }
}
