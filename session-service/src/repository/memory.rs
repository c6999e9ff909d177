//! In-memory storage engine.
//!
//! Stands in for the durable store in tests and single-process deployments.
//! It honors the same contracts the ports document: live-row filtering,
//! uniqueness among live rows, the atomic refresh-token claim, and the
//! project-to-task delete cascade.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracker_core::error::AppError;
use tracker_core::page::{Page, PageRequest};
use uuid::Uuid;

use super::{PrincipalRepository, ProjectRepository, RefreshTokenRepository, TaskRepository};
use crate::models::{Principal, Project, RefreshToken, Task, TaskFilter};

#[derive(Default)]
struct Inner {
    principals: HashMap<Uuid, Principal>,
    projects: HashMap<Uuid, Project>,
    tasks: HashMap<Uuid, Task>,
    refresh_tokens: Vec<RefreshToken>,
}

/// Single-mutex engine; every operation is one critical section, which is
/// what makes the claim and cascade contracts atomic here.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|e| AppError::StorageError(anyhow::anyhow!("store mutex poisoned: {}", e)))
    }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.size as usize)
        .collect();
    Page::new(items, page, total)
}

#[async_trait]
impl PrincipalRepository for InMemoryStore {
    async fn insert(&self, principal: Principal) -> Result<Principal, AppError> {
        let mut inner = self.lock()?;
        if inner
            .principals
            .values()
            .any(|p| p.is_live() && p.email == principal.email)
        {
            return Err(AppError::AlreadyExists(anyhow::anyhow!(
                "email already registered"
            )));
        }
        inner.principals.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn find_live_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        let inner = self.lock()?;
        Ok(inner.principals.get(&id).filter(|p| p.is_live()).cloned())
    }

    async fn find_live_by_email(&self, email: &str) -> Result<Option<Principal>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .principals
            .values()
            .find(|p| p.is_live() && p.email == email)
            .cloned())
    }

    async fn email_in_use(&self, email: &str) -> Result<bool, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .principals
            .values()
            .any(|p| p.is_live() && p.email == email))
    }

    async fn update(&self, principal: &Principal) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.principals.get_mut(&principal.id) {
            Some(row) if row.is_live() => {
                *row = principal.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_live(&self, page: PageRequest) -> Result<Page<Principal>, AppError> {
        let inner = self.lock()?;
        let mut live: Vec<Principal> = inner
            .principals
            .values()
            .filter(|p| p.is_live())
            .cloned()
            .collect();
        live.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(live, page))
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.principals.get_mut(&id) {
            Some(row) if row.is_live() => {
                row.soft_delete(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn insert(&self, project: Project) -> Result<Project, AppError> {
        let mut inner = self.lock()?;
        if inner
            .projects
            .values()
            .any(|p| p.is_live() && p.name == project.name)
        {
            return Err(AppError::AlreadyExists(anyhow::anyhow!(
                "project name already in use"
            )));
        }
        inner.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn find_live_by_id(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        let inner = self.lock()?;
        Ok(inner.projects.get(&id).filter(|p| p.is_live()).cloned())
    }

    async fn name_in_use(&self, name: &str) -> Result<bool, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .projects
            .values()
            .any(|p| p.is_live() && p.name == name))
    }

    async fn list_live_by_owner(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Project>, AppError> {
        let inner = self.lock()?;
        let mut owned: Vec<Project> = inner
            .projects
            .values()
            .filter(|p| p.is_live() && p.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(owned, page))
    }

    async fn find_all_live_by_owner(&self, owner_id: Uuid) -> Result<Vec<Project>, AppError> {
        let inner = self.lock()?;
        let mut owned: Vec<Project> = inner
            .projects
            .values()
            .filter(|p| p.is_live() && p.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn update(&self, project: &Project) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.projects.get_mut(&project.id) {
            Some(row) if row.is_live() => {
                *row = project.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.projects.get_mut(&id) {
            Some(row) if row.is_live() => row.soft_delete(at),
            _ => return Ok(false),
        }
        // Delete cascade: the project's live tasks go with it
        for task in inner.tasks.values_mut() {
            if task.project_id == id && task.is_live() {
                task.soft_delete(at);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn insert(&self, task: Task) -> Result<Task, AppError> {
        let mut inner = self.lock()?;
        inner.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn find_live_by_id(&self, id: Uuid) -> Result<Option<Task>, AppError> {
        let inner = self.lock()?;
        Ok(inner.tasks.get(&id).filter(|t| t.is_live()).cloned())
    }

    async fn list_live(
        &self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> Result<Page<Task>, AppError> {
        let inner = self.lock()?;
        let mut matching: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.is_live() && filter.matches(t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(matching, page))
    }

    async fn list_live_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, AppError> {
        let inner = self.lock()?;
        let mut overdue: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.is_live() && t.is_overdue(now))
            .cloned()
            .collect();
        overdue.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(overdue)
    }

    async fn update(&self, task: &Task) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.tasks.get_mut(&task.id) {
            Some(row) if row.is_live() => {
                *row = task.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        match inner.tasks.get_mut(&id) {
            Some(row) if row.is_live() => {
                row.soft_delete(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, AppError> {
        let mut inner = self.lock()?;
        inner.refresh_tokens.push(token.clone());
        Ok(token)
    }

    async fn claim_live_by_token(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, AppError> {
        let mut inner = self.lock()?;
        for row in inner.refresh_tokens.iter_mut() {
            if row.is_live() && row.token == token {
                row.soft_delete(at);
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }

    async fn soft_delete_live_by_principal(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut inner = self.lock()?;
        let mut retired = 0;
        for row in inner.refresh_tokens.iter_mut() {
            if row.is_live() && row.principal_id == principal_id {
                row.soft_delete(at);
                retired += 1;
            }
        }
        Ok(retired)
    }

    async fn find_live_by_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<RefreshToken>, AppError> {
        let inner = self.lock()?;
        Ok(inner
            .refresh_tokens
            .iter()
            .filter(|t| t.is_live() && t.principal_id == principal_id)
            .cloned()
            .collect())
    }
}
