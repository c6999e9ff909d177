//! Storage ports.
//!
//! Durable persistence lives behind these traits. Every row carries a
//! `deleted_at` marker; finders only surface live rows, and uniqueness
//! constraints only count live rows. `soft_delete` answers `false` when no
//! live row matched so callers choose between no-op and `NotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracker_core::error::AppError;
use tracker_core::page::{Page, PageRequest};
use uuid::Uuid;

use crate::models::{Principal, Project, RefreshToken, Task, TaskFilter};

pub mod memory;
pub use memory::InMemoryStore;

#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    /// Fails with `AlreadyExists` when a live row holds the same email
    /// (unique index among live rows).
    async fn insert(&self, principal: Principal) -> Result<Principal, AppError>;
    async fn find_live_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError>;
    async fn find_live_by_email(&self, email: &str) -> Result<Option<Principal>, AppError>;
    async fn email_in_use(&self, email: &str) -> Result<bool, AppError>;
    /// Replaces the live row with the same id. Returns false when it is gone.
    async fn update(&self, principal: &Principal) -> Result<bool, AppError>;
    async fn list_live(&self, page: PageRequest) -> Result<Page<Principal>, AppError>;
    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Fails with `AlreadyExists` when a live row holds the same name.
    async fn insert(&self, project: Project) -> Result<Project, AppError>;
    async fn find_live_by_id(&self, id: Uuid) -> Result<Option<Project>, AppError>;
    async fn name_in_use(&self, name: &str) -> Result<bool, AppError>;
    async fn list_live_by_owner(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Project>, AppError>;
    /// Unpaged variant for the deletion cascade.
    async fn find_all_live_by_owner(&self, owner_id: Uuid) -> Result<Vec<Project>, AppError>;
    async fn update(&self, project: &Project) -> Result<bool, AppError>;
    /// Marks the live row deleted and, as part of the engine's referential
    /// integrity, every live task of the project with it.
    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn insert(&self, task: Task) -> Result<Task, AppError>;
    async fn find_live_by_id(&self, id: Uuid) -> Result<Option<Task>, AppError>;
    async fn list_live(&self, filter: &TaskFilter, page: PageRequest)
        -> Result<Page<Task>, AppError>;
    /// Live tasks past due and not completed, soonest due first.
    async fn list_live_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Task>, AppError>;
    async fn update(&self, task: &Task) -> Result<bool, AppError>;
    async fn soft_delete(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError>;
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, AppError>;
    /// Atomically claims the live row holding `token`: the row is marked
    /// deleted and handed back in one step. Concurrent claims of the same
    /// token see at most one `Some`; implementations back this with a row
    /// lock or a compare-and-set on `deleted_at`.
    async fn claim_live_by_token(
        &self,
        token: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, AppError>;
    /// Soft-deletes every live token of the principal and reports how many
    /// rows that was. Zero is a normal answer.
    async fn soft_delete_live_by_principal(
        &self,
        principal_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;
    async fn find_live_by_principal(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<RefreshToken>, AppError>;
}
