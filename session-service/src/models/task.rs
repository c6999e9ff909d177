//! Task model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::status::{TaskPriority, WorkStatus};

/// Task entity, belonging to a project and optionally assigned to a
/// principal. The row disappears with its project through the storage
/// engine's delete cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    /// Whole hours of runway left at creation, derived from the due date.
    pub estimated_hours: i64,
    pub status: WorkStatus,
    pub priority: TaskPriority,
    pub project_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(req: CreateTaskRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            estimated_hours: estimated_hours_until(req.due_date, now),
            status: WorkStatus::ToDo,
            priority: req.priority,
            project_id: req.project_id,
            assignee_id: req.assignee_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Marks the row dead. Idempotent.
    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        if self.deleted_at.is_none() {
            self.deleted_at = Some(at);
            self.updated_at = at;
        }
    }

    /// Past due and still not completed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date < now && self.status != WorkStatus::Completed
    }
}

/// Whole hours between `now` and `due`, floored at zero for past dates.
pub fn estimated_hours_until(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (due - now).num_hours().max(0)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, message = "Task title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub priority: TaskPriority,
    pub project_id: Uuid,
    pub assignee_id: Option<Uuid>,
}

/// Partial update. Absent fields stay unchanged; a new due date re-derives
/// the estimated hours.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "Task title is required"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<TaskPriority>,
}

/// Listing filter. All set fields must match; the default matches
/// everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub status: Option<WorkStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(project_id) = self.project_id {
            if task.project_id != project_id {
                return false;
            }
        }
        if let Some(assignee_id) = self.assignee_id {
            if task.assignee_id != Some(assignee_id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        true
    }

    /// Stable fragment for cache keys within the tasks category.
    pub fn cache_key_part(&self) -> String {
        format!(
            "p={};a={};s={};pr={}",
            self.project_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            self.assignee_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            self.status.map(|s| s.as_str()).unwrap_or("-"),
            self.priority.map(|p| p.as_str()).unwrap_or("-"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_task(due: DateTime<Utc>) -> Task {
        Task::new(CreateTaskRequest {
            title: "write release notes".to_string(),
            description: None,
            due_date: due,
            priority: TaskPriority::Medium,
            project_id: Uuid::new_v4(),
            assignee_id: None,
        })
    }

    #[test]
    fn estimated_hours_floor_at_zero() {
        let now = Utc::now();
        assert_eq!(estimated_hours_until(now - Duration::hours(5), now), 0);
        assert_eq!(estimated_hours_until(now + Duration::hours(36), now), 36);
        // Partial hours round down
        assert_eq!(
            estimated_hours_until(now + Duration::minutes(90), now),
            1
        );
    }

    #[test]
    fn overdue_excludes_completed_work() {
        let now = Utc::now();
        let mut task = sample_task(now - Duration::hours(1));
        assert!(task.is_overdue(now));

        task.status = WorkStatus::Completed;
        assert!(!task.is_overdue(now));

        let future = sample_task(now + Duration::hours(1));
        assert!(!future.is_overdue(now));
    }

    #[test]
    fn filter_combines_all_set_fields() {
        let task = sample_task(Utc::now() + Duration::hours(4));

        assert!(TaskFilter::default().matches(&task));
        assert!(TaskFilter {
            project_id: Some(task.project_id),
            status: Some(WorkStatus::ToDo),
            ..Default::default()
        }
        .matches(&task));
        assert!(!TaskFilter {
            project_id: Some(task.project_id),
            status: Some(WorkStatus::Completed),
            ..Default::default()
        }
        .matches(&task));
        assert!(!TaskFilter {
            assignee_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .matches(&task));
    }

    #[test]
    fn filter_cache_key_is_stable() {
        let filter = TaskFilter {
            status: Some(WorkStatus::InProgress),
            priority: Some(TaskPriority::High),
            ..Default::default()
        };
        assert_eq!(filter.cache_key_part(), "p=-;a=-;s=in_progress;pr=high");
        assert_eq!(TaskFilter::default().cache_key_part(), "p=-;a=-;s=-;pr=-");
    }
}
