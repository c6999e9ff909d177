//! Directory tests.
//!
//! Principal, project, and task management over the wired stack: role
//! grants with the baseline floor, profile and schedule updates flowing
//! through the cached reads, derived estimates, and filtered listings.

mod common;

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, Utc};
use session_service::models::{
    Role, TaskFilter, TaskPriority, UpdatePrincipalRequest, UpdateProjectRequest, WorkStatus,
};
use tracker_core::error::AppError;
use tracker_core::page::PageRequest;

/// Test: every account keeps the baseline role no matter what is granted
/// or revoked around it.
#[tokio::test]
async fn baseline_role_floor_holds_through_grant_and_revoke() {
    let stack = common::setup().await;
    let summary = stack
        .auth
        .register(common::register_request(&common::unique_email("roles")))
        .await
        .expect("registration succeeds");
    assert_eq!(summary.roles, BTreeSet::from([Role::TeamMember]));

    let summary = stack
        .principals
        .add_role(summary.id, Role::TeamLeader)
        .await
        .expect("grant succeeds");
    assert_eq!(
        summary.roles,
        BTreeSet::from([Role::TeamMember, Role::TeamLeader])
    );

    // Granting a held role changes nothing
    let summary = stack
        .principals
        .add_role(summary.id, Role::TeamLeader)
        .await
        .expect("repeat grant succeeds");
    assert_eq!(summary.roles.len(), 2);

    // The baseline cannot be revoked
    let summary = stack
        .principals
        .remove_role(summary.id, Role::TeamMember)
        .await
        .expect("revoking the baseline is a quiet no-op");
    assert!(summary.roles.contains(&Role::TeamMember));

    // Revoking a role the account never held is an error
    assert!(matches!(
        stack
            .principals
            .remove_role(summary.id, Role::ProjectManager)
            .await,
        Err(AppError::NotFound(_))
    ));

    let summary = stack
        .principals
        .remove_role(summary.id, Role::TeamLeader)
        .await
        .expect("revoke succeeds");
    assert_eq!(summary.roles, BTreeSet::from([Role::TeamMember]));
}

/// Test: profile and schedule updates land in the next cached read.
#[tokio::test]
async fn updates_flow_through_cached_reads() {
    let stack = common::setup().await;
    let summary = stack
        .auth
        .register(common::register_request(&common::unique_email("profile")))
        .await
        .expect("registration succeeds");

    // Prime the detail reads
    stack.principals.get(summary.id).await.expect("detail read");
    let new_email = common::unique_email("renamed");
    stack
        .principals
        .update(
            summary.id,
            UpdatePrincipalRequest {
                name: Some("Grace Hopper".to_string()),
                email: Some(new_email.clone()),
            },
        )
        .await
        .expect("profile update succeeds");
    let fetched = stack.principals.get(summary.id).await.expect("detail read");
    assert_eq!(fetched.name, "Grace Hopper");
    assert_eq!(fetched.email, new_email);

    let project = stack
        .projects
        .create(common::project_request("Schedule", summary.id))
        .await
        .expect("project creation succeeds");
    stack.projects.get(project.id).await.expect("detail read");

    let start = NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date");
    let end = NaiveDate::from_ymd_opt(2025, 9, 30).expect("valid date");
    stack
        .projects
        .update(
            project.id,
            UpdateProjectRequest {
                start_date: Some(start),
                end_date: Some(end),
                ..Default::default()
            },
        )
        .await
        .expect("schedule update succeeds");
    let fetched = stack.projects.get(project.id).await.expect("detail read");
    assert_eq!(fetched.start_date, Some(start));
    assert_eq!(fetched.end_date, Some(end));
}

/// Test: the estimate is the whole hours of runway left at creation.
#[tokio::test]
async fn task_creation_derives_the_estimate_from_the_due_date() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("estimate")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Estimates", owner.id))
        .await
        .expect("project creation succeeds");

    let mut req = common::task_request("size me", project.id);
    req.due_date = Utc::now() + Duration::hours(35) + Duration::minutes(30);
    let task = stack.tasks.create(req).await.expect("task creation succeeds");

    // Partial hours round down
    assert_eq!(task.estimated_hours, 35);
}

/// Test: deleting an assignee leaves the task in place with its stale
/// assignment; only a fresh assignment to the dead account is refused.
#[tokio::test]
async fn assignment_survives_the_assignees_deletion() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("owner")))
        .await
        .expect("registration succeeds");
    let assignee = stack
        .auth
        .register(common::register_request(&common::unique_email("assignee")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Handoff", owner.id))
        .await
        .expect("project creation succeeds");

    let mut req = common::task_request("orphaned work", project.id);
    req.assignee_id = Some(assignee.id);
    let task = stack.tasks.create(req).await.expect("task creation succeeds");

    stack
        .principals
        .delete(assignee.id)
        .await
        .expect("assignee deletion succeeds");

    // The task keeps pointing at the deleted account
    let fetched = stack.tasks.get(task.id).await.expect("task survives");
    assert_eq!(fetched.assignee_id, Some(assignee.id));
    let listed = stack
        .tasks
        .list(
            TaskFilter {
                assignee_id: Some(assignee.id),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .expect("filtered listing succeeds");
    assert_eq!(listed.total, 1);

    // Re-assigning to the dead account is refused; clearing works
    assert!(matches!(
        stack.tasks.assign(task.id, Some(assignee.id)).await,
        Err(AppError::NotFound(_))
    ));
    let cleared = stack
        .tasks
        .assign(task.id, None)
        .await
        .expect("clearing succeeds");
    assert_eq!(cleared.assignee_id, None);
}

/// Test: filtered listings page over the matching rows only.
#[tokio::test]
async fn filtered_listings_page_over_matching_rows() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("paging")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Paging", owner.id))
        .await
        .expect("project creation succeeds");

    for title in ["alpha", "beta", "gamma"] {
        let mut req = common::task_request(title, project.id);
        req.priority = TaskPriority::High;
        stack.tasks.create(req).await.expect("task creation succeeds");
    }
    let mut low = common::task_request("delta", project.id);
    low.priority = TaskPriority::Low;
    stack.tasks.create(low).await.expect("task creation succeeds");

    let filter = TaskFilter {
        priority: Some(TaskPriority::High),
        ..Default::default()
    };
    let first = stack
        .tasks
        .list(filter, PageRequest::new(0, 2))
        .await
        .expect("first page succeeds");
    let second = stack
        .tasks
        .list(filter, PageRequest::new(1, 2))
        .await
        .expect("second page succeeds");

    assert_eq!(first.total, 3);
    assert_eq!(first.items.len(), 2);
    assert_eq!(second.total, 3);
    assert_eq!(second.items.len(), 1);

    let mut titles: Vec<String> = first
        .items
        .iter()
        .chain(second.items.iter())
        .map(|t| t.title.clone())
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["alpha", "beta", "gamma"]);
}

/// Test: completed projects are frozen while tasks reopen freely.
#[tokio::test]
async fn completion_freezes_projects_but_not_tasks() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("freeze")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Freeze", owner.id))
        .await
        .expect("project creation succeeds");
    let task = stack
        .tasks
        .create(common::task_request("thaw me", project.id))
        .await
        .expect("task creation succeeds");

    stack
        .projects
        .update_status(project.id, WorkStatus::Completed)
        .await
        .expect("completion succeeds");
    assert!(matches!(
        stack
            .projects
            .update_status(project.id, WorkStatus::InProgress)
            .await,
        Err(AppError::StatusConflict(_))
    ));
    let fetched = stack.projects.get(project.id).await.expect("detail read");
    assert_eq!(fetched.status, WorkStatus::Completed);

    // Tasks are free to move back and forth
    stack
        .tasks
        .update_status(task.id, WorkStatus::Completed)
        .await
        .expect("task completion succeeds");
    let reopened = stack
        .tasks
        .update_status(task.id, WorkStatus::InProgress)
        .await
        .expect("task reopen succeeds");
    assert_eq!(reopened.status, WorkStatus::InProgress);
}
