//! Common test utilities for workflow integration tests.

// Each test binary compiles this module on its own and uses a subset of it.
#![allow(dead_code)]

use chrono::{Duration, Utc};
use session_service::models::{
    CreateProjectRequest, CreateTaskRequest, LoginRequest, RegisterRequest, TaskPriority,
};
use uuid::Uuid;
use workflow_tests::{build_stack, TestStack};

/// Refresh token lifetime used by the default stack.
pub const WEEK_SECONDS: i64 = 604_800;

/// Password shared by every registered test principal.
pub const PASSWORD: &str = "correct horse battery";

/// Create a freshly wired stack with week-long refresh tokens.
///
/// This is the main entry point for workflow tests.
pub async fn setup() -> TestStack {
    build_stack(WEEK_SECONDS).await
}

/// A unique email address so tests never collide on the live-email rule.
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

pub fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Ada Lovelace".to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
    }
}

pub fn login_request(email: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
    }
}

pub fn project_request(name: &str, owner_id: Uuid) -> CreateProjectRequest {
    CreateProjectRequest {
        name: name.to_string(),
        description: Some("workflow test project".to_string()),
        owner_id,
        start_date: None,
        end_date: None,
    }
}

/// A medium-priority task due a week out, unassigned.
pub fn task_request(title: &str, project_id: Uuid) -> CreateTaskRequest {
    CreateTaskRequest {
        title: title.to_string(),
        description: None,
        due_date: Utc::now() + Duration::days(7),
        priority: TaskPriority::Medium,
        project_id,
        assignee_id: None,
    }
}
