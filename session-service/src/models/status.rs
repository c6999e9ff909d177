//! Shared status and classification enums.

use serde::{Deserialize, Serialize};

/// Lifecycle states for principal accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalStatus {
    Active,
    Blocked,
    Deleted,
}

/// Authority labels a principal can hold. Every account keeps `TeamMember`
/// as the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TeamMember,
    TeamLeader,
    ProjectManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::TeamMember => "team_member",
            Role::TeamLeader => "team_leader",
            Role::ProjectManager => "project_manager",
        }
    }
}

/// Work progression shared by projects and tasks. `Completed` is terminal
/// for projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    ToDo,
    InProgress,
    OnHold,
    Completed,
}

impl WorkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkStatus::ToDo => "to_do",
            WorkStatus::InProgress => "in_progress",
            WorkStatus::OnHold => "on_hold",
            WorkStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}
