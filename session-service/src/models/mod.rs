pub mod principal;
pub mod project;
pub mod refresh_token;
pub mod status;
pub mod task;

pub use principal::{
    AuthResponse, LoginRequest, Principal, PrincipalSummary, RegisterRequest, SessionTokens,
    UpdatePrincipalRequest,
};
pub use project::{CreateProjectRequest, Project, UpdateProjectRequest};
pub use refresh_token::RefreshToken;
pub use status::{PrincipalStatus, Role, TaskPriority, WorkStatus};
pub use task::{CreateTaskRequest, Task, TaskFilter, UpdateTaskRequest};
