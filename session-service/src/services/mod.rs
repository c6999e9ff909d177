//! Services layer for session-service.
//!
//! Business logic for credential auth, session rotation, the principal,
//! project, and task directories, and the consistency propagation that
//! follows a deletion.

mod auth;
pub mod cache;
mod jwt;
pub mod metrics;
mod principal;
mod project;
mod propagator;
mod session;
mod task;
mod tokens;

pub use auth::AuthService;
pub use cache::{FailingCache, MemoryCache, QueryCache, RedisCache};
pub use jwt::{AccessClaims, TokenCodec};
pub use principal::PrincipalService;
pub use project::ProjectService;
pub use propagator::ConsistencyPropagator;
pub use session::SessionManager;
pub use task::TaskService;
pub use tokens::RefreshTokenStore;
