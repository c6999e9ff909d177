//! tracker-core: Shared infrastructure for the tracker services.
pub mod config;
pub mod error;
pub mod observability;
pub mod page;

pub use serde;
pub use tracing;
pub use validator;
