//! session-service: session and data-consistency core for the tracker
//! platform.
//!
//! Credential authentication issues short-lived signed access tokens next to
//! rotating single-use refresh tokens. Entity removal is soft everywhere and
//! propagated through in-process deletion events, while query results are
//! memoized under coarse cache categories that any mutation drops wholesale.
pub mod config;
pub mod events;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;
