//! Workflow integration tests library.
//!
//! Wires the full session stack over the in-memory engine so tests can run
//! complete login, deletion, and cache flows in one process, without any
//! external services.

use async_trait::async_trait;
use session_service::config::TokenConfig;
use session_service::events::{DeletionEvent, DeletionListener, NotificationBus};
use session_service::repository::InMemoryStore;
use session_service::services::{
    AuthService, ConsistencyPropagator, MemoryCache, PrincipalService, ProjectService, QueryCache,
    RefreshTokenStore, SessionManager, TaskService, TokenCodec,
};
use std::sync::{Arc, Mutex, Once};

/// Cache TTL used across the stack; long enough that entries only leave by
/// eviction during a test.
pub const CACHE_TTL_SECONDS: i64 = 600;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// The full stack wired over one in-memory engine and one cache.
///
/// Each test builds its own stack for isolation.
pub struct TestStack {
    pub store: Arc<InMemoryStore>,
    pub cache: Arc<dyn QueryCache>,
    pub bus: NotificationBus,
    pub codec: TokenCodec,
    pub auth: AuthService,
    pub sessions: SessionManager,
    pub principals: PrincipalService,
    pub projects: ProjectService,
    pub tasks: TaskService,
}

/// Build the stack with the default in-memory cache.
pub async fn build_stack(refresh_token_ttl_seconds: i64) -> TestStack {
    build_stack_with_cache(refresh_token_ttl_seconds, Arc::new(MemoryCache::new())).await
}

/// Build the stack over a caller-picked cache; a `FailingCache` here
/// exercises the degraded read paths.
pub async fn build_stack_with_cache(
    refresh_token_ttl_seconds: i64,
    cache: Arc<dyn QueryCache>,
) -> TestStack {
    build_stack_with_cache_ttl(refresh_token_ttl_seconds, cache, CACHE_TTL_SECONDS).await
}

/// Build the stack with an explicit cache entry TTL, for tests that watch
/// entries lapse in real time.
pub async fn build_stack_with_cache_ttl(
    refresh_token_ttl_seconds: i64,
    cache: Arc<dyn QueryCache>,
    cache_ttl_seconds: i64,
) -> TestStack {
    init_tracing();

    let store = Arc::new(InMemoryStore::new());
    let bus = NotificationBus::new();
    let codec = TokenCodec::new(&TokenConfig {
        signing_secret: "workflow-tests-signing-secret".to_string(),
        access_token_ttl_seconds: 900,
        refresh_token_ttl_seconds,
    });

    let refresh_tokens = RefreshTokenStore::new(store.clone(), refresh_token_ttl_seconds);
    let sessions = SessionManager::new(store.clone(), codec.clone(), refresh_tokens.clone());
    let auth = AuthService::new(store.clone(), sessions.clone(), cache.clone());
    let principals = PrincipalService::new(
        store.clone(),
        cache.clone(),
        bus.clone(),
        cache_ttl_seconds,
    );
    let projects = ProjectService::new(
        store.clone(),
        store.clone(),
        cache.clone(),
        bus.clone(),
        cache_ttl_seconds,
    );
    let tasks = TaskService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        cache.clone(),
        cache_ttl_seconds,
    );

    bus.subscribe(Arc::new(ConsistencyPropagator::new(
        store.clone(),
        refresh_tokens,
        cache.clone(),
    )))
    .await;

    tracing::debug!("test stack wired");

    TestStack {
        store,
        cache,
        bus,
        codec,
        auth,
        sessions,
        principals,
        projects,
        tasks,
    }
}

/// Listener that records every event it sees, for asserting what the bus
/// delivered and in which order.
#[derive(Default)]
pub struct RecordingListener {
    seen: Mutex<Vec<DeletionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<DeletionEvent> {
        self.seen.lock().expect("recorder mutex poisoned").clone()
    }
}

#[async_trait]
impl DeletionListener for RecordingListener {
    async fn on_deletion(
        &self,
        event: DeletionEvent,
        _bus: &NotificationBus,
    ) -> Result<(), anyhow::Error> {
        self.seen.lock().expect("recorder mutex poisoned").push(event);
        Ok(())
    }
}
