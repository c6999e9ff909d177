//! Cache consistency tests.
//!
//! Query results are memoized under coarse categories and every mutation
//! drops its whole category. These tests pin down both halves: mutations
//! through the services are immediately visible, while writes that bypass
//! the services stay hidden until the next eviction.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use session_service::models::{Task, TaskFilter, UpdateProjectRequest};
use session_service::repository::{ProjectRepository, TaskRepository};
use session_service::services::cache::{cache_key, CATEGORY_TASKS};
use session_service::services::{MemoryCache, QueryCache};
use tracker_core::page::PageRequest;
use workflow_tests::{build_stack_with_cache_ttl, CACHE_TTL_SECONDS};

/// Cache whose reads and writes work but whose evictions always fail,
/// so primed entries only leave by TTL.
struct StuckEvictionCache {
    inner: MemoryCache,
}

impl StuckEvictionCache {
    fn new() -> Self {
        Self {
            inner: MemoryCache::new(),
        }
    }
}

#[async_trait]
impl QueryCache for StuckEvictionCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        self.inner.put(key, value, ttl_seconds).await
    }

    async fn evict_category(&self, _category: &str) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("eviction unavailable"))
    }
}

/// Test: rows created through the services show up in the very next listing.
#[tokio::test]
async fn listings_see_rows_created_through_services() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("fresh")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Fresh Rows", owner.id))
        .await
        .expect("project creation succeeds");

    // Prime the listing while it is empty
    let listed = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 0);

    stack
        .tasks
        .create(common::task_request("first", project.id))
        .await
        .expect("task creation succeeds");
    let listed = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 1);

    stack
        .tasks
        .create(common::task_request("second", project.id))
        .await
        .expect("task creation succeeds");
    let listed = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 2);
}

/// Test: the cached project listing for an owner picks up a project created
/// right after it was primed.
#[tokio::test]
async fn owner_project_listing_sees_new_projects() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("owner-list")))
        .await
        .expect("registration succeeds");
    stack
        .projects
        .create(common::project_request("Mercury", owner.id))
        .await
        .expect("project creation succeeds");

    // Prime the owner's listing
    let listed = stack
        .projects
        .list_by_owner(owner.id, PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 1);

    stack
        .projects
        .create(common::project_request("Voskhod", owner.id))
        .await
        .expect("project creation succeeds");

    let listed = stack
        .projects
        .list_by_owner(owner.id, PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 2);
    assert!(listed.items.iter().any(|p| p.name == "Voskhod"));
}

/// Test: a write that sidesteps the services is invisible until something
/// drops the category.
#[tokio::test]
async fn direct_storage_writes_hide_until_the_next_eviction() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("stale")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Stale Rows", owner.id))
        .await
        .expect("project creation succeeds");

    stack
        .tasks
        .create(common::task_request("visible", project.id))
        .await
        .expect("task creation succeeds");
    let listed = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 1);

    // Straight into storage, past the services and their evictions
    TaskRepository::insert(
        stack.store.as_ref(),
        Task::new(common::task_request("smuggled", project.id)),
    )
    .await
    .expect("direct insert succeeds");

    let listed = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 1);

    // The next service-side mutation drops the category and reveals it
    stack
        .tasks
        .create(common::task_request("evictor", project.id))
        .await
        .expect("task creation succeeds");
    let listed = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 3);
}

/// Test: mutating one project refreshes every cached read in the category,
/// details of sibling projects included.
#[tokio::test]
async fn category_eviction_refreshes_sibling_details() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("sibling")))
        .await
        .expect("registration succeeds");
    let first = stack
        .projects
        .create(common::project_request("Orion", owner.id))
        .await
        .expect("project creation succeeds");
    let second = stack
        .projects
        .create(common::project_request("Vostok", owner.id))
        .await
        .expect("project creation succeeds");

    // Prime the detail read for the first project
    let detail = stack.projects.get(first.id).await.expect("detail read");
    assert_eq!(detail.name, "Orion");

    // Rename it behind the services' back; the cached detail keeps serving
    let mut row = ProjectRepository::find_live_by_id(stack.store.as_ref(), first.id)
        .await
        .expect("direct read succeeds")
        .expect("row is live");
    row.name = "Orion II".to_string();
    assert!(ProjectRepository::update(stack.store.as_ref(), &row)
        .await
        .expect("direct update succeeds"));
    let detail = stack.projects.get(first.id).await.expect("detail read");
    assert_eq!(detail.name, "Orion");

    // A service-side mutation of the sibling drops the whole category
    stack
        .projects
        .update(
            second.id,
            UpdateProjectRequest {
                description: Some("crewed flights".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("sibling update succeeds");
    let detail = stack.projects.get(first.id).await.expect("detail read");
    assert_eq!(detail.name, "Orion II");
}

/// Test: the overdue report lives under the tasks category and any task
/// mutation drops it.
#[tokio::test]
async fn overdue_report_is_dropped_with_its_category() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("overdue")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Late Work", owner.id))
        .await
        .expect("project creation succeeds");

    let mut req = common::task_request("slipped", project.id);
    req.due_date = Utc::now() - Duration::hours(2);
    let task = stack.tasks.create(req).await.expect("task creation succeeds");
    assert_eq!(task.estimated_hours, 0);

    let overdue = stack.tasks.list_overdue().await.expect("report succeeds");
    assert_eq!(overdue.len(), 1);

    stack.tasks.delete(task.id).await.expect("deletion succeeds");
    let overdue = stack.tasks.list_overdue().await.expect("report succeeds");
    assert!(overdue.is_empty());
}

/// Test: dropping one category leaves the others' cached results alone.
#[tokio::test]
async fn eviction_stays_inside_its_category() {
    let stack = common::setup().await;
    let first = stack
        .auth
        .register(common::register_request(&common::unique_email("iso-a")))
        .await
        .expect("registration succeeds");

    // Prime both categories
    let principals = stack
        .principals
        .list(PageRequest::default())
        .await
        .expect("principal listing succeeds");
    assert_eq!(principals.total, 1);
    let tasks = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("task listing succeeds");
    assert_eq!(tasks.total, 0);

    // A task sneaks into storage; registration then drops principals only
    TaskRepository::insert(
        stack.store.as_ref(),
        Task::new(common::task_request("sneaky", uuid::Uuid::new_v4())),
    )
    .await
    .expect("direct insert succeeds");
    stack
        .auth
        .register(common::register_request(&common::unique_email("iso-b")))
        .await
        .expect("registration succeeds");

    let principals = stack
        .principals
        .list(PageRequest::default())
        .await
        .expect("principal listing succeeds");
    assert_eq!(principals.total, 2);
    let tasks = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("task listing succeeds");
    assert_eq!(tasks.total, 0);

    // Only a task mutation reveals the smuggled row
    let project = stack
        .projects
        .create(common::project_request("Isolation", first.id))
        .await
        .expect("project creation succeeds");
    stack
        .tasks
        .create(common::task_request("real", project.id))
        .await
        .expect("task creation succeeds");
    let tasks = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("task listing succeeds");
    assert_eq!(tasks.total, 2);
}

/// Test: when eviction fails, the mutation still lands in storage and the
/// stale cached listing keeps serving only until its TTL runs out.
#[tokio::test]
async fn failed_eviction_leaves_a_stale_entry_until_ttl() {
    let stack = build_stack_with_cache_ttl(
        common::WEEK_SECONDS,
        Arc::new(StuckEvictionCache::new()),
        1,
    )
    .await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("sticky")))
        .await
        .expect("registration succeeds");
    stack
        .projects
        .create(common::project_request("Slow Drop", owner.id))
        .await
        .expect("project creation succeeds");

    // Prime the owner's listing with one project
    let listed = stack
        .projects
        .list_by_owner(owner.id, PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 1);

    // The new project lands in storage; the eviction fails and is swallowed
    stack
        .projects
        .create(common::project_request("Slow Drop II", owner.id))
        .await
        .expect("creation survives the failed eviction");
    let listed = stack
        .projects
        .list_by_owner(owner.id, PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 1);

    // Once the entry's TTL lapses the listing answers from storage again
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let listed = stack
        .projects
        .list_by_owner(owner.id, PageRequest::default())
        .await
        .expect("listing succeeds");
    assert_eq!(listed.total, 2);
}

/// Test: a corrupt cached payload degrades to a storage read instead of an
/// error.
#[tokio::test]
async fn corrupt_cache_entries_fall_back_to_storage() {
    let stack = common::setup().await;
    let owner = stack
        .auth
        .register(common::register_request(&common::unique_email("corrupt")))
        .await
        .expect("registration succeeds");
    let project = stack
        .projects
        .create(common::project_request("Corrupted", owner.id))
        .await
        .expect("project creation succeeds");
    stack
        .tasks
        .create(common::task_request("survivor", project.id))
        .await
        .expect("task creation succeeds");

    let key = cache_key(
        CATEGORY_TASKS,
        &format!("list:{}:0:20", TaskFilter::default().cache_key_part()),
    );

    // Prime the entry and check it is real JSON carrying the page
    stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing succeeds");
    let raw = stack
        .cache
        .get(&key)
        .await
        .expect("cache read succeeds")
        .expect("entry was primed");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("entry is JSON");
    assert_eq!(parsed["total"], 1);

    // Scribble over it; the listing still answers from storage
    stack
        .cache
        .put(&key, "definitely not json", CACHE_TTL_SECONDS)
        .await
        .expect("cache write succeeds");
    let listed = stack
        .tasks
        .list(TaskFilter::default(), PageRequest::default())
        .await
        .expect("listing survives the corrupt entry");
    assert_eq!(listed.total, 1);
    assert_eq!(listed.items[0].title, "survivor");
}
