//! In-process deletion events.
//!
//! Entity removal is announced on a notification bus. Dispatch is
//! synchronous and in subscription order on the publisher's task, so a
//! cascade triggered by a deletion is fully applied by the time the deleting
//! call returns. Listeners see at-least-once delivery and must stay
//! idempotent.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Entity kinds that announce their deletion. Task removal stays silent; no
/// component reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Principal,
    Project,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Principal => "principal",
            EntityKind::Project => "project",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionEvent {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl DeletionEvent {
    pub fn principal(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Principal,
            id,
        }
    }

    pub fn project(id: Uuid) -> Self {
        Self {
            kind: EntityKind::Project,
            id,
        }
    }
}

#[async_trait]
pub trait DeletionListener: Send + Sync {
    /// Handles one event. Follow-up events go back through `bus`. Errors are
    /// logged by the bus and never reach the publisher: the triggering
    /// deletion is already persisted and must not be rolled back.
    async fn on_deletion(&self, event: DeletionEvent, bus: &NotificationBus)
        -> Result<(), anyhow::Error>;
}

/// Synchronous in-process event bus.
#[derive(Clone, Default)]
pub struct NotificationBus {
    listeners: Arc<RwLock<Vec<Arc<dyn DeletionListener>>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, listener: Arc<dyn DeletionListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Dispatches to every listener before returning. Listeners registered
    /// while a publish is in flight only see later events.
    pub async fn publish(&self, event: DeletionEvent) {
        let listeners = self.listeners.read().await.clone();
        tracing::debug!(
            kind = event.kind.as_str(),
            id = %event.id,
            listeners = listeners.len(),
            "dispatching deletion event"
        );

        for listener in listeners {
            if let Err(e) = listener.on_deletion(event, self).await {
                tracing::error!(
                    kind = event.kind.as_str(),
                    id = %event.id,
                    error = %e,
                    "deletion listener failed"
                );
            }
        }
    }
}
