// Calendar integration module
// Google Calendar reconciliation, push and the collaborator seams it runs against

use crate::models::{LocalEvent, OutgoingEvent, RemoteEvent, SyncedFields, TimeWindow};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod auth;
pub mod convert;
pub mod google;
pub mod locks;
pub mod push;
pub mod reconcile;

pub use google::GoogleCalendarClient;
pub use reconcile::CalendarReconciler;

/// Source of truth for remote calendar state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCalendarProvider: Send + Sync {
    /// Every event in `window`, all pages exhausted.
    async fn fetch_events(&self, calendar_id: &str, window: &TimeWindow)
        -> Result<Vec<RemoteEvent>>;
}

/// Writes against the remote calendar.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteEventWriter: Send + Sync {
    /// Creates the event and returns its remote id.
    async fn insert_remote_event(&self, calendar_id: &str, event: &OutgoingEvent)
        -> Result<String>;

    async fn update_remote_event(
        &self,
        calendar_id: &str,
        external_id: &str,
        event: &OutgoingEvent,
    ) -> Result<()>;

    async fn delete_remote_event(&self, calendar_id: &str, external_id: &str) -> Result<()>;
}

/// Local persistence used by reconciliation. Every write commits on its own.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn owner_exists(&self, owner_id: &str) -> Result<bool>;

    /// Live (not soft-deleted) events synchronized from `calendar_id`.
    async fn find_synced_events(&self, owner_id: &str, calendar_id: &str)
        -> Result<Vec<LocalEvent>>;

    async fn insert_event(&self, event: &LocalEvent) -> Result<()>;

    async fn update_synced_fields(&self, event_id: &str, fields: &SyncedFields) -> Result<()>;

    async fn soft_delete_event(&self, event_id: &str, at: DateTime<Utc>) -> Result<()>;
}
