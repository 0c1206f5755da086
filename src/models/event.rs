// file: src/models/event.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Calendar id used when the caller does not name one.
pub const PRIMARY_CALENDAR_ID: &str = "primary";

/// Title stored for remote events that carry no summary.
pub const UNTITLED_EVENT: &str = "Untitled Event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    Manual,
    GoogleCalendar,
}

impl EventOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOrigin::Manual => "manual",
            EventOrigin::GoogleCalendar => "google_calendar",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocalEvent {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub primary_at: DateTime<Utc>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub owner_id: String,
    pub origin: EventOrigin,
    pub external_id: Option<String>,
    pub calendar_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl LocalEvent {
    /// A manually entered event, never touched by reconciliation.
    pub fn new_manual(owner_id: &str, title: &str, at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: new_event_id(),
            title: title.to_string(),
            description: None,
            primary_at: at,
            start_at: None,
            end_at: None,
            owner_id: owner_id.to_string(),
            origin: EventOrigin::Manual,
            external_id: None,
            calendar_id: None,
            last_synced_at: None,
            sync_error: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// `(calendar_id, external_id)` of the remote entry this event is linked to.
    pub fn remote_link(&self) -> Option<(&str, &str)> {
        Some((self.calendar_id.as_deref()?, self.external_id.as_deref()?))
    }

    /// Fields a reconciliation update overwrites.
    pub fn synced_fields(&self) -> SyncedFields {
        SyncedFields {
            title: self.title.clone(),
            description: self.description.clone(),
            primary_at: self.primary_at,
            start_at: self.start_at,
            end_at: self.end_at,
            updated_at: self.updated_at,
            last_synced_at: self.last_synced_at.unwrap_or(self.updated_at),
        }
    }
}

/// Partial update applied to an already synchronized event. Writing it
/// also clears `sync_error`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncedFields {
    pub title: String,
    pub description: Option<String>,
    pub primary_at: DateTime<Utc>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

pub fn new_event_id() -> String {
    Uuid::now_v7().to_string()
}
