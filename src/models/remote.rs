// file: src/models/remote.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event as reported by a remote calendar provider. Every field is
/// optional because providers omit fields freely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<RemoteEventTime>,
    pub end: Option<RemoteEventTime>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Either a precise RFC 3339 date-time or an all-day `YYYY-MM-DD` date.
/// Values are kept raw so that a malformed one fails only its own event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
}

impl RemoteEventTime {
    pub fn at(date_time: DateTime<Utc>) -> Self {
        Self {
            date_time: Some(date_time.to_rfc3339()),
            date: None,
        }
    }

    pub fn all_day(date: &str) -> Self {
        Self {
            date_time: None,
            date: Some(date.to_string()),
        }
    }
}

impl RemoteEvent {
    pub fn new(external_id: &str) -> Self {
        Self {
            external_id: Some(external_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(RemoteEventTime::at(start));
        self.end = Some(RemoteEventTime::at(end));
        self
    }

    pub fn modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }
}

/// Payload written to a remote calendar for a local event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEvent {
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OutgoingEvent {
    /// Instants missing on the local side collapse onto `primary_at`.
    pub fn from_local(event: &crate::models::LocalEvent) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            start: event.start_at.unwrap_or(event.primary_at),
            end: event.end_at.unwrap_or(event.primary_at),
        }
    }
}
