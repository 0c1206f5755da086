//! Remote event to local event conversion.

use crate::error::{AppError, AppResult};
use crate::models::{
    new_event_id, EventOrigin, LocalEvent, RemoteEvent, RemoteEventTime, UNTITLED_EVENT,
};
use chrono::{DateTime, NaiveDate, Utc};

/// Build the local shape of `remote` as first seen at `now`.
///
/// The start is mandatory; the end is optional. A date-time wins over a
/// date when both are present, and all-day dates resolve to midnight UTC.
pub fn to_local_event(
    remote: &RemoteEvent,
    owner_id: &str,
    calendar_id: &str,
    now: DateTime<Utc>,
) -> AppResult<LocalEvent> {
    let external_id = remote
        .external_id
        .clone()
        .ok_or_else(|| AppError::conversion("Remote event has no id"))?;

    let start_at = match remote.start.as_ref() {
        Some(time) => resolve_time(time)?,
        None => None,
    }
    .ok_or_else(|| {
        AppError::conversion(format!(
            "Event {} has neither a start date-time nor a start date",
            external_id
        ))
    })?;

    let end_at = match remote.end.as_ref() {
        Some(time) => resolve_time(time)?,
        None => None,
    };

    Ok(LocalEvent {
        id: new_event_id(),
        title: remote
            .title
            .clone()
            .unwrap_or_else(|| UNTITLED_EVENT.to_string()),
        description: remote.description.clone(),
        primary_at: start_at,
        start_at: Some(start_at),
        end_at,
        owner_id: owner_id.to_string(),
        origin: EventOrigin::GoogleCalendar,
        external_id: Some(external_id),
        calendar_id: Some(calendar_id.to_string()),
        last_synced_at: Some(now),
        sync_error: None,
        created_at: now,
        updated_at: remote.last_modified.unwrap_or(now),
        deleted_at: None,
    })
}

fn resolve_time(time: &RemoteEventTime) -> AppResult<Option<DateTime<Utc>>> {
    if let Some(raw) = time.date_time.as_deref() {
        let parsed = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| AppError::conversion(format!("Invalid date-time '{}': {}", raw, e)))?;
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    if let Some(raw) = time.date.as_deref() {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| AppError::conversion(format!("Invalid date '{}': {}", raw, e)))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::conversion(format!("Invalid date '{}'", raw)))?;
        return Ok(Some(midnight.and_utc()));
    }

    Ok(None)
}
