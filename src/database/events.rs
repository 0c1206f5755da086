// file: src/database/events.rs
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{EventOrigin, LocalEvent, SyncStatus, SyncedFields};

const EVENT_COLUMNS: &str = r#"
    id, title, description, primary_at, start_at, end_at, owner_id, origin,
    external_id, calendar_id, last_synced_at, sync_error, created_at, updated_at, deleted_at
"#;

/// Live events previously synchronized from `calendar_id` for `owner_id`.
pub async fn find_synced(
    pool: &SqlitePool,
    owner_id: &str,
    calendar_id: &str,
) -> Result<Vec<LocalEvent>> {
    let events = sqlx::query_as::<_, LocalEvent>(&format!(
        r#"
        SELECT {EVENT_COLUMNS}
        FROM events
        WHERE owner_id = ?
            AND calendar_id = ?
            AND origin = ?
            AND external_id IS NOT NULL
            AND deleted_at IS NULL
        ORDER BY primary_at ASC
        "#
    ))
    .bind(owner_id)
    .bind(calendar_id)
    .bind(EventOrigin::GoogleCalendar)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

/// Live events of an owner, soonest first.
pub async fn list_for_owner(pool: &SqlitePool, owner_id: &str) -> Result<Vec<LocalEvent>> {
    let events = sqlx::query_as::<_, LocalEvent>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE owner_id = ? AND deleted_at IS NULL ORDER BY primary_at ASC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

/// Fetch by id, tombstoned rows included.
pub async fn get(pool: &SqlitePool, event_id: &str) -> Result<Option<LocalEvent>> {
    let event = sqlx::query_as::<_, LocalEvent>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = ?"
    ))
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    Ok(event)
}

pub async fn insert(pool: &SqlitePool, event: &LocalEvent) -> Result<()> {
    if event.external_id.is_some() && event.calendar_id.is_none() {
        return Err(anyhow!(
            "Event {} has an external id but no calendar id",
            event.id
        ));
    }

    sqlx::query(&format!(
        "INSERT INTO events ({EVENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.primary_at)
    .bind(event.start_at)
    .bind(event.end_at)
    .bind(&event.owner_id)
    .bind(event.origin)
    .bind(&event.external_id)
    .bind(&event.calendar_id)
    .bind(event.last_synced_at)
    .bind(&event.sync_error)
    .bind(event.created_at)
    .bind(event.updated_at)
    .bind(event.deleted_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite the remote-owned fields of a live event and clear its sync error.
pub async fn update_synced_fields(
    pool: &SqlitePool,
    event_id: &str,
    fields: &SyncedFields,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE events
        SET title = ?, description = ?, primary_at = ?, start_at = ?, end_at = ?,
            updated_at = ?, last_synced_at = ?, sync_error = NULL
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.primary_at)
    .bind(fields.start_at)
    .bind(fields.end_at)
    .bind(fields.updated_at)
    .bind(fields.last_synced_at)
    .bind(event_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("Event {} not found", event_id));
    }

    Ok(())
}

pub async fn soft_delete(pool: &SqlitePool, event_id: &str, at: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query("UPDATE events SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(at)
        .bind(event_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("Event {} not found or already deleted", event_id));
    }

    Ok(())
}

/// Attach a freshly created remote entry to a local event.
pub async fn link_remote(
    pool: &SqlitePool,
    event_id: &str,
    external_id: &str,
    calendar_id: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE events
        SET external_id = ?, calendar_id = ?, origin = ?, last_synced_at = ?, sync_error = NULL
        WHERE id = ?
        "#,
    )
    .bind(external_id)
    .bind(calendar_id)
    .bind(EventOrigin::GoogleCalendar)
    .bind(at)
    .bind(event_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn record_sync_error(pool: &SqlitePool, event_id: &str, message: &str) -> Result<()> {
    sqlx::query("UPDATE events SET sync_error = ? WHERE id = ?")
        .bind(message)
        .bind(event_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn sync_status(pool: &SqlitePool, owner_id: &str) -> Result<SyncStatus> {
    let event_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM events WHERE owner_id = ? AND origin = ?",
    )
    .bind(owner_id)
    .bind(EventOrigin::GoogleCalendar)
    .fetch_one(pool)
    .await?;

    let latest: Option<(Option<DateTime<Utc>>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT last_synced_at, sync_error
        FROM events
        WHERE owner_id = ? AND origin = ? AND last_synced_at IS NOT NULL
        ORDER BY last_synced_at DESC
        LIMIT 1
        "#,
    )
    .bind(owner_id)
    .bind(EventOrigin::GoogleCalendar)
    .fetch_optional(pool)
    .await?;

    let (last_synced_at, sync_error) = latest.unwrap_or((None, None));

    Ok(SyncStatus {
        last_synced_at,
        sync_error,
        event_count,
    })
}
