// Local-to-remote writes: push a local event, delete a remote one

use super::RemoteEventWriter;
use crate::database::Database;
use crate::models::{OutgoingEvent, PushOutcome, PRIMARY_CALENDAR_ID};
use chrono::Utc;
use log::{error, info, warn};

/// Push a local event to its remote calendar. Linked events are updated in
/// place; unlinked ones are created in their calendar (or `"primary"`) and
/// then linked locally. A remote failure is stored on the event.
pub async fn push_event<W: RemoteEventWriter>(
    db: &Database,
    writer: &W,
    owner_id: &str,
    event_id: &str,
) -> PushOutcome {
    let event = match db.get_event(event_id).await {
        Ok(Some(event)) if event.owner_id == owner_id && !event.is_deleted() => event,
        Ok(_) => return PushOutcome::failed("Event not found".to_string()),
        Err(e) => {
            error!("Loading event {} for push failed: {}", event_id, e);
            return PushOutcome::failed(e.to_string());
        }
    };

    let body = OutgoingEvent::from_local(&event);
    let pushed = match event.remote_link() {
        Some((calendar_id, external_id)) => writer
            .update_remote_event(calendar_id, external_id, &body)
            .await
            .map(|_| None),
        None => {
            let calendar_id = event.calendar_id.as_deref().unwrap_or(PRIMARY_CALENDAR_ID);
            writer
                .insert_remote_event(calendar_id, &body)
                .await
                .map(|external_id| Some((external_id, calendar_id.to_string())))
        }
    };

    match pushed {
        Ok(Some((external_id, calendar_id))) => {
            if let Err(e) = db
                .link_remote_event(event_id, &external_id, &calendar_id, Utc::now())
                .await
            {
                error!("Linking event {} to {} failed: {}", event_id, external_id, e);
                return PushOutcome::failed(e.to_string());
            }
            info!("Created remote event {} for {}", external_id, event_id);
            PushOutcome::ok()
        }
        Ok(None) => {
            info!("Updated remote copy of event {}", event_id);
            PushOutcome::ok()
        }
        Err(e) => {
            let message = e.to_string();
            error!("Failed to push event {}: {}", event_id, message);
            if let Err(record_err) = db.record_sync_error(event_id, &message).await {
                warn!("Could not record sync error on {}: {}", event_id, record_err);
            }
            PushOutcome::failed(message)
        }
    }
}

pub async fn delete_remote_event<W: RemoteEventWriter>(
    writer: &W,
    calendar_id: &str,
    external_id: &str,
) -> PushOutcome {
    match writer.delete_remote_event(calendar_id, external_id).await {
        Ok(()) => PushOutcome::ok(),
        Err(e) => {
            error!(
                "Failed to delete remote event {} from {}: {}",
                external_id, calendar_id, e
            );
            PushOutcome::failed(e.to_string())
        }
    }
}
