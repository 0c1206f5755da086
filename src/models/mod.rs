// file: src/models/mod.rs

pub mod calendar;
pub mod event;
pub mod remote;
pub mod sync;
pub mod user;

// Flatten so callers can `use crate::models::LocalEvent`.
pub use calendar::CalendarListEntry;
pub use event::{
    new_event_id, EventOrigin, LocalEvent, SyncedFields, PRIMARY_CALENDAR_ID, UNTITLED_EVENT,
};
pub use remote::{OutgoingEvent, RemoteEvent, RemoteEventTime};
pub use sync::{PushOutcome, ReconcileResult, SyncStatus, TimeWindow};
pub use user::User;
